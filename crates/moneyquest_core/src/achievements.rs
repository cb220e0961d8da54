//! crates/moneyquest_core/src/achievements.rs
//!
//! Badge computation over the achievements catalog and a user's earned rows,
//! the persisted view preferences, and the idempotent award operation.

use crate::domain::{Achievement, ActivityEvent, ActivityKind, EarnedAchievement};
use crate::ports::{AchievementStore, ActivityLog, PortResult, PreferenceStore};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

//=========================================================================================
// Badges
//=========================================================================================

/// A catalog entry joined with the user's earned state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub achievement: Achievement,
    pub earned_at: Option<DateTime<Utc>>,
}

impl Badge {
    pub fn is_earned(&self) -> bool {
        self.earned_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AchievementSummary {
    pub earned: usize,
    pub total: usize,
    pub points: u32,
}

impl AchievementSummary {
    pub fn percent_complete(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.earned * 100) / self.total) as u32
    }
}

/// Keeps the earliest row per achievement id.
pub fn dedupe_earned(earned: Vec<EarnedAchievement>) -> Vec<EarnedAchievement> {
    let mut by_id: HashMap<String, EarnedAchievement> = HashMap::new();
    for row in earned {
        match by_id.get(&row.achievement_id) {
            Some(existing) if existing.earned_at <= row.earned_at => {}
            _ => {
                by_id.insert(row.achievement_id.clone(), row);
            }
        }
    }
    let mut rows: Vec<EarnedAchievement> = by_id.into_values().collect();
    rows.sort_by(|a, b| a.earned_at.cmp(&b.earned_at));
    rows
}

/// Joins the catalog with earned rows. Rows for ids missing from the catalog are ignored.
pub fn build_badges(catalog: &[Achievement], earned: Vec<EarnedAchievement>) -> Vec<Badge> {
    let earned_at: HashMap<String, DateTime<Utc>> = dedupe_earned(earned)
        .into_iter()
        .map(|row| (row.achievement_id, row.earned_at))
        .collect();

    catalog
        .iter()
        .map(|achievement| Badge {
            achievement: achievement.clone(),
            earned_at: earned_at.get(&achievement.id).copied(),
        })
        .collect()
}

pub fn summarize(badges: &[Badge]) -> AchievementSummary {
    let earned: Vec<&Badge> = badges.iter().filter(|b| b.is_earned()).collect();
    AchievementSummary {
        earned: earned.len(),
        total: badges.len(),
        points: earned.iter().map(|b| b.achievement.points).sum(),
    }
}

//=========================================================================================
// View Preferences
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BadgeFilter {
    #[default]
    All,
    Earned,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BadgeSort {
    /// Most recently earned first; locked badges last, by name.
    #[default]
    Newest,
    Name,
    Points,
    Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AchievementPreferences {
    pub filter: BadgeFilter,
    pub sort: BadgeSort,
}

impl AchievementPreferences {
    pub const FILTER_KEY: &'static str = "achievements.filter";
    pub const SORT_KEY: &'static str = "achievements.sort";

    /// Loads the user's saved preferences. Missing or unreadable values fall back to defaults.
    pub async fn load(store: &dyn PreferenceStore, user_id: Uuid) -> PortResult<Self> {
        let filter = store.get_preference(user_id, Self::FILTER_KEY).await?;
        let sort = store.get_preference(user_id, Self::SORT_KEY).await?;
        Ok(Self {
            filter: filter.and_then(|v| v.parse().ok()).unwrap_or_default(),
            sort: sort.and_then(|v| v.parse().ok()).unwrap_or_default(),
        })
    }

    pub async fn save(&self, store: &dyn PreferenceStore, user_id: Uuid) -> PortResult<()> {
        store
            .set_preference(user_id, Self::FILTER_KEY, &self.filter.to_string())
            .await?;
        store
            .set_preference(user_id, Self::SORT_KEY, &self.sort.to_string())
            .await
    }

    /// Filters and sorts badges for display.
    pub fn apply(&self, badges: Vec<Badge>) -> Vec<Badge> {
        let mut visible: Vec<Badge> = badges
            .into_iter()
            .filter(|b| match self.filter {
                BadgeFilter::All => true,
                BadgeFilter::Earned => b.is_earned(),
                BadgeFilter::Locked => !b.is_earned(),
            })
            .collect();

        match self.sort {
            BadgeSort::Newest => visible.sort_by(|a, b| {
                b.earned_at
                    .cmp(&a.earned_at)
                    .then_with(|| a.achievement.name.cmp(&b.achievement.name))
            }),
            BadgeSort::Name => visible.sort_by(|a, b| a.achievement.name.cmp(&b.achievement.name)),
            BadgeSort::Points => visible.sort_by(|a, b| {
                b.achievement
                    .points
                    .cmp(&a.achievement.points)
                    .then_with(|| a.achievement.name.cmp(&b.achievement.name))
            }),
            BadgeSort::Category => visible.sort_by(|a, b| {
                a.achievement
                    .category
                    .cmp(&b.achievement.category)
                    .then_with(|| a.achievement.name.cmp(&b.achievement.name))
            }),
        }
        visible
    }
}

impl FromStr for BadgeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(BadgeFilter::All),
            "earned" => Ok(BadgeFilter::Earned),
            "locked" => Ok(BadgeFilter::Locked),
            other => Err(format!("unknown badge filter '{other}'")),
        }
    }
}

impl fmt::Display for BadgeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BadgeFilter::All => "all",
            BadgeFilter::Earned => "earned",
            BadgeFilter::Locked => "locked",
        })
    }
}

impl FromStr for BadgeSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(BadgeSort::Newest),
            "name" => Ok(BadgeSort::Name),
            "points" => Ok(BadgeSort::Points),
            "category" => Ok(BadgeSort::Category),
            other => Err(format!("unknown badge sort '{other}'")),
        }
    }
}

impl fmt::Display for BadgeSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BadgeSort::Newest => "newest",
            BadgeSort::Name => "name",
            BadgeSort::Points => "points",
            BadgeSort::Category => "category",
        })
    }
}

//=========================================================================================
// Loading & Awarding
//=========================================================================================

/// Loads the catalog and the user's earned rows concurrently and joins them.
pub async fn load_badges(store: &dyn AchievementStore, user_id: Uuid) -> PortResult<Vec<Badge>> {
    let (catalog, earned) =
        futures::try_join!(store.list_achievements(), store.list_earned(user_id))?;
    Ok(build_badges(&catalog, earned))
}

/// The catalog badge earned by finishing a mentor activity, if any.
pub fn activity_achievement(kind: ActivityKind) -> Option<&'static str> {
    match kind {
        ActivityKind::Quiz => Some("quiz-whiz"),
        ActivityKind::Plan => Some("plan-maker"),
        ActivityKind::Recap => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwardOutcome {
    Awarded(EarnedAchievement),
    AlreadyEarned(EarnedAchievement),
}

/// Awards an achievement. Awarding one the user already holds is a success.
///
/// Fails with `PortError::NotFound` when the achievement id is not in the catalog.
pub async fn award_achievement(
    store: &dyn AchievementStore,
    user_id: Uuid,
    achievement_id: &str,
) -> PortResult<AwardOutcome> {
    store.get_achievement(achievement_id).await?;

    if let Some(existing) = store.find_earned(user_id, achievement_id).await? {
        info!(%user_id, achievement_id, "Achievement already earned");
        return Ok(AwardOutcome::AlreadyEarned(existing));
    }

    match store.insert_earned(user_id, achievement_id).await? {
        Some(row) => {
            info!(%user_id, achievement_id, "Achievement awarded");
            Ok(AwardOutcome::Awarded(row))
        }
        None => {
            let existing = store.find_earned(user_id, achievement_id).await?.ok_or_else(|| {
                crate::ports::PortError::Unexpected(format!(
                    "Achievement {achievement_id} neither inserted nor found for {user_id}"
                ))
            })?;
            Ok(AwardOutcome::AlreadyEarned(existing))
        }
    }
}

/// Awards an achievement and, when it is newly earned, records it on the
/// activity calendar. Failing to record the event does not undo the award.
pub async fn award_and_record(
    store: &dyn AchievementStore,
    log: &dyn ActivityLog,
    user_id: Uuid,
    achievement_id: &str,
) -> PortResult<AwardOutcome> {
    let outcome = award_achievement(store, user_id, achievement_id).await?;
    if let AwardOutcome::Awarded(_) = &outcome {
        if let Err(e) = log.record_activity(user_id, ActivityEvent::AchievementEarned).await {
            warn!(%user_id, achievement_id, "Failed to record achievement activity: {:?}", e);
        }
    }
    Ok(outcome)
}
