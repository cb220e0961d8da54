//! Awarding, loading and preference persistence against in-memory stores.

use async_trait::async_trait;
use chrono::Utc;
use chrono::NaiveDate;
use moneyquest_core::achievements::{
    award_achievement, award_and_record, load_badges, summarize, AchievementPreferences,
    AwardOutcome, BadgeFilter, BadgeSort,
};
use moneyquest_core::domain::{ActivityEvent, DailyActivity};
use moneyquest_core::{
    Achievement, AchievementStore, ActivityLog, EarnedAchievement, PortError, PortResult,
    PreferenceStore,
};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MemoryStore {
    catalog: Vec<Achievement>,
    earned: Mutex<Vec<EarnedAchievement>>,
    prefs: Mutex<HashMap<(Uuid, String), String>>,
    events: Mutex<Vec<(Uuid, ActivityEvent)>>,
}

impl MemoryStore {
    fn with_catalog() -> Self {
        Self {
            catalog: vec![
                Achievement {
                    id: "shrinkflation-detective".into(),
                    name: "Shrinkflation Detective".into(),
                    description: "Spot a shrinking snack".into(),
                    category: "quests".into(),
                    points: 20,
                    icon: Some("magnifier".into()),
                },
                Achievement {
                    id: "first-chat".into(),
                    name: "First Chat".into(),
                    description: "Talk to your mentor".into(),
                    category: "mentor".into(),
                    points: 5,
                    icon: None,
                },
            ],
            ..Default::default()
        }
    }
}

#[async_trait]
impl AchievementStore for MemoryStore {
    async fn list_achievements(&self) -> PortResult<Vec<Achievement>> {
        Ok(self.catalog.clone())
    }

    async fn get_achievement(&self, achievement_id: &str) -> PortResult<Achievement> {
        self.catalog
            .iter()
            .find(|a| a.id == achievement_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Achievement {achievement_id} not found")))
    }

    async fn list_earned(&self, user_id: Uuid) -> PortResult<Vec<EarnedAchievement>> {
        Ok(self
            .earned
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_earned(
        &self,
        user_id: Uuid,
        achievement_id: &str,
    ) -> PortResult<Option<EarnedAchievement>> {
        Ok(self
            .earned
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.user_id == user_id && e.achievement_id == achievement_id)
            .cloned())
    }

    async fn insert_earned(
        &self,
        user_id: Uuid,
        achievement_id: &str,
    ) -> PortResult<Option<EarnedAchievement>> {
        let row = EarnedAchievement {
            id: Uuid::new_v4(),
            user_id,
            achievement_id: achievement_id.to_string(),
            earned_at: Utc::now(),
        };
        self.earned.lock().unwrap().push(row.clone());
        Ok(Some(row))
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn get_preference(&self, user_id: Uuid, key: &str) -> PortResult<Option<String>> {
        Ok(self.prefs.lock().unwrap().get(&(user_id, key.to_string())).cloned())
    }

    async fn set_preference(&self, user_id: Uuid, key: &str, value: &str) -> PortResult<()> {
        self.prefs
            .lock()
            .unwrap()
            .insert((user_id, key.to_string()), value.to_string());
        Ok(())
    }
}

#[async_trait]
impl ActivityLog for MemoryStore {
    async fn record_activity(&self, user_id: Uuid, event: ActivityEvent) -> PortResult<()> {
        self.events.lock().unwrap().push((user_id, event));
        Ok(())
    }

    async fn daily_activity(
        &self,
        _user_id: Uuid,
        _since: NaiveDate,
        _until: NaiveDate,
    ) -> PortResult<Vec<DailyActivity>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn awarding_twice_reports_already_earned() {
    let store = MemoryStore::with_catalog();
    let user = Uuid::new_v4();

    let row = match award_achievement(&store, user, "first-chat").await.unwrap() {
        AwardOutcome::Awarded(row) => row,
        other => panic!("expected a fresh award, got {other:?}"),
    };

    let second = award_achievement(&store, user, "first-chat").await.unwrap();
    assert_eq!(second, AwardOutcome::AlreadyEarned(row));
    assert_eq!(store.earned.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn awarding_an_unknown_achievement_is_not_found() {
    let store = MemoryStore::with_catalog();
    let err = award_achievement(&store, Uuid::new_v4(), "moon-landing").await.unwrap_err();
    assert!(matches!(err, PortError::NotFound(_)));
}

#[tokio::test]
async fn badges_reflect_awards_for_that_user_only() {
    let store = MemoryStore::with_catalog();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    award_achievement(&store, alice, "shrinkflation-detective").await.unwrap();

    let alice_summary = summarize(&load_badges(&store, alice).await.unwrap());
    let bob_summary = summarize(&load_badges(&store, bob).await.unwrap());
    assert_eq!((alice_summary.earned, alice_summary.points), (1, 20));
    assert_eq!((bob_summary.earned, bob_summary.total), (0, 2));
}

#[tokio::test]
async fn preferences_persist_through_the_store() {
    let store = MemoryStore::with_catalog();
    let user = Uuid::new_v4();

    assert_eq!(
        AchievementPreferences::load(&store, user).await.unwrap(),
        AchievementPreferences::default()
    );

    let prefs = AchievementPreferences { filter: BadgeFilter::Earned, sort: BadgeSort::Category };
    prefs.save(&store, user).await.unwrap();
    assert_eq!(AchievementPreferences::load(&store, user).await.unwrap(), prefs);
}

#[tokio::test]
async fn garbage_preferences_fall_back_to_defaults() {
    let store = MemoryStore::with_catalog();
    let user = Uuid::new_v4();
    store
        .set_preference(user, AchievementPreferences::SORT_KEY, "sideways")
        .await
        .unwrap();

    let prefs = AchievementPreferences::load(&store, user).await.unwrap();
    assert_eq!(prefs.sort, BadgeSort::Newest);
}

#[tokio::test]
async fn only_fresh_awards_reach_the_activity_calendar() {
    let store = MemoryStore::with_catalog();
    let user = Uuid::new_v4();

    let first = award_and_record(&store, &store, user, "first-chat").await.unwrap();
    assert!(matches!(first, AwardOutcome::Awarded(_)));
    let again = award_and_record(&store, &store, user, "first-chat").await.unwrap();
    assert!(matches!(again, AwardOutcome::AlreadyEarned(_)));

    let events = store.events.lock().unwrap();
    assert_eq!(*events, vec![(user, ActivityEvent::AchievementEarned)]);
}

#[tokio::test]
async fn unknown_achievement_records_nothing() {
    let store = MemoryStore::with_catalog();
    let err = award_and_record(&store, &store, Uuid::new_v4(), "moon-landing")
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::NotFound(_)));
    assert!(store.events.lock().unwrap().is_empty());
}
