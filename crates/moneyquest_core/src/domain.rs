//! crates/moneyquest_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Mentor Dialogue
//=========================================================================================

/// The mentor avatar's expression for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mood {
    Cheer,
    Thinking,
    Proud,
    Curious,
    #[default]
    Gentle,
}

/// How the gateway categorised a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnMode {
    #[default]
    Dialog,
    Proposal,
    /// The consent-satisfied, content-bearing turn.
    Final,
}

/// The kind of bounded activity a proposal can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Quiz,
    Plan,
    Recap,
}

/// An offer to start a specific activity, pending explicit user consent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentorProposal {
    pub kind: ActivityKind,
    pub id: String,
    /// The exact chip text that accepts this proposal.
    pub confirm_chip: String,
    pub description: String,
    pub topic: Option<String>,
    pub size: Option<u32>,
}

/// An activity the user has consented to and which is now in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub kind: ActivityKind,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOption {
    pub text: String,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub title: String,
    pub action: String,
}

/// A structured, interactive content block attached to an assistant turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Card {
    Quiz {
        id: String,
        question: String,
        options: Vec<QuizOption>,
        explanation: Option<String>,
    },
    Plan {
        id: String,
        title: String,
        steps: Vec<PlanStep>,
    },
    Recap {
        id: String,
        title: String,
        bullets: Vec<String>,
    },
    Fix {
        id: String,
        mistake: String,
        rule: String,
        example: String,
    },
}

impl Card {
    pub fn id(&self) -> &str {
        match self {
            Card::Quiz { id, .. }
            | Card::Plan { id, .. }
            | Card::Recap { id, .. }
            | Card::Fix { id, .. } => id,
        }
    }
}

/// The gateway's structured reply for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentorResponse {
    pub mood: Mood,
    pub text: Option<String>,
    pub chips: Vec<String>,
    pub cards: Vec<Card>,
    pub proposal: Option<MentorProposal>,
    pub mode: TurnMode,
}

impl MentorResponse {
    pub const FALLBACK_TEXT: &'static str =
        "I'm having a little trouble thinking right now. Could you try asking me again?";

    /// The reply substituted whenever the upstream model fails or returns
    /// something that cannot be parsed.
    pub fn fallback() -> Self {
        Self {
            mood: Mood::Gentle,
            text: Some(Self::FALLBACK_TEXT.to_string()),
            chips: crate::chips::DEFAULT_CHIPS.iter().map(|c| c.to_string()).collect(),
            cards: Vec::new(),
            proposal: None,
            mode: TurnMode::Dialog,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One `{role, content}` pair of the history forwarded to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// A single transcript entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub cards: Vec<Card>,
    pub proposal: Option<MentorProposal>,
    pub mode: TurnMode,
    pub mood: Option<Mood>,
    pub created_at: DateTime<Utc>,
}

/// Everything the stateless gateway needs to answer one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentorRequest {
    pub message: String,
    pub history: Vec<HistoryEntry>,
    pub accept_proposal_id: Option<String>,
}

//=========================================================================================
// Users & Achievements
//=========================================================================================

/// An explicit role claim. Never inferred from an email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    Student,
    Teacher,
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(UserRole::Student),
            "teacher" => Ok(UserRole::Teacher),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UserRole::Student => "student",
            UserRole::Teacher => "teacher",
        })
    }
}

/// The caller identity resolved from a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: UserRole,
}

/// A badge definition from the achievements catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub points: u32,
    pub icon: Option<String>,
}

/// A row recording that a user earned an achievement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EarnedAchievement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub achievement_id: String,
    pub earned_at: DateTime<Utc>,
}

/// The number of recorded activity events on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyActivity {
    pub day: NaiveDate,
    pub count: u32,
}

/// What kind of thing a user did, for the activity heat-map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    MentorTurn,
    AchievementEarned,
}

impl ActivityEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityEvent::MentorTurn => "mentor_turn",
            ActivityEvent::AchievementEarned => "achievement_earned",
        }
    }
}
