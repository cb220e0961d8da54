//! crates/moneyquest_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use crate::domain::{
    Achievement, ActivityEvent, AuthUser, DailyActivity, EarnedAchievement, MentorRequest,
    MentorResponse,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The upstream chat gateway: forwards one turn to the language model and
/// returns the post-processed, structured reply.
#[async_trait]
pub trait MentorChatService: Send + Sync {
    async fn reply(&self, request: &MentorRequest) -> PortResult<MentorResponse>;
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Resolves a bearer token to the caller's identity and explicit role.
    async fn validate_token(&self, token: &str) -> PortResult<AuthUser>;
}

#[async_trait]
pub trait AchievementStore: Send + Sync {
    async fn list_achievements(&self) -> PortResult<Vec<Achievement>>;

    async fn get_achievement(&self, achievement_id: &str) -> PortResult<Achievement>;

    async fn list_earned(&self, user_id: Uuid) -> PortResult<Vec<EarnedAchievement>>;

    async fn find_earned(
        &self,
        user_id: Uuid,
        achievement_id: &str,
    ) -> PortResult<Option<EarnedAchievement>>;

    /// Inserts the earned row. Returns `None` when a concurrent insert won the race.
    async fn insert_earned(
        &self,
        user_id: Uuid,
        achievement_id: &str,
    ) -> PortResult<Option<EarnedAchievement>>;
}

#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record_activity(&self, user_id: Uuid, event: ActivityEvent) -> PortResult<()>;

    /// Per-day event counts for `since..=until`. Days without events may be omitted.
    async fn daily_activity(
        &self,
        user_id: Uuid,
        since: NaiveDate,
        until: NaiveDate,
    ) -> PortResult<Vec<DailyActivity>>;
}

/// A per-user key-value store for UI preferences.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get_preference(&self, user_id: Uuid, key: &str) -> PortResult<Option<String>>;

    async fn set_preference(&self, user_id: Uuid, key: &str, value: &str) -> PortResult<()>;
}
