//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! storage ports from the `core` crate. It handles all interactions with the
//! PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use moneyquest_core::domain::{
    Achievement, ActivityEvent, AuthUser, DailyActivity, EarnedAchievement, UserRole,
};
use moneyquest_core::ports::{
    AchievementStore, ActivityLog, AuthService, PortError, PortResult, PreferenceStore,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct AuthTokenRecord {
    user_id: Uuid,
    role: String,
}
impl AuthTokenRecord {
    fn to_domain(self) -> PortResult<AuthUser> {
        let role = self
            .role
            .parse::<UserRole>()
            .map_err(PortError::Unexpected)?;
        Ok(AuthUser {
            user_id: self.user_id,
            role,
        })
    }
}

#[derive(FromRow)]
struct AchievementRecord {
    id: String,
    name: String,
    description: String,
    category: String,
    points: i32,
    icon: Option<String>,
}
impl AchievementRecord {
    fn to_domain(self) -> Achievement {
        Achievement {
            id: self.id,
            name: self.name,
            description: self.description,
            category: self.category,
            points: self.points.max(0) as u32,
            icon: self.icon,
        }
    }
}

#[derive(FromRow)]
struct EarnedRecord {
    id: Uuid,
    user_id: Uuid,
    achievement_id: String,
    earned_at: DateTime<Utc>,
}
impl EarnedRecord {
    fn to_domain(self) -> EarnedAchievement {
        EarnedAchievement {
            id: self.id,
            user_id: self.user_id,
            achievement_id: self.achievement_id,
            earned_at: self.earned_at,
        }
    }
}

#[derive(FromRow)]
struct DailyActivityRecord {
    day: NaiveDate,
    count: i64,
}
impl DailyActivityRecord {
    fn to_domain(self) -> DailyActivity {
        DailyActivity {
            day: self.day,
            count: u32::try_from(self.count).unwrap_or(u32::MAX),
        }
    }
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl AuthService for DbAdapter {
    async fn validate_token(&self, token: &str) -> PortResult<AuthUser> {
        let record = sqlx::query_as::<_, AuthTokenRecord>(
            "SELECT user_id, role FROM auth_tokens WHERE token = $1 AND expires_at > now()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)?;

        record.to_domain()
    }
}

const EARNED_COLUMNS: &str = "id, user_id, achievement_id, earned_at";

#[async_trait]
impl AchievementStore for DbAdapter {
    async fn list_achievements(&self) -> PortResult<Vec<Achievement>> {
        let records = sqlx::query_as::<_, AchievementRecord>(
            "SELECT id, name, description, category, points, icon FROM achievements ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_achievement(&self, achievement_id: &str) -> PortResult<Achievement> {
        let record = sqlx::query_as::<_, AchievementRecord>(
            "SELECT id, name, description, category, points, icon FROM achievements WHERE id = $1",
        )
        .bind(achievement_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Achievement {} not found", achievement_id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn list_earned(&self, user_id: Uuid) -> PortResult<Vec<EarnedAchievement>> {
        let records = sqlx::query_as::<_, EarnedRecord>(&format!(
            "SELECT {EARNED_COLUMNS} FROM user_achievements WHERE user_id = $1 ORDER BY earned_at ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn find_earned(
        &self,
        user_id: Uuid,
        achievement_id: &str,
    ) -> PortResult<Option<EarnedAchievement>> {
        let record = sqlx::query_as::<_, EarnedRecord>(&format!(
            "SELECT {EARNED_COLUMNS} FROM user_achievements WHERE user_id = $1 AND achievement_id = $2"
        ))
        .bind(user_id)
        .bind(achievement_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(|r| r.to_domain()))
    }

    async fn insert_earned(
        &self,
        user_id: Uuid,
        achievement_id: &str,
    ) -> PortResult<Option<EarnedAchievement>> {
        let record = sqlx::query_as::<_, EarnedRecord>(&format!(
            "INSERT INTO user_achievements (id, user_id, achievement_id) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, achievement_id) DO NOTHING RETURNING {EARNED_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(achievement_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(|r| r.to_domain()))
    }
}

#[async_trait]
impl ActivityLog for DbAdapter {
    async fn record_activity(&self, user_id: Uuid, event: ActivityEvent) -> PortResult<()> {
        sqlx::query("INSERT INTO activity_events (user_id, kind) VALUES ($1, $2)")
            .bind(user_id)
            .bind(event.as_str())
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn daily_activity(
        &self,
        user_id: Uuid,
        since: NaiveDate,
        until: NaiveDate,
    ) -> PortResult<Vec<DailyActivity>> {
        let records = sqlx::query_as::<_, DailyActivityRecord>(
            "SELECT (occurred_at AT TIME ZONE 'UTC')::date AS day, COUNT(*) AS count \
             FROM activity_events \
             WHERE user_id = $1 AND (occurred_at AT TIME ZONE 'UTC')::date BETWEEN $2 AND $3 \
             GROUP BY day ORDER BY day",
        )
        .bind(user_id)
        .bind(since)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}

#[async_trait]
impl PreferenceStore for DbAdapter {
    async fn get_preference(&self, user_id: Uuid, key: &str) -> PortResult<Option<String>> {
        let value: Option<(String,)> =
            sqlx::query_as("SELECT value FROM user_preferences WHERE user_id = $1 AND key = $2")
                .bind(user_id)
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(unexpected)?;
        Ok(value.map(|(v,)| v))
    }

    async fn set_preference(&self, user_id: Uuid, key: &str, value: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO user_preferences (user_id, key, value) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
        )
        .bind(user_id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}
