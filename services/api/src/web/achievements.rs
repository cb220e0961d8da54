//! services/api/src/web/achievements.rs
//!
//! Axum handlers for badges, the award endpoint, view preferences and the
//! daily-activity heat-map.

use crate::web::protocol::{
    AchievementsQuery, AchievementsResponse, AwardRequest, AwardResponse, BadgeDto,
    CalendarQuery, CalendarResponse, ErrorBody, PreferencesDto,
};
use crate::web::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use chrono::Utc;
use moneyquest_core::achievements::{
    award_and_record, load_badges, summarize, AchievementPreferences, AwardOutcome,
};
use moneyquest_core::activity::{ActivityCalendar, DEFAULT_CALENDAR_WEEKS, MAX_CALENDAR_WEEKS};
use moneyquest_core::domain::{AuthUser, UserRole};
use moneyquest_core::ports::PortError;
use std::sync::Arc;
use uuid::Uuid;
use tracing::{error, warn};

type JsonError = (StatusCode, Json<ErrorBody>);

fn json_error(status: StatusCode, message: impl Into<String>) -> JsonError {
    (status, Json(ErrorBody { error: message.into() }))
}

fn port_error(e: PortError) -> JsonError {
    match e {
        PortError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, msg),
        PortError::Unauthorized => json_error(StatusCode::UNAUTHORIZED, "Unauthorized"),
        PortError::Unexpected(msg) => {
            error!("Achievement request failed: {}", msg);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Resolves whom an award is for. Only teachers may award to someone else.
fn award_target(caller: &AuthUser, requested: Option<Uuid>) -> Result<Uuid, JsonError> {
    let target = requested.unwrap_or(caller.user_id);
    if target != caller.user_id && caller.role != UserRole::Teacher {
        warn!(caller = %caller.user_id, %target, "Student tried to award another user");
        return Err(json_error(
            StatusCode::UNAUTHORIZED,
            "Only teachers can award achievements to other users",
        ));
    }
    Ok(target)
}

fn award_status(outcome: &AwardOutcome) -> StatusCode {
    match outcome {
        AwardOutcome::Awarded(_) => StatusCode::CREATED,
        AwardOutcome::AlreadyEarned(_) => StatusCode::OK,
    }
}

/// Award an achievement to the caller, or (teachers only) to another user.
///
/// Awarding an achievement that is already held succeeds with `already_earned = true`.
#[utoipa::path(
    post,
    path = "/achievements/award",
    request_body = AwardRequest,
    responses(
        (status = 201, description = "Achievement newly awarded", body = AwardResponse),
        (status = 200, description = "Achievement was already earned", body = AwardResponse),
        (status = 401, description = "Not allowed to award to this user", body = ErrorBody),
        (status = 404, description = "Unknown achievement id", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    tag = "achievements"
)]
pub async fn award_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<AwardRequest>,
) -> Result<(StatusCode, Json<AwardResponse>), JsonError> {
    let target = award_target(&user, req.user_id)?;

    let outcome = award_and_record(
        state.achievements.as_ref(),
        state.activity.as_ref(),
        target,
        &req.achievement_id,
    )
    .await
    .map_err(port_error)?;

    Ok((award_status(&outcome), Json(outcome.into())))
}

/// List every badge with the caller's earned state, filtered and sorted by
/// the saved preferences unless overridden in the query.
#[utoipa::path(
    get,
    path = "/achievements",
    params(AchievementsQuery),
    responses(
        (status = 200, description = "Badges and summary", body = AchievementsResponse),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    tag = "achievements"
)]
pub async fn list_achievements_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<AchievementsQuery>,
) -> Result<Json<AchievementsResponse>, JsonError> {
    let (saved, badges) = futures::try_join!(
        AchievementPreferences::load(state.preferences.as_ref(), user.user_id),
        load_badges(state.achievements.as_ref(), user.user_id),
    )
    .map_err(port_error)?;

    let mut prefs = PreferencesDto::from(saved);
    if let Some(filter) = query.filter {
        prefs.filter = filter;
    }
    if let Some(sort) = query.sort {
        prefs.sort = sort;
    }

    let summary = summarize(&badges);
    let visible = AchievementPreferences::from(prefs).apply(badges);

    Ok(Json(AchievementsResponse {
        badges: visible.into_iter().map(BadgeDto::from).collect(),
        summary: summary.into(),
        preferences: prefs,
    }))
}

/// Save the caller's badge filter and sort order.
#[utoipa::path(
    put,
    path = "/achievements/preferences",
    request_body = PreferencesDto,
    responses(
        (status = 200, description = "Preferences saved", body = PreferencesDto),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    tag = "achievements"
)]
pub async fn update_preferences_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(prefs): Json<PreferencesDto>,
) -> Result<Json<PreferencesDto>, JsonError> {
    AchievementPreferences::from(prefs)
        .save(state.preferences.as_ref(), user.user_id)
        .await
        .map_err(port_error)?;
    Ok(Json(prefs))
}

/// The caller's daily-activity heat-map, ending today (UTC).
#[utoipa::path(
    get,
    path = "/activity/calendar",
    params(CalendarQuery),
    responses(
        (status = 200, description = "Heat-map weeks and streaks", body = CalendarResponse),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    tag = "achievements"
)]
pub async fn activity_calendar_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<CalendarResponse>, JsonError> {
    let weeks = query
        .weeks
        .unwrap_or(DEFAULT_CALENDAR_WEEKS)
        .clamp(1, MAX_CALENDAR_WEEKS);
    let today = Utc::now().date_naive();
    let since = ActivityCalendar::start_day(today, weeks);

    let counts = state
        .activity
        .daily_activity(user.user_id, since, today)
        .await
        .map_err(port_error)?;

    Ok(Json(ActivityCalendar::build(&counts, today, weeks).into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use moneyquest_core::domain::EarnedAchievement;

    fn caller(role: UserRole) -> AuthUser {
        AuthUser { user_id: Uuid::new_v4(), role }
    }

    fn earned_row() -> EarnedAchievement {
        EarnedAchievement {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            achievement_id: "first-chat".to_string(),
            earned_at: Utc::now(),
        }
    }

    #[test]
    fn awards_default_to_the_caller() {
        for role in [UserRole::Student, UserRole::Teacher] {
            let user = caller(role);
            assert_eq!(award_target(&user, None).unwrap(), user.user_id);
            assert_eq!(award_target(&user, Some(user.user_id)).unwrap(), user.user_id);
        }
    }

    #[test]
    fn students_cannot_award_other_users() {
        let (status, Json(body)) = award_target(&caller(UserRole::Student), Some(Uuid::new_v4()))
            .unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.error.contains("teachers"));
    }

    #[test]
    fn teachers_can_award_other_users() {
        let student = Uuid::new_v4();
        assert_eq!(award_target(&caller(UserRole::Teacher), Some(student)).unwrap(), student);
    }

    #[test]
    fn fresh_awards_are_created_and_repeats_are_ok() {
        assert_eq!(award_status(&AwardOutcome::Awarded(earned_row())), StatusCode::CREATED);
        assert_eq!(award_status(&AwardOutcome::AlreadyEarned(earned_row())), StatusCode::OK);
    }

    #[test]
    fn port_errors_map_to_json_statuses() {
        let (status, Json(body)) = port_error(PortError::NotFound("Achievement x not found".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "Achievement x not found");

        let (status, _) = port_error(PortError::Unauthorized);
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, Json(body)) = port_error(PortError::Unexpected("pool timed out".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
    }
}
