//! services/api/src/web/mentor.rs
//!
//! Axum handlers for the money-mentor chat: the stateless gateway endpoint and
//! the consent-gated conversation endpoints built on `MentorSession`.
//!
//! A conversation's lock is never held across the gateway call, so a second
//! send during that window is answered with 409 instead of queueing.

use crate::web::protocol::{
    ActivityCompleteResponse, ChatRequest, ChatResponse, ChipDto, ChipKindDto,
    ConversationResponse, CreateConversationResponse, MentorStateDto, SendMessageRequest,
    TapChipRequest, TurnResponse,
};
use crate::web::state::{AppState, SharedConversation};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use moneyquest_core::achievements::{activity_achievement, award_and_record};
use moneyquest_core::conversation::{respond_or_fallback, SessionError};
use moneyquest_core::domain::{ActivityEvent, AuthUser, MentorRequest};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

type HandlerError = (StatusCode, String);

fn session_error(e: SessionError) -> HandlerError {
    let status = match e {
        SessionError::TurnInFlight | SessionError::NoTurnInFlight => StatusCode::CONFLICT,
        SessionError::EmptyMessage => StatusCode::BAD_REQUEST,
    };
    (status, e.to_string())
}

fn conversation_not_found(id: Uuid) -> HandlerError {
    (StatusCode::NOT_FOUND, format!("Conversation {} not found", id))
}

async fn load_conversation(
    state: &AppState,
    id: Uuid,
    user: &AuthUser,
) -> Result<SharedConversation, HandlerError> {
    state
        .conversations
        .get(id, user.user_id)
        .await
        .ok_or_else(|| conversation_not_found(id))
}

//=========================================================================================
// Stateless Gateway
//=========================================================================================

/// Relay one turn to the mentor model.
///
/// Always answers 200: upstream failures are replaced by the fallback reply.
#[utoipa::path(
    post,
    path = "/mentor/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Structured mentor reply (or the fallback reply)", body = ChatResponse),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    tag = "mentor"
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let request: MentorRequest = req.into();
    let response = respond_or_fallback(state.mentor.as_ref(), &request).await;
    Json(response.into())
}

//=========================================================================================
// Conversations
//=========================================================================================

/// Start a new mentor conversation.
#[utoipa::path(
    post,
    path = "/mentor/conversations",
    responses(
        (status = 201, description = "Conversation created", body = CreateConversationResponse),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    tag = "mentor"
)]
pub async fn create_conversation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = state
        .conversations
        .create(user.user_id, state.config.history_window)
        .await;
    let conversation = load_conversation(&state, id, &user).await?;
    let entry = conversation.lock().await;

    let response = CreateConversationResponse {
        conversation_id: id,
        state: MentorStateDto::from(entry.session.state()),
        chips: entry.session.chips().iter().map(ChipDto::from).collect(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Fetch a conversation's state and transcript.
#[utoipa::path(
    get,
    path = "/mentor/conversations/{id}",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Conversation snapshot", body = ConversationResponse),
        (status = 404, description = "No such conversation for this user")
    ),
    tag = "mentor"
)]
pub async fn get_conversation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationResponse>, HandlerError> {
    let conversation = load_conversation(&state, id, &user).await?;
    let entry = conversation.lock().await;
    let session = &entry.session;

    Ok(Json(ConversationResponse {
        conversation_id: id,
        state: session.state().into(),
        transcript: session.transcript().iter().cloned().map(Into::into).collect(),
        chips: session.chips().iter().map(ChipDto::from).collect(),
        loading: session.is_loading(),
        shown_card_count: session.shown_cards().len(),
    }))
}

/// Tear a conversation down. Its shown-card memory is discarded.
#[utoipa::path(
    delete,
    path = "/mentor/conversations/{id}",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 204, description = "Conversation removed"),
        (status = 404, description = "No such conversation for this user")
    ),
    tag = "mentor"
)]
pub async fn delete_conversation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HandlerError> {
    if state.conversations.remove(id, user.user_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(conversation_not_found(id))
    }
}

/// Send a free-text message, optionally accepting the pending proposal.
#[utoipa::path(
    post,
    path = "/mentor/conversations/{id}/messages",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "The mentor's reply for this turn", body = TurnResponse),
        (status = 400, description = "Empty message"),
        (status = 404, description = "No such conversation for this user"),
        (status = 409, description = "A reply is still pending")
    ),
    tag = "mentor"
)]
pub async fn send_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<TurnResponse>, HandlerError> {
    let conversation = load_conversation(&state, id, &user).await?;
    let request = {
        let mut entry = conversation.lock().await;
        entry
            .session
            .begin_turn(&req.message, req.accept_proposal_id.as_deref())
            .map_err(session_error)?
    };
    run_turn(&state, &conversation, id, &user, request, None).await
}

/// Tap one of the offered quick-reply chips.
#[utoipa::path(
    post,
    path = "/mentor/conversations/{id}/chips",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = TapChipRequest,
    responses(
        (status = 200, description = "The mentor's reply for this turn", body = TurnResponse),
        (status = 400, description = "Empty chip"),
        (status = 404, description = "No such conversation for this user"),
        (status = 409, description = "A reply is still pending")
    ),
    tag = "mentor"
)]
pub async fn tap_chip_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<TapChipRequest>,
) -> Result<Json<TurnResponse>, HandlerError> {
    let conversation = load_conversation(&state, id, &user).await?;
    let route = {
        let mut entry = conversation.lock().await;
        entry.session.tap_chip(&req.chip).map_err(session_error)?
    };
    info!(conversation_id = %id, kind = route.kind.as_str(), "Chip tapped");
    run_turn(&state, &conversation, id, &user, route.request, Some(route.kind.into())).await
}

async fn run_turn(
    state: &AppState,
    conversation: &SharedConversation,
    id: Uuid,
    user: &AuthUser,
    request: MentorRequest,
    routed_as: Option<ChipKindDto>,
) -> Result<Json<TurnResponse>, HandlerError> {
    let response = respond_or_fallback(state.mentor.as_ref(), &request).await;

    let (outcome, mentor_state) = {
        let mut entry = conversation.lock().await;
        let outcome = entry.session.complete_turn(response).map_err(session_error)?;
        (outcome, MentorStateDto::from(entry.session.state()))
    };

    if let Err(e) = state
        .activity
        .record_activity(user.user_id, ActivityEvent::MentorTurn)
        .await
    {
        warn!("Failed to record mentor activity: {:?}", e);
    }

    Ok(Json(TurnResponse {
        conversation_id: id,
        routed_as,
        chips: outcome.chips.iter().map(ChipDto::from).collect(),
        withheld_cards: outcome.cards.withheld,
        suppressed_duplicates: outcome.cards.suppressed_duplicates,
        reply: outcome.message.into(),
        state: mentor_state,
    }))
}

/// Signal that the running quiz or plan has been finished.
#[utoipa::path(
    post,
    path = "/mentor/conversations/{id}/activity/complete",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Activity closed (no-op when none was running)", body = ActivityCompleteResponse),
        (status = 404, description = "No such conversation for this user")
    ),
    tag = "mentor"
)]
pub async fn complete_activity_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActivityCompleteResponse>, HandlerError> {
    let conversation = load_conversation(&state, id, &user).await?;
    let (completed, mentor_state, chips) = {
        let mut entry = conversation.lock().await;
        let completed = entry.session.complete_activity();
        (
            completed,
            MentorStateDto::from(entry.session.state()),
            entry.session.chips().iter().map(ChipDto::from).collect::<Vec<_>>(),
        )
    };

    if let Some(achievement_id) = completed.as_ref().and_then(|a| activity_achievement(a.kind)) {
        if let Err(e) = award_and_record(
            state.achievements.as_ref(),
            state.activity.as_ref(),
            user.user_id,
            achievement_id,
        )
        .await
        {
            warn!(achievement_id, "Failed to award activity achievement: {:?}", e);
        }
    }

    Ok(Json(ActivityCompleteResponse {
        completed: completed.as_ref().map(Into::into),
        state: mentor_state,
        chips,
    }))
}
