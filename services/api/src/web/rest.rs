//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification. Served by the API
//! binary through Swagger UI and written to disk by the `openapi` binary.

use crate::web::{achievements, mentor};
use crate::web::protocol::{
    AchievementsResponse, ActivityCompleteResponse, ActivityDto, ActivityKindDto, AwardRequest,
    AwardResponse, BadgeDto, BadgeFilterDto, BadgeSortDto, CalendarResponse, CardDto,
    ChatRequest, ChatResponse, ChipDto, ChipKindDto, ConversationResponse,
    CreateConversationResponse, EarnedAchievementDto, ErrorBody, HeatCellDto, HistoryEntryDto,
    MentorModeDto, MentorStateDto, MessageDto, MoodDto, PlanStepDto, PreferencesDto, ProposalDto,
    QuizOptionDto, RoleDto, SendMessageRequest, SummaryDto, TapChipRequest, TurnModeDto,
    TurnResponse,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        mentor::chat_handler,
        mentor::create_conversation_handler,
        mentor::get_conversation_handler,
        mentor::delete_conversation_handler,
        mentor::send_message_handler,
        mentor::tap_chip_handler,
        mentor::complete_activity_handler,
        achievements::award_handler,
        achievements::list_achievements_handler,
        achievements::update_preferences_handler,
        achievements::activity_calendar_handler,
    ),
    components(
        schemas(
            ChatRequest, ChatResponse, HistoryEntryDto, CardDto, QuizOptionDto, PlanStepDto,
            ProposalDto, MoodDto, TurnModeDto, RoleDto, ActivityKindDto, ActivityDto,
            MentorModeDto, MentorStateDto, ChipKindDto, ChipDto, MessageDto,
            CreateConversationResponse, ConversationResponse, SendMessageRequest,
            TapChipRequest, TurnResponse, ActivityCompleteResponse,
            AwardRequest, AwardResponse, EarnedAchievementDto, ErrorBody, BadgeFilterDto,
            BadgeSortDto, PreferencesDto, BadgeDto, SummaryDto, AchievementsResponse,
            HeatCellDto, CalendarResponse,
        )
    ),
    tags(
        (name = "mentor", description = "Consent-gated money-mentor chat."),
        (name = "achievements", description = "Badges, awards and the daily-activity heat-map.")
    )
)]
pub struct ApiDoc;
