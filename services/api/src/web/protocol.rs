//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the browser client and the API
//! server, and their conversions from the core domain types.
//!
//! The mentor contract uses camelCase keys; the achievement endpoints use snake_case.

use chrono::{DateTime, NaiveDate, Utc};
use moneyquest_core::achievements::{
    AchievementPreferences, AchievementSummary, AwardOutcome, Badge, BadgeFilter, BadgeSort,
};
use moneyquest_core::activity::{ActivityCalendar, HeatCell};
use moneyquest_core::chips::{Chip, ChipKind};
use moneyquest_core::domain::{
    Activity, ActivityKind, Card, EarnedAchievement, HistoryEntry, Message, MentorProposal,
    MentorRequest, MentorResponse, Mood, Role, TurnMode,
};
use moneyquest_core::mentor::{MentorMode, MentorState};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Mentor: Enums
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MoodDto {
    Cheer,
    Thinking,
    Proud,
    Curious,
    Gentle,
}

impl From<Mood> for MoodDto {
    fn from(mood: Mood) -> Self {
        match mood {
            Mood::Cheer => MoodDto::Cheer,
            Mood::Thinking => MoodDto::Thinking,
            Mood::Proud => MoodDto::Proud,
            Mood::Curious => MoodDto::Curious,
            Mood::Gentle => MoodDto::Gentle,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnModeDto {
    Dialog,
    Proposal,
    Final,
}

impl From<TurnMode> for TurnModeDto {
    fn from(mode: TurnMode) -> Self {
        match mode {
            TurnMode::Dialog => TurnModeDto::Dialog,
            TurnMode::Proposal => TurnModeDto::Proposal,
            TurnMode::Final => TurnModeDto::Final,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoleDto {
    User,
    Assistant,
}

impl From<Role> for RoleDto {
    fn from(role: Role) -> Self {
        match role {
            Role::User => RoleDto::User,
            Role::Assistant => RoleDto::Assistant,
        }
    }
}

impl From<RoleDto> for Role {
    fn from(role: RoleDto) -> Self {
        match role {
            RoleDto::User => Role::User,
            RoleDto::Assistant => Role::Assistant,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKindDto {
    Quiz,
    Plan,
    Recap,
}

impl From<ActivityKind> for ActivityKindDto {
    fn from(kind: ActivityKind) -> Self {
        match kind {
            ActivityKind::Quiz => ActivityKindDto::Quiz,
            ActivityKind::Plan => ActivityKindDto::Plan,
            ActivityKind::Recap => ActivityKindDto::Recap,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MentorModeDto {
    Idle,
    AwaitingConfirm,
    RunningQuiz,
    Planning,
}

impl From<MentorMode> for MentorModeDto {
    fn from(mode: MentorMode) -> Self {
        match mode {
            MentorMode::Idle => MentorModeDto::Idle,
            MentorMode::AwaitingConfirm => MentorModeDto::AwaitingConfirm,
            MentorMode::RunningQuiz => MentorModeDto::RunningQuiz,
            MentorMode::Planning => MentorModeDto::Planning,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChipKindDto {
    Confirm,
    Reject,
    Neutral,
}

impl From<ChipKind> for ChipKindDto {
    fn from(kind: ChipKind) -> Self {
        match kind {
            ChipKind::Confirm => ChipKindDto::Confirm,
            ChipKind::Reject => ChipKindDto::Reject,
            ChipKind::Neutral => ChipKindDto::Neutral,
        }
    }
}

//=========================================================================================
// Mentor: Gateway Contract
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct HistoryEntryDto {
    pub role: RoleDto,
    pub content: String,
}

/// The stateless chat gateway request.
#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<HistoryEntryDto>,
    #[serde(default)]
    pub accept_proposal_id: Option<String>,
}

impl From<ChatRequest> for MentorRequest {
    fn from(req: ChatRequest) -> Self {
        MentorRequest {
            message: req.message,
            history: req
                .conversation_history
                .into_iter()
                .map(|h| HistoryEntry {
                    role: h.role.into(),
                    content: h.content,
                })
                .collect(),
            accept_proposal_id: req.accept_proposal_id.filter(|id| !id.trim().is_empty()),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
pub struct QuizOptionDto {
    pub text: String,
    pub correct: bool,
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
pub struct PlanStepDto {
    pub title: String,
    pub action: String,
}

/// One interactive card, tagged by `type`.
#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CardDto {
    Quiz {
        id: String,
        question: String,
        options: Vec<QuizOptionDto>,
        #[serde(skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
    Plan {
        id: String,
        title: String,
        steps: Vec<PlanStepDto>,
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

impl From<Card> for CardDto {
    fn from(card: Card) -> Self {
        match card {
            Card::Quiz { id, question, options, explanation } => CardDto::Quiz {
                id,
                question,
                options: options
                    .into_iter()
                    .map(|o| QuizOptionDto { text: o.text, correct: o.correct })
                    .collect(),
                explanation,
            },
            Card::Plan { id, title, steps } => CardDto::Plan {
                id,
                title,
                steps: steps
                    .into_iter()
                    .map(|s| PlanStepDto { title: s.title, action: s.action })
                    .collect(),
            },
            Card::Recap { id, title, bullets } => CardDto::Recap { id, title, bullets },
            Card::Fix { id, mistake, rule, example } => CardDto::Fix { id, mistake, rule, example },
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProposalDto {
    #[serde(rename = "type")]
    pub kind: ActivityKindDto,
    pub id: String,
    pub confirm_chip: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

impl From<MentorProposal> for ProposalDto {
    fn from(p: MentorProposal) -> Self {
        ProposalDto {
            kind: p.kind.into(),
            id: p.id,
            confirm_chip: p.confirm_chip,
            description: p.description,
            topic: p.topic,
            size: p.size,
        }
    }
}

/// The stateless chat gateway response.
#[derive(Serialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub mood: MoodDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub chips: Vec<String>,
    pub cards: Vec<CardDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal: Option<ProposalDto>,
    pub mode: TurnModeDto,
}

impl From<MentorResponse> for ChatResponse {
    fn from(r: MentorResponse) -> Self {
        ChatResponse {
            mood: r.mood.into(),
            text: r.text,
            chips: r.chips,
            cards: r.cards.into_iter().map(Into::into).collect(),
            proposal: r.proposal.map(Into::into),
            mode: r.mode.into(),
        }
    }
}

//=========================================================================================
// Mentor: Conversations
//=========================================================================================

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ActivityDto {
    #[serde(rename = "type")]
    pub kind: ActivityKindDto,
    pub id: String,
}

impl From<&Activity> for ActivityDto {
    fn from(a: &Activity) -> Self {
        ActivityDto {
            kind: a.kind.into(),
            id: a.id.clone(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MentorStateDto {
    pub mode: MentorModeDto,
    pub pending_proposal: Option<ProposalDto>,
    pub current_activity: Option<ActivityDto>,
}

impl From<&MentorState> for MentorStateDto {
    fn from(state: &MentorState) -> Self {
        MentorStateDto {
            mode: state.mode().into(),
            pending_proposal: state.pending_proposal().cloned().map(Into::into),
            current_activity: state.current_activity().map(Into::into),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ChipDto {
    pub text: String,
    pub kind: ChipKindDto,
}

impl From<&Chip> for ChipDto {
    fn from(chip: &Chip) -> Self {
        ChipDto {
            text: chip.text.clone(),
            kind: chip.kind.into(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub role: RoleDto,
    pub content: String,
    pub cards: Vec<CardDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal: Option<ProposalDto>,
    pub mode: TurnModeDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<MoodDto>,
    pub timestamp: DateTime<Utc>,
}

impl From<Message> for MessageDto {
    fn from(m: Message) -> Self {
        MessageDto {
            role: m.role.into(),
            content: m.content,
            cards: m.cards.into_iter().map(Into::into).collect(),
            proposal: m.proposal.map(Into::into),
            mode: m.mode.into(),
            mood: m.mood.map(Into::into),
            timestamp: m.created_at,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationResponse {
    pub conversation_id: Uuid,
    pub state: MentorStateDto,
    pub chips: Vec<ChipDto>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub conversation_id: Uuid,
    pub state: MentorStateDto,
    pub transcript: Vec<MessageDto>,
    pub chips: Vec<ChipDto>,
    pub loading: bool,
    pub shown_card_count: usize,
}

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub message: String,
    #[serde(default)]
    pub accept_proposal_id: Option<String>,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct TapChipRequest {
    pub chip: String,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub conversation_id: Uuid,
    /// How a tapped chip was routed; absent for free-text sends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routed_as: Option<ChipKindDto>,
    pub reply: MessageDto,
    pub chips: Vec<ChipDto>,
    pub state: MentorStateDto,
    pub withheld_cards: usize,
    pub suppressed_duplicates: usize,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ActivityCompleteResponse {
    pub completed: Option<ActivityDto>,
    pub state: MentorStateDto,
    pub chips: Vec<ChipDto>,
}

//=========================================================================================
// Achievements
//=========================================================================================

#[derive(Deserialize, ToSchema, Debug)]
pub struct AwardRequest {
    pub achievement_id: String,
    /// Defaults to the caller. Only teachers may award to someone else.
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
pub struct EarnedAchievementDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub achievement_id: String,
    pub earned_at: DateTime<Utc>,
}

impl From<EarnedAchievement> for EarnedAchievementDto {
    fn from(e: EarnedAchievement) -> Self {
        EarnedAchievementDto {
            id: e.id,
            user_id: e.user_id,
            achievement_id: e.achievement_id,
            earned_at: e.earned_at,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct AwardResponse {
    pub already_earned: bool,
    pub message: String,
    pub achievement: EarnedAchievementDto,
}

impl From<AwardOutcome> for AwardResponse {
    fn from(outcome: AwardOutcome) -> Self {
        match outcome {
            AwardOutcome::Awarded(row) => AwardResponse {
                already_earned: false,
                message: "Achievement awarded".to_string(),
                achievement: row.into(),
            },
            AwardOutcome::AlreadyEarned(row) => AwardResponse {
                already_earned: true,
                message: "Achievement already earned".to_string(),
                achievement: row.into(),
            },
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BadgeFilterDto {
    All,
    Earned,
    Locked,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BadgeSortDto {
    Newest,
    Name,
    Points,
    Category,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreferencesDto {
    pub filter: BadgeFilterDto,
    pub sort: BadgeSortDto,
}

impl From<AchievementPreferences> for PreferencesDto {
    fn from(p: AchievementPreferences) -> Self {
        PreferencesDto {
            filter: match p.filter {
                BadgeFilter::All => BadgeFilterDto::All,
                BadgeFilter::Earned => BadgeFilterDto::Earned,
                BadgeFilter::Locked => BadgeFilterDto::Locked,
            },
            sort: match p.sort {
                BadgeSort::Newest => BadgeSortDto::Newest,
                BadgeSort::Name => BadgeSortDto::Name,
                BadgeSort::Points => BadgeSortDto::Points,
                BadgeSort::Category => BadgeSortDto::Category,
            },
        }
    }
}

impl From<PreferencesDto> for AchievementPreferences {
    fn from(p: PreferencesDto) -> Self {
        AchievementPreferences {
            filter: match p.filter {
                BadgeFilterDto::All => BadgeFilter::All,
                BadgeFilterDto::Earned => BadgeFilter::Earned,
                BadgeFilterDto::Locked => BadgeFilter::Locked,
            },
            sort: match p.sort {
                BadgeSortDto::Newest => BadgeSort::Newest,
                BadgeSortDto::Name => BadgeSort::Name,
                BadgeSortDto::Points => BadgeSort::Points,
                BadgeSortDto::Category => BadgeSort::Category,
            },
        }
    }
}

/// Optional one-off overrides of the saved preferences.
#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct AchievementsQuery {
    pub filter: Option<BadgeFilterDto>,
    pub sort: Option<BadgeSortDto>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct BadgeDto {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub points: u32,
    pub icon: Option<String>,
    pub earned: bool,
    pub earned_at: Option<DateTime<Utc>>,
}

impl From<Badge> for BadgeDto {
    fn from(b: Badge) -> Self {
        BadgeDto {
            earned: b.is_earned(),
            earned_at: b.earned_at,
            id: b.achievement.id,
            name: b.achievement.name,
            description: b.achievement.description,
            category: b.achievement.category,
            points: b.achievement.points,
            icon: b.achievement.icon,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct SummaryDto {
    pub earned: usize,
    pub total: usize,
    pub points: u32,
    pub percent_complete: u32,
}

impl From<AchievementSummary> for SummaryDto {
    fn from(s: AchievementSummary) -> Self {
        SummaryDto {
            earned: s.earned,
            total: s.total,
            points: s.points,
            percent_complete: s.percent_complete(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct AchievementsResponse {
    pub badges: Vec<BadgeDto>,
    pub summary: SummaryDto,
    pub preferences: PreferencesDto,
}

//=========================================================================================
// Activity Calendar
//=========================================================================================

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct CalendarQuery {
    /// Number of weeks to show, 1 to 53.
    pub weeks: Option<u32>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct HeatCellDto {
    pub day: NaiveDate,
    pub count: u32,
    pub level: u8,
}

impl From<HeatCell> for HeatCellDto {
    fn from(c: HeatCell) -> Self {
        HeatCellDto {
            day: c.day,
            count: c.count,
            level: c.level,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct CalendarResponse {
    pub weeks: Vec<Vec<HeatCellDto>>,
    pub total: u32,
    pub active_days: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
}

impl From<ActivityCalendar> for CalendarResponse {
    fn from(c: ActivityCalendar) -> Self {
        CalendarResponse {
            weeks: c
                .weeks
                .into_iter()
                .map(|w| w.into_iter().map(Into::into).collect())
                .collect(),
            total: c.total,
            active_days: c.active_days,
            current_streak: c.current_streak,
            longest_streak: c.longest_streak,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_request_uses_camel_case_keys() {
        let req: ChatRequest = serde_json::from_value(json!({
            "message": "Yes, quiz me!",
            "conversationHistory": [{"role": "assistant", "content": "Want a quiz?"}],
            "acceptProposalId": "q1"
        }))
        .unwrap();
        let domain: MentorRequest = req.into();
        assert_eq!(domain.accept_proposal_id.as_deref(), Some("q1"));
        assert_eq!(domain.history[0].role, Role::Assistant);
    }

    #[test]
    fn blank_accept_id_is_treated_as_absent() {
        let req: ChatRequest =
            serde_json::from_value(json!({"message": "hi", "acceptProposalId": " "})).unwrap();
        assert!(MentorRequest::from(req).accept_proposal_id.is_none());
    }

    #[test]
    fn fallback_serializes_to_the_gateway_contract() {
        let value = serde_json::to_value(ChatResponse::from(MentorResponse::fallback())).unwrap();
        assert_eq!(value["mood"], "gentle");
        assert_eq!(value["mode"], "dialog");
        assert_eq!(value["cards"], json!([]));
        assert_eq!(value["chips"].as_array().map(|c| c.len()), Some(3));
        assert!(value.get("proposal").is_none());
    }

    #[test]
    fn cards_and_proposals_are_tagged_by_type() {
        let card = CardDto::from(Card::Fix {
            id: "f1".into(),
            mistake: "Buying the bigger box".into(),
            rule: "Compare unit prices".into(),
            example: "$/oz on the shelf tag".into(),
        });
        let value = serde_json::to_value(card).unwrap();
        assert_eq!(value["type"], "fix");
        assert_eq!(value["id"], "f1");

        let proposal = ProposalDto::from(MentorProposal {
            kind: ActivityKind::Recap,
            id: "r1".into(),
            confirm_chip: "Sure!".into(),
            description: "Recap".into(),
            topic: None,
            size: None,
        });
        let value = serde_json::to_value(proposal).unwrap();
        assert_eq!(value["type"], "recap");
        assert_eq!(value["confirmChip"], "Sure!");
        assert!(value.get("topic").is_none());
    }

    #[test]
    fn award_request_user_id_is_optional() {
        let req: AwardRequest = serde_json::from_value(json!({"achievement_id": "first-chat"})).unwrap();
        assert!(req.user_id.is_none());
    }
}
