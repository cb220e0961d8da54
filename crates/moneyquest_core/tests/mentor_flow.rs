//! End-to-end conversation flows against a scripted gateway.

use async_trait::async_trait;
use moneyquest_core::chips::{ChipKind, MAX_CHIPS};
use moneyquest_core::domain::{Card, QuizOption};
use moneyquest_core::{
    ActivityKind, MentorChatService, MentorMode, MentorProposal, MentorRequest, MentorResponse,
    MentorSession, Mood, PortError, PortResult, TurnMode,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

/// Replays canned replies and records every request it receives.
struct ScriptedGateway {
    replies: Mutex<VecDeque<PortResult<MentorResponse>>>,
    seen: Mutex<Vec<MentorRequest>>,
}

impl ScriptedGateway {
    fn new(replies: Vec<PortResult<MentorResponse>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MentorChatService for ScriptedGateway {
    async fn reply(&self, request: &MentorRequest) -> PortResult<MentorResponse> {
        self.seen.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PortError::Unexpected("script exhausted".into())))
    }
}

fn dialog(text: &str) -> MentorResponse {
    MentorResponse {
        mood: Mood::Curious,
        text: Some(text.to_string()),
        chips: Vec::new(),
        cards: Vec::new(),
        proposal: None,
        mode: TurnMode::Dialog,
    }
}

fn quiz_proposal() -> MentorResponse {
    MentorResponse {
        proposal: Some(MentorProposal {
            kind: ActivityKind::Quiz,
            id: "q1".to_string(),
            confirm_chip: "Yes, quiz me!".to_string(),
            description: "Three quick questions about inflation".to_string(),
            topic: Some("inflation".to_string()),
            size: Some(3),
        }),
        chips: vec!["Yes, quiz me!".into(), "No thanks".into(), "What is CPI?".into()],
        mode: TurnMode::Proposal,
        ..dialog("Want a quick quiz?")
    }
}

fn quiz_card(id: &str) -> Card {
    Card::Quiz {
        id: id.to_string(),
        question: "If prices rise 5% and your pay rises 2%, what happens?".to_string(),
        options: vec![
            QuizOption { text: "You can buy less".into(), correct: true },
            QuizOption { text: "You can buy more".into(), correct: false },
        ],
        explanation: None,
    }
}

fn final_with(cards: Vec<Card>) -> MentorResponse {
    MentorResponse {
        mood: Mood::Proud,
        cards,
        mode: TurnMode::Final,
        ..dialog("Here you go!")
    }
}

#[tokio::test]
async fn scenario_a_accepting_starts_the_quiz() {
    let gateway = ScriptedGateway::new(vec![Ok(quiz_proposal()), Ok(final_with(vec![quiz_card("c1")]))]);
    let mut session = MentorSession::new(Uuid::new_v4());

    let request = session.begin_turn("Teach me inflation", None).unwrap();
    session.exchange(&gateway, &request).await.unwrap();
    assert_eq!(session.state().mode(), MentorMode::AwaitingConfirm);

    let request = session.begin_turn("Yes, quiz me!", Some("q1")).unwrap();
    assert_eq!(request.accept_proposal_id.as_deref(), Some("q1"));
    assert_eq!(session.state().mode(), MentorMode::RunningQuiz);
    let activity = session.state().current_activity().unwrap();
    assert_eq!((activity.kind, activity.id.as_str()), (ActivityKind::Quiz, "q1"));

    let outcome = session.exchange(&gateway, &request).await.unwrap();
    assert_eq!(outcome.message.cards, vec![quiz_card("c1")]);

    let seen = gateway.seen.lock().unwrap();
    assert_eq!(seen[1].history.len(), 2);
}

#[tokio::test]
async fn scenario_b_rejecting_returns_to_idle() {
    let gateway = ScriptedGateway::new(vec![Ok(quiz_proposal()), Ok(dialog("No problem!"))]);
    let mut session = MentorSession::new(Uuid::new_v4());

    let request = session.begin_turn("Teach me inflation", None).unwrap();
    session.exchange(&gateway, &request).await.unwrap();

    let route = session.tap_chip("No thanks").unwrap();
    assert_eq!(route.kind, ChipKind::Reject);
    assert!(route.request.accept_proposal_id.is_none());
    assert_eq!(session.state().mode(), MentorMode::Idle);
    assert!(session.state().pending_proposal().is_none());
    assert!(session.state().current_activity().is_none());

    session.exchange(&gateway, &route.request).await.unwrap();
    assert_eq!(session.chips().len(), MAX_CHIPS);
}

#[tokio::test]
async fn scenario_c_final_cards_without_accept_are_withheld() {
    let gateway = ScriptedGateway::new(vec![Ok(final_with(vec![quiz_card("c1")]))]);
    let mut session = MentorSession::new(Uuid::new_v4());

    let request = session.begin_turn("Just show me a quiz", None).unwrap();
    assert!(request.accept_proposal_id.is_none());
    let outcome = session.exchange(&gateway, &request).await.unwrap();

    assert!(outcome.message.cards.is_empty());
    assert_eq!(outcome.cards.withheld, 1);
    assert!(session.shown_cards().is_empty());
}

#[tokio::test]
async fn scenario_d_repeated_card_is_suppressed() {
    let plan_proposal = MentorResponse {
        proposal: Some(MentorProposal {
            kind: ActivityKind::Plan,
            id: "p2".to_string(),
            confirm_chip: "Make my plan".to_string(),
            description: "A savings plan".to_string(),
            topic: None,
            size: None,
        }),
        mode: TurnMode::Proposal,
        ..dialog("Shall we plan?")
    };
    let gateway = ScriptedGateway::new(vec![
        Ok(quiz_proposal()),
        Ok(final_with(vec![quiz_card("c1")])),
        Ok(plan_proposal),
        Ok(final_with(vec![quiz_card("c1")])),
    ]);
    let mut session = MentorSession::new(Uuid::new_v4());

    let request = session.begin_turn("Quiz me", None).unwrap();
    session.exchange(&gateway, &request).await.unwrap();
    let route = session.tap_chip("Yes, quiz me!").unwrap();
    let turn3 = session.exchange(&gateway, &route.request).await.unwrap();
    assert_eq!(turn3.message.cards.len(), 1);
    assert!(session.complete_activity().is_some());

    let request = session.begin_turn("Now a plan", None).unwrap();
    session.exchange(&gateway, &request).await.unwrap();
    let route = session.tap_chip("Make my plan").unwrap();
    assert_eq!(route.request.accept_proposal_id.as_deref(), Some("p2"));
    let turn5 = session.exchange(&gateway, &route.request).await.unwrap();

    assert!(turn5.message.cards.is_empty());
    assert_eq!(turn5.cards.suppressed_duplicates, 1);
}

#[tokio::test]
async fn gateway_failure_degrades_to_fallback() {
    let gateway = ScriptedGateway::new(vec![Err(PortError::Unexpected("upstream 502".into()))]);
    let mut session = MentorSession::new(Uuid::new_v4());

    let request = session.begin_turn("Hello", None).unwrap();
    let outcome = session.exchange(&gateway, &request).await.unwrap();

    assert_eq!(outcome.message.content, MentorResponse::FALLBACK_TEXT);
    assert_eq!(outcome.chips.len(), MAX_CHIPS);
    assert!(!session.is_loading());
}

#[tokio::test]
async fn retrying_after_a_failed_accept_delivers_the_activity() {
    let gateway = ScriptedGateway::new(vec![
        Ok(quiz_proposal()),
        Err(PortError::Unexpected("upstream timeout".into())),
        Ok(final_with(vec![quiz_card("c1")])),
    ]);
    let mut session = MentorSession::new(Uuid::new_v4());

    let request = session.begin_turn("Teach me inflation", None).unwrap();
    session.exchange(&gateway, &request).await.unwrap();

    let route = session.tap_chip("Yes, quiz me!").unwrap();
    let failed = session.exchange(&gateway, &route.request).await.unwrap();
    assert_eq!(failed.message.content, MentorResponse::FALLBACK_TEXT);
    assert_eq!(session.state().mode(), MentorMode::AwaitingConfirm);

    let request = session.begin_turn("Yes, quiz me!", Some("q1")).unwrap();
    assert_eq!(request.accept_proposal_id.as_deref(), Some("q1"));
    let outcome = session.exchange(&gateway, &request).await.unwrap();

    assert_eq!(outcome.message.cards, vec![quiz_card("c1")]);
    assert_eq!(outcome.cards.withheld, 0);
    assert_eq!(session.state().mode(), MentorMode::RunningQuiz);
}

#[tokio::test]
async fn excess_gateway_chips_are_capped() {
    let chatty = MentorResponse {
        chips: (0..7).map(|i| format!("Option {i}")).collect(),
        ..dialog("So many ideas")
    };
    let gateway = ScriptedGateway::new(vec![Ok(chatty)]);
    let mut session = MentorSession::new(Uuid::new_v4());

    let request = session.begin_turn("Ideas?", None).unwrap();
    let outcome = session.exchange(&gateway, &request).await.unwrap();
    assert_eq!(outcome.chips.len(), MAX_CHIPS);
    assert_eq!(outcome.chips[2].text, "Option 2");
}
