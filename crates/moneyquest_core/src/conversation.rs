//! crates/moneyquest_core/src/conversation.rs
//!
//! The per-conversation controller. It owns the dialogue state, the
//! append-only transcript and the set of shown card ids, and enforces a
//! single in-flight gateway turn at a time.

use crate::cards::{filter_cards, CardFilterOutcome, ShownCardIds};
use crate::chips::{classify_chip, prepare_chips, Chip, ChipKind};
use crate::domain::{
    Activity, HistoryEntry, Message, MentorProposal, MentorRequest, MentorResponse, Role, TurnMode,
};
use crate::mentor::MentorState;
use crate::ports::MentorChatService;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

/// How many prior transcript entries are forwarded to the gateway by default.
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("A mentor reply is still pending for this conversation")]
    TurnInFlight,
    #[error("No mentor reply is pending for this conversation")]
    NoTurnInFlight,
    #[error("Message text must not be empty")]
    EmptyMessage,
}

/// Bookkeeping for the one outstanding gateway call.
#[derive(Debug, Clone)]
struct PendingTurn {
    /// The proposal this turn accepted, kept so it can be reopened if the
    /// reply does not deliver the activity.
    accepted: Option<MentorProposal>,
}

/// What happened when a gateway reply was applied to the session.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub message: Message,
    pub chips: Vec<Chip>,
    pub cards: CardFilterOutcome,
    /// Whether the reply's proposal is now awaiting confirmation.
    pub proposal_held: bool,
}

/// How a tapped chip was routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipRoute {
    pub kind: ChipKind,
    pub request: MentorRequest,
}

pub struct MentorSession {
    id: Uuid,
    state: MentorState,
    transcript: Vec<Message>,
    shown_cards: ShownCardIds,
    chips: Vec<Chip>,
    in_flight: Option<PendingTurn>,
    history_window: usize,
}

impl MentorSession {
    pub fn new(id: Uuid) -> Self {
        Self::with_history_window(id, DEFAULT_HISTORY_WINDOW)
    }

    pub fn with_history_window(id: Uuid, history_window: usize) -> Self {
        Self {
            id,
            state: MentorState::Idle,
            transcript: Vec::new(),
            shown_cards: ShownCardIds::new(),
            chips: prepare_chips(&[], None),
            in_flight: None,
            history_window,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &MentorState {
        &self.state
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn shown_cards(&self) -> &ShownCardIds {
        &self.shown_cards
    }

    pub fn chips(&self) -> &[Chip] {
        &self.chips
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Starts a user turn and returns the request to send to the gateway.
    ///
    /// An `accept_id` only counts when it matches the pending proposal; a
    /// stale one is dropped and the turn proceeds as plain text.
    pub fn begin_turn(
        &mut self,
        text: &str,
        accept_id: Option<&str>,
    ) -> Result<MentorRequest, SessionError> {
        if self.in_flight.is_some() {
            return Err(SessionError::TurnInFlight);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let accepted = match accept_id {
            Some(id) => {
                let offered = self.state.pending_proposal().cloned();
                match self.state.accept_proposal(id) {
                    Some(_) => offered,
                    None => {
                        warn!(conversation_id = %self.id, accept_id = id, "Stale accept dropped");
                        None
                    }
                }
            }
            None => {
                if self.state.pending_proposal().is_some()
                    && classify_chip(text, self.state.pending_proposal()) == ChipKind::Reject
                {
                    self.state.reject_proposal();
                }
                None
            }
        };

        let history = self.history();
        self.transcript.push(Message {
            role: Role::User,
            content: text.to_string(),
            cards: Vec::new(),
            proposal: None,
            mode: TurnMode::Dialog,
            mood: None,
            created_at: Utc::now(),
        });

        let request = MentorRequest {
            message: text.to_string(),
            history,
            accept_proposal_id: accepted.as_ref().map(|a| a.id.clone()),
        };
        self.in_flight = Some(PendingTurn { accepted });
        Ok(request)
    }

    /// Routes a tapped chip: confirm accepts the pending proposal, reject
    /// declines it, and anything else is sent as plain text.
    pub fn tap_chip(&mut self, text: &str) -> Result<ChipRoute, SessionError> {
        if self.in_flight.is_some() {
            return Err(SessionError::TurnInFlight);
        }
        let kind = classify_chip(text, self.state.pending_proposal());
        let request = match kind {
            ChipKind::Confirm => {
                let accept_id = self.state.pending_proposal().map(|p| p.id.clone());
                self.begin_turn(text, accept_id.as_deref())?
            }
            ChipKind::Reject => {
                self.state.reject_proposal();
                self.begin_turn(text, None)?
            }
            ChipKind::Neutral => self.begin_turn(text, None)?,
        };
        Ok(ChipRoute { kind, request })
    }

    /// Applies the gateway's reply to the outstanding turn.
    pub fn complete_turn(&mut self, response: MentorResponse) -> Result<TurnOutcome, SessionError> {
        let pending = self.in_flight.take().ok_or(SessionError::NoTurnInFlight)?;

        let MentorResponse { mood, text, chips, cards, proposal, mode } = response;

        let cards = filter_cards(&mut self.shown_cards, cards, mode, pending.accepted.is_some());

        // An accept answered by anything but a final turn (including the
        // fallback) leaves the offer open, so the confirm chip works again.
        if let Some(offered) = pending.accepted.filter(|_| mode != TurnMode::Final) {
            self.state.reopen_proposal(offered);
        }
        if cards.suppressed_duplicates > 0 {
            warn!(
                conversation_id = %self.id,
                suppressed = cards.suppressed_duplicates,
                "Suppressed duplicate cards"
            );
        }

        let proposal_held = match &proposal {
            Some(p) => self.state.propose(p.clone()),
            None => false,
        };
        self.chips = prepare_chips(&chips, self.state.pending_proposal());

        let message = Message {
            role: Role::Assistant,
            content: text.unwrap_or_default(),
            cards: cards.rendered.clone(),
            proposal: if proposal_held { proposal } else { None },
            mode,
            mood: Some(mood),
            created_at: Utc::now(),
        };
        self.transcript.push(message.clone());

        Ok(TurnOutcome {
            message,
            chips: self.chips.clone(),
            cards,
            proposal_held,
        })
    }

    /// Completes the outstanding turn with the fixed fallback reply.
    pub fn fail_turn(&mut self) -> Result<TurnOutcome, SessionError> {
        warn!(conversation_id = %self.id, "Gateway failed; using fallback reply");
        self.complete_turn(MentorResponse::fallback())
    }

    /// Sends the request through `gateway`, falling back on any error.
    pub async fn exchange(
        &mut self,
        gateway: &dyn MentorChatService,
        request: &MentorRequest,
    ) -> Result<TurnOutcome, SessionError> {
        let response = respond_or_fallback(gateway, request).await;
        self.complete_turn(response)
    }

    /// The "activity_complete" signal from a card action.
    pub fn complete_activity(&mut self) -> Option<Activity> {
        let done = self.state.complete_activity();
        if done.is_some() {
            self.chips = prepare_chips(&[], None);
        }
        done
    }

    /// Tears the conversation down to a fresh, empty session with the same id.
    pub fn reset(&mut self) {
        info!(conversation_id = %self.id, "Resetting mentor session");
        self.state = MentorState::Idle;
        self.transcript.clear();
        self.shown_cards.clear();
        self.chips = prepare_chips(&[], None);
        self.in_flight = None;
    }

    fn history(&self) -> Vec<HistoryEntry> {
        let skip = self.transcript.len().saturating_sub(self.history_window);
        self.transcript
            .iter()
            .skip(skip)
            .map(|m| HistoryEntry {
                role: m.role,
                content: m.content.clone(),
            })
            .collect()
    }
}

/// Calls the gateway and substitutes [`MentorResponse::fallback`] on failure.
pub async fn respond_or_fallback(
    gateway: &dyn MentorChatService,
    request: &MentorRequest,
) -> MentorResponse {
    match gateway.reply(request).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Mentor gateway failed; substituting fallback");
            MentorResponse::fallback()
        }
    }
}
