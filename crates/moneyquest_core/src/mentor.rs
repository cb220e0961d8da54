//! crates/moneyquest_core/src/mentor.rs
//!
//! The consent-gated dialogue state machine. An activity (quiz, plan, recap)
//! only starts after the user accepts the exact proposal that offered it, and
//! at most one proposal or activity is held at any time.

use crate::domain::{Activity, ActivityKind, MentorProposal};
use tracing::{debug, info, warn};

/// The phase tag of [`MentorState`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentorMode {
    Idle,
    AwaitingConfirm,
    RunningQuiz,
    Planning,
}

impl MentorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MentorMode::Idle => "idle",
            MentorMode::AwaitingConfirm => "awaiting_confirm",
            MentorMode::RunningQuiz => "running_quiz",
            MentorMode::Planning => "planning",
        }
    }
}

/// The dialogue's current phase. The pending proposal and the current
/// activity live inside the variants, so they can never be set together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MentorState {
    #[default]
    Idle,
    AwaitingConfirm(MentorProposal),
    RunningQuiz(Activity),
    Planning(Activity),
}

impl MentorState {
    pub fn mode(&self) -> MentorMode {
        match self {
            MentorState::Idle => MentorMode::Idle,
            MentorState::AwaitingConfirm(_) => MentorMode::AwaitingConfirm,
            MentorState::RunningQuiz(_) => MentorMode::RunningQuiz,
            MentorState::Planning(_) => MentorMode::Planning,
        }
    }

    pub fn pending_proposal(&self) -> Option<&MentorProposal> {
        match self {
            MentorState::AwaitingConfirm(proposal) => Some(proposal),
            _ => None,
        }
    }

    pub fn current_activity(&self) -> Option<&Activity> {
        match self {
            MentorState::RunningQuiz(activity) | MentorState::Planning(activity) => Some(activity),
            _ => None,
        }
    }

    /// Holds a new proposal from the gateway, replacing any pending one.
    ///
    /// Returns `false` without changing state while an activity is running.
    pub fn propose(&mut self, proposal: MentorProposal) -> bool {
        if let Some(activity) = self.current_activity() {
            debug!(
                activity_id = %activity.id,
                proposal_id = %proposal.id,
                "Ignoring proposal while an activity is in progress"
            );
            return false;
        }
        debug!(proposal_id = %proposal.id, "Holding proposal for confirmation");
        *self = MentorState::AwaitingConfirm(proposal);
        true
    }

    /// Accepts the pending proposal if, and only if, its id equals `accept_id`.
    ///
    /// Returns `None` and leaves the state untouched when nothing is pending or
    /// the ids differ.
    pub fn accept_proposal(&mut self, accept_id: &str) -> Option<Activity> {
        let matches = self
            .pending_proposal()
            .is_some_and(|proposal| proposal.id == accept_id);
        if !matches {
            warn!(
                accept_id,
                mode = self.mode().as_str(),
                "Accept does not match a pending proposal; ignoring"
            );
            return None;
        }

        let MentorState::AwaitingConfirm(proposal) = std::mem::take(self) else {
            return None;
        };
        let activity = Activity {
            kind: proposal.kind,
            id: proposal.id,
        };
        *self = match activity.kind {
            ActivityKind::Quiz => MentorState::RunningQuiz(activity.clone()),
            ActivityKind::Plan | ActivityKind::Recap => MentorState::Planning(activity.clone()),
        };
        info!(activity_id = %activity.id, mode = self.mode().as_str(), "Proposal accepted");
        Some(activity)
    }

    /// Declines the pending proposal and returns to idle. No-op otherwise.
    pub fn reject_proposal(&mut self) -> Option<MentorProposal> {
        if self.pending_proposal().is_none() {
            return None;
        }
        match std::mem::take(self) {
            MentorState::AwaitingConfirm(proposal) => {
                info!(proposal_id = %proposal.id, "Proposal rejected");
                Some(proposal)
            }
            other => {
                *self = other;
                None
            }
        }
    }

    /// Puts an accepted proposal back up for confirmation when its activity
    /// was never delivered. No-op unless that activity is the one running.
    pub fn reopen_proposal(&mut self, proposal: MentorProposal) -> bool {
        let running = self
            .current_activity()
            .is_some_and(|activity| activity.id == proposal.id);
        if !running {
            return false;
        }
        info!(proposal_id = %proposal.id, "Activity not delivered; proposal reopened");
        *self = MentorState::AwaitingConfirm(proposal);
        true
    }

    /// Handles the "activity_complete" signal. No-op unless an activity is running.
    pub fn complete_activity(&mut self) -> Option<Activity> {
        if self.current_activity().is_none() {
            return None;
        }
        match std::mem::take(self) {
            MentorState::RunningQuiz(activity) | MentorState::Planning(activity) => {
                info!(activity_id = %activity.id, "Activity completed");
                Some(activity)
            }
            other => {
                *self = other;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal(kind: ActivityKind, id: &str) -> MentorProposal {
        MentorProposal {
            kind,
            id: id.to_string(),
            confirm_chip: "Yes, quiz me!".to_string(),
            description: "A quick quiz on inflation".to_string(),
            topic: Some("inflation".to_string()),
            size: Some(3),
        }
    }

    fn assert_exclusive(state: &MentorState) {
        assert!(!(state.pending_proposal().is_some() && state.current_activity().is_some()));
        assert_eq!(state.pending_proposal().is_some(), state.mode() == MentorMode::AwaitingConfirm);
        assert_eq!(
            state.current_activity().is_some(),
            matches!(state.mode(), MentorMode::RunningQuiz | MentorMode::Planning)
        );
    }

    #[test]
    fn accepting_a_quiz_starts_running_quiz() {
        let mut state = MentorState::default();
        assert!(state.propose(proposal(ActivityKind::Quiz, "q1")));
        assert_eq!(state.mode(), MentorMode::AwaitingConfirm);

        let activity = state.accept_proposal("q1").unwrap();
        assert_eq!(activity, Activity { kind: ActivityKind::Quiz, id: "q1".into() });
        assert_eq!(state.mode(), MentorMode::RunningQuiz);
        assert_eq!(state.current_activity(), Some(&activity));
        assert!(state.pending_proposal().is_none());
    }

    #[test]
    fn plan_and_recap_both_move_to_planning() {
        for kind in [ActivityKind::Plan, ActivityKind::Recap] {
            let mut state = MentorState::default();
            state.propose(proposal(kind, "p1"));
            state.accept_proposal("p1").unwrap();
            assert_eq!(state.mode(), MentorMode::Planning);
        }
    }

    #[test]
    fn mismatched_accept_leaves_state_unchanged() {
        let mut state = MentorState::default();
        state.propose(proposal(ActivityKind::Quiz, "q1"));
        let before = state.clone();

        assert!(state.accept_proposal("q2").is_none());
        assert_eq!(state, before);
    }

    #[test]
    fn accept_without_pending_proposal_is_noop() {
        let mut state = MentorState::default();
        assert!(state.accept_proposal("q1").is_none());
        assert_eq!(state, MentorState::Idle);
    }

    #[test]
    fn reject_clears_proposal() {
        let mut state = MentorState::default();
        state.propose(proposal(ActivityKind::Quiz, "q1"));
        let rejected = state.reject_proposal().unwrap();
        assert_eq!(rejected.id, "q1");
        assert_eq!(state, MentorState::Idle);
        assert!(state.reject_proposal().is_none());
    }

    #[test]
    fn newer_proposal_replaces_pending_one() {
        let mut state = MentorState::default();
        state.propose(proposal(ActivityKind::Quiz, "q1"));
        state.propose(proposal(ActivityKind::Plan, "p2"));
        assert_eq!(state.pending_proposal().map(|p| p.id.as_str()), Some("p2"));
        assert!(state.accept_proposal("q1").is_none());
    }

    #[test]
    fn proposals_are_ignored_during_an_activity() {
        let mut state = MentorState::default();
        state.propose(proposal(ActivityKind::Quiz, "q1"));
        state.accept_proposal("q1");

        assert!(!state.propose(proposal(ActivityKind::Plan, "p2")));
        assert_eq!(state.mode(), MentorMode::RunningQuiz);
    }

    #[test]
    fn complete_activity_returns_to_idle() {
        let mut state = MentorState::default();
        assert!(state.complete_activity().is_none());

        state.propose(proposal(ActivityKind::Plan, "p1"));
        assert!(state.complete_activity().is_none());
        assert_eq!(state.mode(), MentorMode::AwaitingConfirm);

        state.accept_proposal("p1");
        let done = state.complete_activity().unwrap();
        assert_eq!(done.id, "p1");
        assert_eq!(state, MentorState::Idle);
    }

    #[test]
    fn reopening_restores_the_offer_for_the_running_activity_only() {
        let mut state = MentorState::default();
        assert!(!state.reopen_proposal(proposal(ActivityKind::Quiz, "q1")));
        assert_eq!(state, MentorState::Idle);

        state.propose(proposal(ActivityKind::Quiz, "q1"));
        state.accept_proposal("q1");
        assert!(!state.reopen_proposal(proposal(ActivityKind::Quiz, "q2")));
        assert_eq!(state.mode(), MentorMode::RunningQuiz);

        assert!(state.reopen_proposal(proposal(ActivityKind::Quiz, "q1")));
        assert_eq!(state.pending_proposal().map(|p| p.id.as_str()), Some("q1"));
        assert_exclusive(&state);
    }

    #[test]
    fn proposal_and_activity_are_never_held_together() {
        let mut state = MentorState::default();
        assert_exclusive(&state);
        state.propose(proposal(ActivityKind::Quiz, "q1"));
        assert_exclusive(&state);
        state.accept_proposal("q1");
        assert_exclusive(&state);
        state.propose(proposal(ActivityKind::Recap, "r1"));
        assert_exclusive(&state);
        state.complete_activity();
        assert_exclusive(&state);
        state.propose(proposal(ActivityKind::Recap, "r1"));
        state.reject_proposal();
        assert_exclusive(&state);
    }
}
