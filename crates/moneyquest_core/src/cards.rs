//! crates/moneyquest_core/src/cards.rs
//!
//! Consent gating and per-conversation de-duplication of interactive cards.

use crate::domain::{Card, TurnMode};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Card ids already rendered in one conversation. Only ever grows until the
/// owning session is reset.
#[derive(Debug, Clone, Default)]
pub struct ShownCardIds {
    ids: HashSet<String>,
}

impl ShownCardIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn insert(&mut self, id: &str) -> bool {
        self.ids.insert(id.to_string())
    }

    pub(crate) fn clear(&mut self) {
        self.ids.clear();
    }
}

/// Why cards were withheld for a turn, if they were.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardGate {
    Open,
    NotFinal,
    NoConsent,
}

/// The result of filtering one gateway response's cards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardFilterOutcome {
    pub rendered: Vec<Card>,
    pub gate: CardGate,
    /// Cards dropped because consent gating was closed.
    pub withheld: usize,
    /// Cards dropped because their id was already shown.
    pub suppressed_duplicates: usize,
}

/// Decides whether a turn may show cards at all.
pub fn card_gate(mode: TurnMode, accepted: bool) -> CardGate {
    match (mode, accepted) {
        (TurnMode::Final, true) => CardGate::Open,
        (TurnMode::Final, false) => CardGate::NoConsent,
        _ => CardGate::NotFinal,
    }
}

/// Returns the subset of `cards` to render and records their ids in `shown`.
///
/// Cards are only eligible on a `final` turn whose user message carried an
/// honoured accept id. Eligible cards whose id was already shown, or repeats
/// an id earlier in the same batch, are dropped.
pub fn filter_cards(
    shown: &mut ShownCardIds,
    cards: Vec<Card>,
    mode: TurnMode,
    accepted: bool,
) -> CardFilterOutcome {
    let gate = card_gate(mode, accepted);
    if gate != CardGate::Open {
        if !cards.is_empty() {
            debug!(count = cards.len(), ?gate, "Withholding cards from a non-consented turn");
        }
        return CardFilterOutcome {
            rendered: Vec::new(),
            gate,
            withheld: cards.len(),
            suppressed_duplicates: 0,
        };
    }

    let eligible = cards.len();
    let rendered: Vec<Card> = cards
        .into_iter()
        .filter(|card| {
            let fresh = shown.insert(card.id());
            if !fresh {
                debug!(card_id = card.id(), "Dropping already shown card");
            }
            fresh
        })
        .collect();

    let suppressed_duplicates = eligible - rendered.len();
    if eligible > 0 && rendered.is_empty() {
        warn!(suppressed_duplicates, "Every card in this turn was a duplicate; nothing rendered");
    }

    CardFilterOutcome {
        rendered,
        gate,
        withheld: 0,
        suppressed_duplicates,
    }
}
