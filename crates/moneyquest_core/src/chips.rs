//! crates/moneyquest_core/src/chips.rs
//!
//! Classifies the mentor's suggested short replies ("chips") so a tap can be
//! routed back into the dialogue state machine.

use crate::domain::MentorProposal;

/// Never more than this many chips are offered.
pub const MAX_CHIPS: usize = 3;

/// Substituted when the gateway offers fewer than [`MAX_CHIPS`] and no proposal is pending.
pub const DEFAULT_CHIPS: [&str; MAX_CHIPS] =
    ["Tell me more", "Give me an example", "What should I learn next?"];

/// Phrases that mark a chip as declining the pending proposal.
pub const REJECT_PHRASES: [&str; 3] = ["no thanks", "not now", "maybe later"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipKind {
    /// Accepts the pending proposal.
    Confirm,
    /// Declines the pending proposal.
    Reject,
    /// A plain free-text reply.
    Neutral,
}

impl ChipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChipKind::Confirm => "confirm",
            ChipKind::Reject => "reject",
            ChipKind::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chip {
    pub text: String,
    pub kind: ChipKind,
}

/// Classifies a single chip. First match wins; comparisons ignore case.
pub fn classify_chip(text: &str, pending: Option<&MentorProposal>) -> ChipKind {
    let normalized = text.trim().to_lowercase();

    if let Some(proposal) = pending {
        if normalized == proposal.confirm_chip.trim().to_lowercase() {
            return ChipKind::Confirm;
        }
    }
    if REJECT_PHRASES.iter().any(|phrase| normalized.contains(phrase)) {
        return ChipKind::Reject;
    }
    ChipKind::Neutral
}

/// Picks the chips to display for a turn and classifies each of them.
///
/// Empty strings are discarded and the list is capped at [`MAX_CHIPS`]. With
/// no proposal pending, any shortfall falls back to [`DEFAULT_CHIPS`]. With
/// one pending, its confirm chip is always offered first if missing.
pub fn prepare_chips(chips: &[String], pending: Option<&MentorProposal>) -> Vec<Chip> {
    let mut offered: Vec<&str> = chips
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();

    if let Some(proposal) = pending {
        if !offered.iter().any(|c| classify_chip(c, pending) == ChipKind::Confirm) {
            offered.insert(0, proposal.confirm_chip.trim());
        }
    }

    let texts: Vec<&str> = if pending.is_none() && offered.len() < MAX_CHIPS {
        DEFAULT_CHIPS.to_vec()
    } else {
        offered.into_iter().take(MAX_CHIPS).collect()
    };

    texts
        .into_iter()
        .map(|text| Chip {
            text: text.to_string(),
            kind: classify_chip(text, pending),
        })
        .collect()
}
