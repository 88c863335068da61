//! Tri-state conversation signal.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalState {
    Calm,
    Caution,
    Aggressive,
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Calm => "CALM",
            Self::Caution => "CAUTION",
            Self::Aggressive => "AGGRESSIVE",
        };
        f.write_str(s)
    }
}

/// Map a combined score to its signal band.
///
/// Memoryless: each utterance is classified on its own, a pure function of
/// the combined score.
#[must_use]
pub fn classify(combined: f32) -> SignalState {
    if combined < 0.20 {
        SignalState::Calm
    } else if combined < 0.55 {
        SignalState::Caution
    } else {
        SignalState::Aggressive
    }
}
