//! Refused requests
//!
//! A refusal is a normal outcome, not a fault: the request is dropped, state
//! is left untouched and the reason is logged for the performer.

use crate::control::{Channel, ControlKey};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Refusal {
    #[error("automix needs exactly one playing deck, found {0}")]
    PlayingDeckCount(usize),

    #[error("automix is already running")]
    AlreadyEnabled,

    #[error("{0} is playing or audible, refusing to move it")]
    Dangerous(Channel),

    #[error("no audible playing deck to align {0} against")]
    NoReference(Channel),

    #[error("{count} audible playing decks, cannot pick a reference for {target}")]
    AmbiguousReference { target: Channel, count: usize },

    #[error("{channel} has no {key} cue")]
    MissingCue { channel: Channel, key: ControlKey },
}

impl Refusal {
    /// Log the refusal and hand it back to the caller
    pub(crate) fn report(self) -> Self {
        log::warn!("Refused: {}", self);
        self
    }
}
