//! Error types for lifetime transitions.
//!
//! A soul commits to a terminal phase exactly once. Re-requesting the
//! committed phase is a silent no-op; requesting the *opposite* phase is a
//! programming error surfaced as [`TransitionError`] — it means the same
//! source was asked to both die and become immortal.

use thiserror::Error;

use crate::phase::Phase;

/// Error returned when a permanent transition conflicts with one already
/// committed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// The soul is already dead; it cannot become immortal.
    #[error("lifetime is already dead and cannot be immortalized")]
    AlreadyDead,

    /// The soul is already immortal; it cannot die.
    #[error("lifetime is already immortal and cannot be ended")]
    AlreadyImmortal,
}

impl TransitionError {
    /// The terminal phase the soul had already committed to.
    #[must_use]
    pub const fn committed_phase(self) -> Phase {
        match self {
            Self::AlreadyDead => Phase::Dead,
            Self::AlreadyImmortal => Phase::Immortal,
        }
    }
}
