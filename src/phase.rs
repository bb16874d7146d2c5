//! The closed set of states a soul can be observed in.
//!
//! A soul starts [`Mortal`](Phase::Mortal) and permanently transitions,
//! exactly once, to either [`Dead`](Phase::Dead) or
//! [`Immortal`](Phase::Immortal). [`Limbo`](Phase::Limbo) is a
//! pseudo-terminal phase: it is reported by a non-owning handle whose soul
//! was dropped while still mortal, and can never change again.

use core::fmt;

/// The observable state of a soul.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Not yet resolved. May still become dead or immortal.
    Mortal,
    /// Resolved: cancelled. Permanent.
    Dead,
    /// Resolved: will never be cancelled. Permanent.
    Immortal,
    /// The soul was dropped while still mortal and can no longer be
    /// observed. Permanent, but matches neither terminal phase.
    Limbo,
}

impl Phase {
    /// Returns true for the two terminal phases a soul can commit to.
    ///
    /// `Limbo` is *not* resolved: the soul never committed, it vanished.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Dead | Self::Immortal)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mortal => write!(f, "Alive"),
            Self::Dead => write!(f, "Dead"),
            Self::Immortal => write!(f, "Immortal"),
            Self::Limbo => write!(f, "Alive (Limbo)"),
        }
    }
}

// ============================================================================
// Atomic mirror encoding
// ============================================================================

pub(crate) const fn phase_to_u8(phase: Phase) -> u8 {
    match phase {
        Phase::Mortal => 0,
        Phase::Dead => 1,
        Phase::Immortal => 2,
        Phase::Limbo => 3,
    }
}

pub(crate) const fn phase_from_u8(b: u8) -> Phase {
    match b {
        1 => Phase::Dead,
        2 => Phase::Immortal,
        3 => Phase::Limbo,
        _ => Phase::Mortal,
    }
}
