//! The controller that owns a mortal soul and decides its fate.

use core::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::TransitionError;
use crate::lifetime::Lifetime;
use crate::phase::Phase;
use crate::soul::Soul;

/// Controls the fate of an exposed [`Lifetime`].
///
/// The exposed lifetime dies or becomes immortal when
/// [`end_lifetime`](Self::end_lifetime) or
/// [`immortalize_lifetime`](Self::immortalize_lifetime) is called. A source
/// dropped without resolving its lifetime immortalizes it: abandonment
/// defaults to "assume still needed", never to silent cancellation. The
/// drop fallback runs on unwind too, so scoped acquisition resolves even
/// when a panic skips the explicit call.
pub struct LifetimeSource {
    soul: Arc<Soul>,
}

impl LifetimeSource {
    /// Creates a new source managing a new, initially mortal lifetime.
    #[must_use]
    pub fn new() -> Self {
        Self {
            soul: Soul::new_mortal(),
        }
    }

    /// The lifetime exposed and managed by this source.
    ///
    /// The returned handle owns a strong reference to the soul; it can
    /// never observe [`Phase::Limbo`].
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        Lifetime::from_soul(Arc::clone(&self.soul))
    }

    /// Permanently transitions the exposed lifetime from mortal to dead.
    ///
    /// No effect when the lifetime is already dead. Fails when it is
    /// already immortal.
    pub fn end_lifetime(&self) -> Result<(), TransitionError> {
        self.soul.transition_permanently(Phase::Dead)
    }

    /// Permanently transitions the exposed lifetime from mortal to
    /// immortal.
    ///
    /// No effect when the lifetime is already immortal. Fails when it is
    /// already dead.
    pub fn immortalize_lifetime(&self) -> Result<(), TransitionError> {
        self.soul.transition_permanently(Phase::Immortal)
    }
}

impl Default for LifetimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LifetimeSource {
    /// A source abandoned while still mortal immortalizes its lifetime.
    fn drop(&mut self) {
        if self.soul.phase() == Phase::Mortal {
            debug!("source dropped unresolved; immortalizing its lifetime");
            // Cannot fail: no other party can transition this soul.
            let _ = self.soul.transition_permanently(Phase::Immortal);
        }
    }
}

impl fmt::Display for LifetimeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lifetime())
    }
}

impl fmt::Debug for LifetimeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeSource")
            .field("phase", &self.lifetime().phase())
            .finish()
    }
}
