//! The public, copyable view over a soul.
//!
//! A [`Lifetime`] is an immutable value wrapping an optional soul
//! reference. The default lifetime (no soul supplied) is the immortal
//! singleton. Holding an owning lifetime keeps the soul's state alive but
//! never prevents its source from resolving it; a
//! [downgraded](Lifetime::downgrade) lifetime holds the soul weakly and
//! reports [`Phase::Limbo`] once the soul is gone.

use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use crate::phase::Phase;
use crate::soul::{dependent_register, Soul};

/// Which resolved phases invoke a registered action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PhaseFilter {
    Dead,
    Immortal,
    DeadOrImmortal,
}

impl PhaseFilter {
    const fn matches(self, phase: Phase) -> bool {
        match self {
            Self::Dead => matches!(phase, Phase::Dead),
            Self::Immortal => matches!(phase, Phase::Immortal),
            Self::DeadOrImmortal => phase.is_resolved(),
        }
    }
}

/// Strong or weak reference to a soul.
#[derive(Clone)]
enum SoulRef {
    Strong(Arc<Soul>),
    Weak(Weak<Soul>),
}

/// A handle that permanently transitions from mortal to either dead or
/// immortal, running callbacks when it does.
///
/// Lifetimes are cheap to clone and compare equal iff they reference the
/// same soul, regardless of phase. The default lifetime is immortal.
#[derive(Clone, Default)]
pub struct Lifetime {
    /// `None` resolves to the immortal singleton (explicit optional
    /// reference, not an implicit null).
    soul: Option<SoulRef>,
}

impl Lifetime {
    pub(crate) fn from_soul(soul: Arc<Soul>) -> Self {
        Self {
            soul: Some(SoulRef::Strong(soul)),
        }
    }

    /// A lifetime that has already permanently transitioned to immortal.
    /// Identical to the default lifetime.
    #[must_use]
    pub fn immortal() -> Self {
        Self::default()
    }

    /// A lifetime that has already permanently transitioned to dead.
    /// NOT the default lifetime.
    #[must_use]
    pub fn dead() -> Self {
        Self::from_soul(Arc::clone(Soul::dead()))
    }

    /// The soul, if it still exists. `None` means the weakly-referenced
    /// soul is gone: limbo.
    fn upgrade(&self) -> Option<Arc<Soul>> {
        match &self.soul {
            None => Some(Arc::clone(Soul::immortal())),
            Some(SoulRef::Strong(soul)) => Some(Arc::clone(soul)),
            Some(SoulRef::Weak(soul)) => soul.upgrade(),
        }
    }

    /// Identity of the underlying soul, stable even after a weakly-held
    /// soul is dropped.
    fn soul_ptr(&self) -> *const Soul {
        match &self.soul {
            None => Arc::as_ptr(Soul::immortal()),
            Some(SoulRef::Strong(soul)) => Arc::as_ptr(soul),
            Some(SoulRef::Weak(soul)) => soul.as_ptr(),
        }
    }

    /// The phase this lifetime currently observes.
    ///
    /// A downgraded lifetime whose soul no longer exists reports
    /// [`Phase::Limbo`], which never changes again.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.upgrade().map_or(Phase::Limbo, |soul| soul.phase())
    }

    /// True iff this lifetime has permanently transitioned to immortal.
    #[must_use]
    pub fn is_immortal(&self) -> bool {
        self.phase() == Phase::Immortal
    }

    /// True iff this lifetime has permanently transitioned to dead.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.phase() == Phase::Dead
    }

    /// True while this lifetime has not resolved and is not in limbo.
    #[must_use]
    pub fn is_mortal(&self) -> bool {
        self.phase() == Phase::Mortal
    }

    /// A non-owning view of this lifetime.
    ///
    /// The downgraded value observes the same soul but does not keep it
    /// alive; once the soul is dropped it reports [`Phase::Limbo`].
    /// Downgrading an already-resolved lifetime collapses to the shared
    /// permanent lifetime of that phase, which can never enter limbo.
    #[must_use]
    pub fn downgrade(&self) -> Self {
        match &self.soul {
            None => Self::default(),
            Some(SoulRef::Weak(_)) => self.clone(),
            Some(SoulRef::Strong(soul)) => match soul.phase() {
                Phase::Immortal => Self::immortal(),
                Phase::Dead => Self::dead(),
                Phase::Mortal => Self {
                    soul: Some(SoulRef::Weak(Arc::downgrade(soul))),
                },
                Phase::Limbo => unreachable!("a live soul is never in limbo"),
            },
        }
    }

    /// Registers an action to run when this lifetime is either dead or
    /// immortal. Runs immediately if it already is.
    pub fn when_dead_or_immortal(&self, action: impl FnOnce() + Send + 'static) {
        self.register(PhaseFilter::DeadOrImmortal, action, None);
    }

    /// Registers an action to run when this lifetime is either dead or
    /// immortal, unless `registration` dies first.
    pub fn when_dead_or_immortal_during(
        &self,
        action: impl FnOnce() + Send + 'static,
        registration: &Self,
    ) {
        self.register(PhaseFilter::DeadOrImmortal, action, Some(registration));
    }

    /// Registers an action to run when this lifetime is dead.
    pub fn when_dead(&self, action: impl FnOnce() + Send + 'static) {
        self.register(PhaseFilter::Dead, action, None);
    }

    /// Registers an action to run when this lifetime is dead, unless
    /// `registration` dies first.
    pub fn when_dead_during(&self, action: impl FnOnce() + Send + 'static, registration: &Self) {
        self.register(PhaseFilter::Dead, action, Some(registration));
    }

    /// Registers an action to run when this lifetime is immortal.
    pub fn when_immortal(&self, action: impl FnOnce() + Send + 'static) {
        self.register(PhaseFilter::Immortal, action, None);
    }

    /// Registers an action to run when this lifetime is immortal, unless
    /// `registration` dies first.
    pub fn when_immortal_during(
        &self,
        action: impl FnOnce() + Send + 'static,
        registration: &Self,
    ) {
        self.register(PhaseFilter::Immortal, action, Some(registration));
    }

    fn register(
        &self,
        filter: PhaseFilter,
        action: impl FnOnce() + Send + 'static,
        registration: Option<&Self>,
    ) {
        // A lifetime in limbo is frozen in a phase no filter matches: the
        // action can never become eligible to run.
        let Some(target) = self.upgrade() else { return };

        // The filter is applied at fire time, against the phase the soul
        // just committed; the soul itself only knows "resolved".
        let observed = Arc::downgrade(&target);
        let filtered: Box<dyn FnOnce() + Send> = Box::new(move || {
            if let Some(soul) = observed.upgrade() {
                if filter.matches(soul.phase()) {
                    action();
                }
            }
        });

        let reg_soul = registration.and_then(Self::upgrade);
        dependent_register(&target, filtered, reg_soul.as_ref());
    }

    /// Determines whether two lifetimes are guaranteed to occupy the same
    /// phase from now on.
    ///
    /// Lifetimes with the same soul are always congruent. Otherwise, two
    /// lifetimes that are both in the same non-mortal phase can never
    /// diverge again, even though their souls differ — dead with dead,
    /// immortal with immortal, limbo with limbo.
    #[must_use]
    pub fn is_congruent_to(&self, other: &Self) -> bool {
        if self == other {
            return true;
        }
        let phase = self.phase();
        phase != Phase::Mortal && phase == other.phase()
    }

    /// Number of pending registrations on this lifetime's soul.
    #[doc(hidden)]
    #[must_use]
    pub fn pending_registrations(&self) -> usize {
        self.upgrade().map_or(0, |soul| soul.pending())
    }
}

impl PartialEq for Lifetime {
    /// Lifetimes are equal iff they reference the same soul. Two distinct
    /// souls in the same phase are congruent, not equal.
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.soul_ptr(), other.soul_ptr())
    }
}

impl Eq for Lifetime {}

impl Hash for Lifetime {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.soul_ptr() as usize).hash(state);
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.phase())
    }
}

impl fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifetime")
            .field("phase", &self.phase())
            .finish()
    }
}
