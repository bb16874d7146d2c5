//! The soul: the shared state machine backing every lifetime.
//!
//! A soul holds the current [`Phase`] and a registry of pending callbacks.
//! It is mutated through exactly two operations: a permanent transition
//! (`Mortal` to `Dead` or `Mortal` to `Immortal`, committed at most once)
//! and dependent registration. Once resolved a soul never changes again.
//!
//! # Locking
//!
//! The phase and the registry live behind one mutex so check-then-mutate is
//! race-free. The phase is mirrored in an atomic for lock-free reads. The
//! mutex is held only for registry mutation; user callbacks always run
//! after it is released. Snapshot-then-fire: a transition drains the
//! registry under the lock and fires the drained entries afterwards, so a
//! registration racing the transition either lands in the registry before
//! the drain or observes a resolved soul and runs immediately — it is never
//! parked in a registry that will never fire again.

mod registry;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use tracing::{debug, trace};

use crate::error::TransitionError;
use crate::phase::{phase_from_u8, phase_to_u8, Phase};

pub(crate) use registry::Entry;
use registry::{RegKey, Registry};

/// Phase plus pending-callback registry, guarded by one lock.
struct SoulState {
    phase: Phase,
    registry: Registry,
}

/// The shared, possibly multiply-referenced state object backing one or
/// more lifetime values.
pub(crate) struct Soul {
    /// Lock-free mirror of the phase inside `state`. Written under the
    /// state lock, before any drained callback runs.
    phase_mirror: AtomicU8,
    state: Mutex<SoulState>,
}

impl Soul {
    /// Creates a fresh, unresolved soul. Only a `LifetimeSource` does this.
    pub(crate) fn new_mortal() -> Arc<Self> {
        Arc::new(Self {
            phase_mirror: AtomicU8::new(phase_to_u8(Phase::Mortal)),
            state: Mutex::new(SoulState {
                phase: Phase::Mortal,
                registry: Registry::new(),
            }),
        })
    }

    fn new_resolved(phase: Phase) -> Arc<Self> {
        debug_assert!(phase.is_resolved());
        Arc::new(Self {
            phase_mirror: AtomicU8::new(phase_to_u8(phase)),
            state: Mutex::new(SoulState {
                phase,
                registry: Registry::new(),
            }),
        })
    }

    /// The process-wide immortal soul. Created once, never mutated; the
    /// default lifetime resolves to it.
    pub(crate) fn immortal() -> &'static Arc<Self> {
        static IMMORTAL: OnceLock<Arc<Soul>> = OnceLock::new();
        IMMORTAL.get_or_init(|| Self::new_resolved(Phase::Immortal))
    }

    /// The process-wide dead soul backing `Lifetime::dead()`.
    pub(crate) fn dead() -> &'static Arc<Self> {
        static DEAD: OnceLock<Arc<Soul>> = OnceLock::new();
        DEAD.get_or_init(|| Self::new_resolved(Phase::Dead))
    }

    /// Current phase. Pure read, safe concurrently with everything else.
    pub(crate) fn phase(&self) -> Phase {
        phase_from_u8(self.phase_mirror.load(Ordering::Acquire))
    }

    /// Number of pending registrations. Test observability only.
    pub(crate) fn pending(&self) -> usize {
        self.state.lock().expect("lock poisoned").registry.len()
    }

    /// Permanently commits `target`, firing every pending callback.
    ///
    /// Committing the already-committed phase is a no-op; committing the
    /// opposite terminal phase is an error. Callbacks run inline on the
    /// calling thread, in unspecified order, after the lock is released.
    pub(crate) fn transition_permanently(&self, target: Phase) -> Result<(), TransitionError> {
        debug_assert!(target.is_resolved(), "transition target must be terminal");

        let drained = {
            let mut state = self.state.lock().expect("lock poisoned");
            match state.phase {
                Phase::Mortal => {
                    state.phase = target;
                    self.phase_mirror
                        .store(phase_to_u8(target), Ordering::Release);
                    state.registry.drain()
                }
                phase if phase == target => return Ok(()),
                Phase::Dead => return Err(TransitionError::AlreadyDead),
                Phase::Immortal => return Err(TransitionError::AlreadyImmortal),
                Phase::Limbo => unreachable!("a live soul is never in limbo"),
            }
        };

        debug!(phase = %target, callbacks = drained.len(), "lifetime resolved");
        for entry in drained {
            entry();
        }
        Ok(())
    }

    /// Stores `entry` to run at resolution, or hands it back if this soul
    /// has already resolved — the caller runs it after the lock is gone.
    fn register(&self, entry: Entry) -> Result<RegKey, Entry> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.phase == Phase::Mortal {
            let key = state.registry.insert(entry);
            trace!(?key, "registration stored");
            Ok(key)
        } else {
            Err(entry)
        }
    }

    /// Removes a pending entry by key. Stale keys miss harmlessly; the
    /// removed entry is dropped by the caller, outside the lock.
    fn remove(&self, key: RegKey) -> Option<Entry> {
        let removed = self.state.lock().expect("lock poisoned").registry.remove(key);
        if removed.is_some() {
            trace!(?key, "registration cancelled");
        }
        removed
    }
}

impl core::fmt::Debug for Soul {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Soul")
            .field("phase", &self.phase())
            .field("pending", &self.pending())
            .finish()
    }
}

// ============================================================================
// Dependent registration
// ============================================================================

/// Cross-link between a pending entry in the target soul and its canceller
/// in the registration soul. Exactly one side claims the link: firing
/// retires the canceller, cancelling retires the pending entry. Both sides
/// hold `Weak` soul references — the registries must never be the reason
/// either soul outlives its natural scope.
#[derive(Default)]
struct CrossLink {
    state: Mutex<LinkState>,
}

#[derive(Default)]
struct LinkState {
    done: bool,
    /// Entry awaiting the target soul's resolution.
    pending: Option<(Weak<Soul>, RegKey)>,
    /// Entry awaiting the registration soul's death.
    canceller: Option<(Weak<Soul>, RegKey)>,
}

impl CrossLink {
    fn set_pending(&self, soul: Weak<Soul>, key: RegKey) {
        self.state.lock().expect("lock poisoned").pending = Some((soul, key));
    }

    /// Stores the canceller side. Returns true if the pending entry already
    /// fired, in which case the canceller has nothing left to do and the
    /// caller retires it immediately.
    fn set_canceller(&self, soul: Weak<Soul>, key: RegKey) -> bool {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.done {
            true
        } else {
            state.canceller = Some((soul, key));
            false
        }
    }

    /// Claims the link from the firing side, yielding the canceller to
    /// retire from the registration soul's registry.
    fn fired(&self) -> Option<(Weak<Soul>, RegKey)> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.done = true;
        state.pending = None;
        state.canceller.take()
    }

    /// Claims the link from the cancelling side, yielding the pending entry
    /// to remove from the target soul's registry. Loses to a concurrent
    /// fire: once `done`, the callback is committed to run.
    fn cancelled(&self) -> Option<(Weak<Soul>, RegKey)> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.done {
            return None;
        }
        state.done = true;
        state.canceller = None;
        state.pending.take()
    }
}

fn remove_linked(entry: Option<(Weak<Soul>, RegKey)>) {
    if let Some((soul, key)) = entry {
        // A dangling weak means the soul is gone and its registry with it.
        if let Some(soul) = soul.upgrade() {
            drop(soul.remove(key));
        }
    }
}

fn plain_register(target: &Arc<Soul>, action: Entry) {
    if let Err(action) = target.register(action) {
        action();
    }
}

/// Registers `action` to run when `target` resolves.
///
/// With a `registration` soul, the entry is cross-linked: if the
/// registration soul dies first the entry is removed and never fires, and
/// if the registration soul is already dead the action is rejected
/// outright. If firing and cancellation race, exactly one side wins.
pub(crate) fn dependent_register(
    target: &Arc<Soul>,
    action: Entry,
    registration: Option<&Arc<Soul>>,
) {
    let Some(reg) = registration else {
        plain_register(target, action);
        return;
    };

    // A registration scoped to its own target adds nothing: by the time the
    // target dies the phase filter has already decided the outcome.
    if Arc::ptr_eq(target, reg) {
        plain_register(target, action);
        return;
    }

    match reg.phase() {
        // Eager rejection: never stored, never fires.
        Phase::Dead => return,
        // An immortal (or vanished) registration soul can never die, so
        // the cross-link would never be exercised.
        Phase::Immortal | Phase::Limbo => {
            plain_register(target, action);
            return;
        }
        Phase::Mortal => {}
    }

    let link = Arc::new(CrossLink::default());

    let fire_link = Arc::clone(&link);
    let wrapped: Entry = Box::new(move || {
        remove_linked(fire_link.fired());
        action();
    });

    let pending_key = match target.register(wrapped) {
        // Target already resolved: run inline, no canceller ever needed.
        Err(wrapped) => {
            wrapped();
            return;
        }
        Ok(key) => key,
    };
    link.set_pending(Arc::downgrade(target), pending_key);

    let reg_weak = Arc::downgrade(reg);
    let cancel_link = Arc::clone(&link);
    let canceller: Entry = Box::new(move || {
        // Fires on any resolution of the registration soul; only death
        // cancels. Immortality leaves the pending entry in place.
        let died = reg_weak
            .upgrade()
            .is_some_and(|soul| soul.phase() == Phase::Dead);
        if died {
            remove_linked(cancel_link.cancelled());
        }
    });

    match reg.register(canceller) {
        // The registration soul resolved while we were linking.
        Err(canceller) => canceller(),
        Ok(key) => {
            if link.set_canceller(Arc::downgrade(reg), key) {
                // The target fired during the linking window; the canceller
                // has nothing to cancel.
                drop(reg.remove(key));
            }
        }
    }
}
