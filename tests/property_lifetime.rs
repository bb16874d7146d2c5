//! Property-based tests for the lifetime state machine.
//!
//! Covers, over randomized inputs:
//!
//! # Permanent Transitions
//! - First transition always commits; repeats of the same phase are no-ops
//! - The opposite phase is always rejected, regardless of call order
//!
//! # Filter/Outcome Matrix
//! - A filtered registration fires iff the resolved phase matches, once
//! - A registration scoped to a lifetime that died first never fires
//!
//! # Congruence
//! - Reflexive and symmetric over every reachable phase configuration
//! - Distinct mortal souls are never congruent

mod common;

use common::{init_test_logging, FireCount};
use lifespan::{Lifetime, LifetimeSource, Phase, TransitionError};
use proptest::prelude::*;

// ============================================================================
// Generators
// ============================================================================

/// The two terminal phases a source can commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Resolution {
    End,
    Immortalize,
}

impl Resolution {
    fn apply(self, source: &LifetimeSource) -> Result<(), TransitionError> {
        match self {
            Self::End => source.end_lifetime(),
            Self::Immortalize => source.immortalize_lifetime(),
        }
    }

    const fn phase(self) -> Phase {
        match self {
            Self::End => Phase::Dead,
            Self::Immortalize => Phase::Immortal,
        }
    }
}

fn arb_resolution() -> impl Strategy<Value = Resolution> {
    prop_oneof![Just(Resolution::End), Just(Resolution::Immortalize)]
}

/// The three registration filters of the public API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Filter {
    Dead,
    Immortal,
    Any,
}

impl Filter {
    fn register(self, lifetime: &Lifetime, fired: &FireCount, registration: Option<&Lifetime>) {
        match (self, registration) {
            (Self::Dead, None) => lifetime.when_dead(fired.action()),
            (Self::Dead, Some(reg)) => lifetime.when_dead_during(fired.action(), reg),
            (Self::Immortal, None) => lifetime.when_immortal(fired.action()),
            (Self::Immortal, Some(reg)) => lifetime.when_immortal_during(fired.action(), reg),
            (Self::Any, None) => lifetime.when_dead_or_immortal(fired.action()),
            (Self::Any, Some(reg)) => lifetime.when_dead_or_immortal_during(fired.action(), reg),
        }
    }

    const fn matches(self, phase: Phase) -> bool {
        match self {
            Self::Dead => matches!(phase, Phase::Dead),
            Self::Immortal => matches!(phase, Phase::Immortal),
            Self::Any => matches!(phase, Phase::Dead | Phase::Immortal),
        }
    }
}

fn arb_filter() -> impl Strategy<Value = Filter> {
    prop_oneof![Just(Filter::Dead), Just(Filter::Immortal), Just(Filter::Any)]
}

/// A reachable configuration for one independently-owned lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Config {
    Mortal,
    Dead,
    Immortal,
    Limbo,
}

impl Config {
    /// Builds a lifetime in this configuration, returning the source that
    /// keeps a mortal one alive.
    fn build(self) -> (Lifetime, Option<LifetimeSource>) {
        match self {
            Self::Mortal => {
                let source = LifetimeSource::new();
                (source.lifetime(), Some(source))
            }
            Self::Dead => {
                let source = LifetimeSource::new();
                source.end_lifetime().unwrap();
                (source.lifetime(), Some(source))
            }
            Self::Immortal => {
                let source = LifetimeSource::new();
                source.immortalize_lifetime().unwrap();
                (source.lifetime(), Some(source))
            }
            Self::Limbo => {
                let source = LifetimeSource::new();
                (source.lifetime().downgrade(), None)
            }
        }
    }

    const fn phase(self) -> Phase {
        match self {
            Self::Mortal => Phase::Mortal,
            Self::Dead => Phase::Dead,
            Self::Immortal => Phase::Immortal,
            Self::Limbo => Phase::Limbo,
        }
    }
}

fn arb_config() -> impl Strategy<Value = Config> {
    prop_oneof![
        Just(Config::Mortal),
        Just(Config::Dead),
        Just(Config::Immortal),
        Just(Config::Limbo),
    ]
}

// ============================================================================
// Permanent transition laws
// ============================================================================

proptest! {
    #[test]
    fn first_transition_commits_and_later_ones_follow_the_law(
        first in arb_resolution(),
        rest in proptest::collection::vec(arb_resolution(), 0..8),
    ) {
        init_test_logging();

        let source = LifetimeSource::new();
        first.apply(&source).unwrap();
        prop_assert_eq!(source.lifetime().phase(), first.phase());

        for later in rest {
            let result = later.apply(&source);
            if later == first {
                prop_assert_eq!(result, Ok(()));
            } else {
                prop_assert_eq!(result.unwrap_err().committed_phase(), first.phase());
            }
            // The committed phase never moves.
            prop_assert_eq!(source.lifetime().phase(), first.phase());
        }
    }

    #[test]
    fn callbacks_fire_iff_filter_matches(
        filter in arb_filter(),
        resolution in arb_resolution(),
        register_before in any::<bool>(),
    ) {
        init_test_logging();

        let source = LifetimeSource::new();
        let fired = FireCount::new();

        if register_before {
            filter.register(&source.lifetime(), &fired, None);
            resolution.apply(&source).unwrap();
        } else {
            resolution.apply(&source).unwrap();
            filter.register(&source.lifetime(), &fired, None);
        }

        let expected = usize::from(filter.matches(resolution.phase()));
        prop_assert_eq!(fired.get(), expected);
        prop_assert_eq!(source.lifetime().pending_registrations(), 0);
    }

    #[test]
    fn scoped_callbacks_respect_registration_order(
        filter in arb_filter(),
        target_resolution in arb_resolution(),
        reg_resolution in arb_resolution(),
        reg_resolves_first in any::<bool>(),
    ) {
        init_test_logging();

        let target = LifetimeSource::new();
        let registration = LifetimeSource::new();
        let fired = FireCount::new();
        filter.register(&target.lifetime(), &fired, Some(&registration.lifetime()));

        if reg_resolves_first {
            reg_resolution.apply(&registration).unwrap();
            target_resolution.apply(&target).unwrap();
        } else {
            target_resolution.apply(&target).unwrap();
            reg_resolution.apply(&registration).unwrap();
        }

        // Cancelled iff the registration lifetime died strictly before the
        // target resolved; otherwise the filter decides.
        let cancelled = reg_resolves_first && reg_resolution == Resolution::End;
        let expected = if cancelled {
            0
        } else {
            usize::from(filter.matches(target_resolution.phase()))
        };
        prop_assert_eq!(fired.get(), expected);

        // Both registries end empty either way.
        prop_assert_eq!(target.lifetime().pending_registrations(), 0);
        prop_assert_eq!(registration.lifetime().pending_registrations(), 0);
    }
}

// ============================================================================
// Congruence laws
// ============================================================================

proptest! {
    #[test]
    fn congruence_is_reflexive(config in arb_config()) {
        init_test_logging();

        let (lifetime, _keep) = config.build();
        prop_assert_eq!(lifetime.phase(), config.phase());
        prop_assert!(lifetime.is_congruent_to(&lifetime));
        prop_assert!(lifetime.is_congruent_to(&lifetime.clone()));
    }

    #[test]
    fn congruence_is_symmetric_and_phase_determined(
        left in arb_config(),
        right in arb_config(),
    ) {
        init_test_logging();

        let (a, _keep_a) = left.build();
        let (b, _keep_b) = right.build();

        prop_assert_eq!(a.is_congruent_to(&b), b.is_congruent_to(&a));

        // Distinct souls: congruent iff both sit in the same non-mortal
        // phase. (Identity congruence needs the same soul, and these are
        // independently built.)
        let expected = left.phase() != Phase::Mortal && left.phase() == right.phase();
        prop_assert_eq!(a.is_congruent_to(&b), expected);
    }

    #[test]
    fn equality_requires_the_same_soul(left in arb_config(), right in arb_config()) {
        init_test_logging();

        let (a, _keep_a) = left.build();
        let (b, _keep_b) = right.build();
        prop_assert_eq!(&a, &a.clone());
        prop_assert_ne!(a, b);
    }
}
