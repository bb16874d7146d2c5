//! Lifespan: resolve-once lifetimes with cancellable dependent callbacks.
//!
//! # Overview
//!
//! A [`Lifetime`] starts mortal and permanently resolves, exactly once, to
//! one of two terminal phases: dead (cancelled) or immortal (will never be
//! cancelled). Holders register callbacks that fire when the lifetime
//! resolves, and may scope a registration to another lifetime whose death
//! cancels it early. A [`LifetimeSource`] owns the underlying state and is
//! the only party that can force a resolution.
//!
//! # Core Guarantees
//!
//! - **At-most-once callbacks**: every registration fires at most once, and
//!   an early-cancelled registration never fires
//! - **Permanent transitions**: once resolved, a lifetime never changes;
//!   re-requesting the committed phase is a no-op and requesting the
//!   opposite one is a typed error
//! - **No leaked registrations**: every pending entry leaves the registry
//!   exactly once, by firing or by cancellation, and cross-links hold weak
//!   references so a registry never extends a soul's life
//! - **Abandonment is not cancellation**: a source dropped unresolved
//!   immortalizes its lifetime, on unwind too
//! - **Congruence**: two lifetimes in the same non-mortal phase are
//!   provably in the same phase for all future time
//!
//! # Example
//!
//! ```
//! use lifespan::LifetimeSource;
//!
//! let source = LifetimeSource::new();
//! let lifetime = source.lifetime();
//!
//! lifetime.when_dead(|| println!("cancelled"));
//! lifetime.when_immortal(|| println!("never cancelled"));
//!
//! source.immortalize_lifetime()?;
//! assert!(lifetime.is_immortal());
//! # Ok::<(), lifespan::TransitionError>(())
//! ```
//!
//! # Module Structure
//!
//! - [`phase`]: the closed set of observable states
//! - [`error`]: typed transition errors
//! - [`lifetime`]: the copyable [`Lifetime`] facade
//! - [`source`]: the owning [`LifetimeSource`] controller
//! - `soul` (private): the state machine and callback registry

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod lifetime;
pub mod phase;
mod soul;
pub mod source;

pub use error::TransitionError;
pub use lifetime::Lifetime;
pub use phase::Phase;
pub use source::LifetimeSource;
