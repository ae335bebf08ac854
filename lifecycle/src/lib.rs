//! # Lifecycle
//!
//! Results and cancellation for computations that wait on the UI host.
//!
//! ## Core Concepts
//!
//! - [`Outcome`]: what a platform request produced (ok, cancelled, error)
//! - [`Failure`]: serialisable cause carried by `Outcome::Error`
//! - [`CancellationSource`] / [`CancellationToken`]: hierarchical cancellation
//!   with a [`CancellationReason`]
//!
//! Cancellation is a result, not an error: a request that stops waiting
//! resolves with [`Outcome::Cancelled`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod cancel;
pub mod outcome;

pub use cancel::{CancellationReason, CancellationSource, CancellationToken, Cancelled};
pub use outcome::{Failure, FailureKind, Outcome};
