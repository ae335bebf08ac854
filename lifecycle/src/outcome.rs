//! Tri-state results for UI requests

use alloc::string::String;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Where a failure originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The host platform reported the failure
    Platform,
    /// Persisting or restoring a continuation failed
    Codec,
    /// Application code raised the failure
    Application,
}

/// Cause carried by [`Outcome::Error`]
///
/// Failures travel inside continuations and across process death, so they
/// are plain data rather than boxed error trait objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a platform-originated failure
    pub fn platform(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Platform, message)
    }

    /// Shorthand for an application-originated failure
    pub fn application(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Application, message)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match self.kind {
            FailureKind::Platform => "platform",
            FailureKind::Codec => "codec",
            FailureKind::Application => "application",
        };
        write!(f, "{} failure: {}", origin, self.message)
    }
}

impl core::error::Error for Failure {}

/// Result of a UI request: a value, a cancellation, or a failure
///
/// Exactly one variant is active. Cancellation is a regular result, not an
/// error: a user backing out of a sub-activity produces `Cancelled`.
///
/// ## Example
///
/// ```
/// use lifecycle::Outcome;
///
/// let ok: Outcome<u32> = Outcome::Ok(2);
/// assert_eq!(ok.map(|v| v * 2), Outcome::Ok(4));
///
/// let cancelled: Outcome<u32> = Outcome::cancelled();
/// assert_eq!(cancelled.flat_map(|v| v + 1), Ok(None));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome<T> {
    Ok(T),
    Cancelled,
    Error(Failure),
}

impl<T> Outcome<T> {
    pub fn cancelled() -> Self {
        Outcome::Cancelled
    }

    pub fn error(failure: Failure) -> Self {
        Outcome::Error(failure)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    /// Applies `f` to an `Ok` value; other variants pass through re-typed
    pub fn map<R, F>(self, f: F) -> Outcome<R>
    where
        F: FnOnce(T) -> R,
    {
        match self {
            Outcome::Ok(data) => Outcome::Ok(f(data)),
            Outcome::Cancelled => Outcome::Cancelled,
            Outcome::Error(failure) => Outcome::Error(failure),
        }
    }

    /// Yields `f(data)` for `Ok`, absence for `Cancelled`, and re-raises the
    /// cause of an `Error`
    pub fn flat_map<R, F>(self, f: F) -> Result<Option<R>, Failure>
    where
        F: FnOnce(T) -> R,
    {
        match self {
            Outcome::Ok(data) => Ok(Some(f(data))),
            Outcome::Cancelled => Ok(None),
            Outcome::Error(failure) => Err(failure),
        }
    }

    /// `flat_map` with the identity function
    pub fn flatten(self) -> Result<Option<T>, Failure> {
        self.flat_map(|data| data)
    }

    /// Total fold picking one of three precomputed values
    pub fn select<U>(&self, ok: U, cancelled: U, error: U) -> U {
        match self {
            Outcome::Ok(_) => ok,
            Outcome::Cancelled => cancelled,
            Outcome::Error(_) => error,
        }
    }

    /// Total fold over the three variants
    pub fn fold<U>(
        self,
        ok: impl FnOnce(T) -> U,
        cancelled: impl FnOnce() -> U,
        error: impl FnOnce(Failure) -> U,
    ) -> U {
        match self {
            Outcome::Ok(data) => ok(data),
            Outcome::Cancelled => cancelled(),
            Outcome::Error(failure) => error(failure),
        }
    }

    pub fn on_ok<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        match self {
            Outcome::Ok(data) => Some(f(data)),
            _ => None,
        }
    }

    pub fn on_cancelled<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        match self {
            Outcome::Cancelled => Some(f()),
            _ => None,
        }
    }

    pub fn on_error<R>(&self, f: impl FnOnce(&Failure) -> R) -> Option<R> {
        match self {
            Outcome::Error(failure) => Some(f(failure)),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Outcome<&T> {
        match self {
            Outcome::Ok(data) => Outcome::Ok(data),
            Outcome::Cancelled => Outcome::Cancelled,
            Outcome::Error(failure) => Outcome::Error(failure.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boom() -> Failure {
        Failure::platform("boom")
    }

    #[test]
    fn test_flat_map_ok_applies_function() {
        let f = |v: u32| v * 10;
        for v in [0u32, 1, 7, 4096] {
            assert_eq!(Outcome::Ok(v).flat_map(f), Ok(Some(f(v))));
        }
    }

    #[test]
    fn test_flat_map_cancelled_is_absent() {
        let outcome: Outcome<u32> = Outcome::Cancelled;
        assert_eq!(outcome.flat_map(|v| v + 1), Ok(None));
    }

    #[test]
    fn test_flat_map_error_reraises() {
        let outcome: Outcome<u32> = Outcome::Error(boom());
        assert_eq!(outcome.flat_map(|v| v + 1), Err(boom()));
    }

    #[test]
    fn test_map_only_touches_ok() {
        assert_eq!(Outcome::Ok(3).map(|v| v.to_string()), Outcome::Ok("3".to_string()));

        let cancelled: Outcome<u32> = Outcome::Cancelled;
        assert_eq!(cancelled.map(|v| v.to_string()), Outcome::Cancelled);

        let error: Outcome<u32> = Outcome::Error(boom());
        assert_eq!(error.map(|v| v.to_string()), Outcome::Error(boom()));
    }

    #[test]
    fn test_select_is_total() {
        assert_eq!(Outcome::Ok(1).select("ok", "cancelled", "error"), "ok");
        assert_eq!(
            Outcome::<u8>::Cancelled.select("ok", "cancelled", "error"),
            "cancelled"
        );
        assert_eq!(
            Outcome::<u8>::Error(boom()).select("ok", "cancelled", "error"),
            "error"
        );
    }

    #[test]
    fn test_fold() {
        let described = Outcome::<u8>::Error(boom()).fold(
            |v| v.to_string(),
            || "cancelled".to_string(),
            |e| e.message,
        );
        assert_eq!(described, "boom");
    }

    #[test]
    fn test_visitors() {
        let ok = Outcome::Ok(5u8);
        assert_eq!(ok.on_ok(|v| *v + 1), Some(6));
        assert_eq!(ok.on_cancelled(|| ()), None);
        assert_eq!(ok.on_error(|_| ()), None);

        let error: Outcome<u8> = Outcome::error(boom());
        assert_eq!(error.on_error(|e| e.kind), Some(FailureKind::Platform));
    }

    #[test]
    fn test_structural_equality() {
        assert_eq!(Outcome::Ok(1), Outcome::Ok(1));
        assert_ne!(Outcome::Ok(1), Outcome::Ok(2));
        assert_ne!(Outcome::Ok(1), Outcome::Cancelled);
        assert_ne!(
            Outcome::<u8>::Error(Failure::platform("a")),
            Outcome::<u8>::Error(Failure::application("a"))
        );
    }

    #[test]
    fn test_serde_roundtrip_preserves_variant() {
        let outcome: Outcome<String> = Outcome::Error(boom());
        let json = serde_json::to_string(&outcome).unwrap();
        let back: Outcome<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(boom().to_string(), "platform failure: boom");
    }
}
