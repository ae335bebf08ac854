//! Hierarchical cancellation
//!
//! A [`CancellationSource`] may be created as the child of another. Tokens
//! report the reason of the nearest cancelled source on their chain, so
//! cancelling a scope reaches every job launched under it while a child
//! can be cancelled on its own.

use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;
use core::fmt;
use serde::{Deserialize, Serialize};

use crate::Outcome;

/// Why a pending computation stopped waiting for its result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancellationReason {
    /// The user backed out of the request
    UserCancel,
    /// The owning UI entity was permanently destroyed
    HostDestroyed,
    /// A newer request took over the slot of a pending one
    Superseded,
    /// A dialog was dismissed or cancelled before producing a result
    Dismissed,
    Custom(String),
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancellationReason::UserCancel => f.write_str("user cancelled"),
            CancellationReason::HostDestroyed => f.write_str("host destroyed"),
            CancellationReason::Superseded => f.write_str("superseded"),
            CancellationReason::Dismissed => f.write_str("dialog dismissed"),
            CancellationReason::Custom(msg) => f.write_str(msg),
        }
    }
}

#[derive(Debug)]
struct Node {
    reason: RefCell<Option<CancellationReason>>,
    parent: Option<Rc<Node>>,
}

impl Node {
    fn root() -> Rc<Self> {
        Rc::new(Self {
            reason: RefCell::new(None),
            parent: None,
        })
    }

    fn effective_reason(&self) -> Option<CancellationReason> {
        if let Some(reason) = self.reason.borrow().as_ref() {
            return Some(reason.clone());
        }
        self.parent.as_ref().and_then(|p| p.effective_reason())
    }
}

/// Controller that cancels its tokens and those of its children
///
/// The first reason sticks: later calls to [`cancel`](Self::cancel) are
/// ignored. Clones control the same node.
///
/// ```
/// use lifecycle::{CancellationReason, CancellationSource};
///
/// let scope = CancellationSource::new();
/// let job = scope.child();
/// let token = job.token();
///
/// scope.cancel(CancellationReason::HostDestroyed);
/// assert_eq!(token.reason(), Some(CancellationReason::HostDestroyed));
/// assert!(job.cancel(CancellationReason::UserCancel));
/// assert_eq!(token.reason(), Some(CancellationReason::UserCancel));
/// ```
#[derive(Debug, Clone)]
pub struct CancellationSource {
    node: Rc<Node>,
}

impl CancellationSource {
    pub fn new() -> Self {
        Self { node: Node::root() }
    }

    /// A source that is also cancelled whenever `self` is
    pub fn child(&self) -> Self {
        Self {
            node: Rc::new(Node {
                reason: RefCell::new(None),
                parent: Some(self.node.clone()),
            }),
        }
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            node: self.node.clone(),
        }
    }

    /// Cancels this node; returns `false` if it was already cancelled
    pub fn cancel(&self, reason: CancellationReason) -> bool {
        let mut slot = self.node.reason.borrow_mut();
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason);
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.node.effective_reason().is_some()
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a source and its ancestors
#[derive(Debug, Clone)]
pub struct CancellationToken {
    node: Rc<Node>,
}

impl CancellationToken {
    /// A token nothing can cancel
    pub fn never() -> Self {
        Self { node: Node::root() }
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Reason of the nearest cancelled source on this token's chain
    pub fn reason(&self) -> Option<CancellationReason> {
        self.node.effective_reason()
    }

    /// `Err` once cancelled, for early returns with `?`
    pub fn check(&self) -> Result<(), Cancelled> {
        match self.reason() {
            Some(reason) => Err(Cancelled { reason }),
            None => Ok(()),
        }
    }
}

/// Error form of an observed cancellation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancelled {
    pub reason: CancellationReason,
}

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cancelled: {}", self.reason)
    }
}

impl core::error::Error for Cancelled {}

impl<T> From<Cancelled> for Outcome<T> {
    fn from(_: Cancelled) -> Self {
        Outcome::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_token() {
        let token = CancellationToken::never();
        assert!(!token.is_cancelled());
        assert_eq!(token.check(), Ok(()));
    }

    #[test]
    fn test_first_reason_sticks() {
        let source = CancellationSource::new();
        let token = source.token();

        assert!(source.cancel(CancellationReason::Dismissed));
        assert!(!source.cancel(CancellationReason::HostDestroyed));
        assert_eq!(token.reason(), Some(CancellationReason::Dismissed));
    }

    #[test]
    fn test_parent_reaches_grandchild() {
        let root = CancellationSource::new();
        let child = root.child();
        let grandchild = child.child();
        let token = grandchild.token();

        root.cancel(CancellationReason::HostDestroyed);
        assert!(child.is_cancelled());
        assert_eq!(token.reason(), Some(CancellationReason::HostDestroyed));
    }

    #[test]
    fn test_child_does_not_reach_parent() {
        let root = CancellationSource::new();
        let child = root.child();

        child.cancel(CancellationReason::UserCancel);
        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[test]
    fn test_own_reason_wins_over_parent() {
        let root = CancellationSource::new();
        let child = root.child();

        child.cancel(CancellationReason::Superseded);
        root.cancel(CancellationReason::HostDestroyed);
        assert_eq!(child.token().reason(), Some(CancellationReason::Superseded));
    }

    #[test]
    fn test_check_converts_to_outcome() {
        let source = CancellationSource::new();
        source.cancel(CancellationReason::Custom("timeout".into()));

        let err = source.token().check().unwrap_err();
        assert_eq!(err.to_string(), "cancelled: timeout");
        let outcome: Outcome<u8> = err.into();
        assert!(outcome.is_cancelled());
    }
}
