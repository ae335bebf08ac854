//! UI host error types

use core_types::{ContextId, FragmentId};
use thiserror::Error;

/// Errors that can occur when interacting with the UI host
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UiError {
    /// The context handle does not name a live context
    #[error("Unknown context: {0}")]
    UnknownContext(ContextId),

    /// The fragment handle does not name a live fragment
    #[error("Unknown fragment: {0}")]
    UnknownFragment(FragmentId),

    /// A fragment with the same tag is already attached to the context
    #[error("Fragment tag already in use: {0}")]
    DuplicateTag(String),

    /// The host refused to issue a sub-request
    #[error("Request rejected: {0}")]
    RequestRejected(String),

    /// A lifecycle callback reported a failure
    #[error("Callback failed: {0}")]
    CallbackFailed(String),
}
