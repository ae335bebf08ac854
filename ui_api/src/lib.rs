//! # UI API
//!
//! This crate defines the interface between the continuation stack and the
//! UI host (activities, fragments, dialogs).
//!
//! ## Philosophy
//!
//! The host provides **mechanisms**, not policies:
//! - Identity lookup of contexts and fragments by handle, tag, or container id
//! - Creation, save, and destruction hooks on fragments
//! - Asynchronous sub-requests answered by request code
//! - A single UI thread plus a worker pool, with explicit marshalling
//!
//! ## Design Goals
//!
//! 1. **Testability**: The entire API can be simulated in-process
//! 2. **Explicitness**: Contexts are handles, never ambient globals
//! 3. **Recreation-aware**: Every entity may be destroyed and rebuilt
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A rendering or layout API
//! - A general coroutine runtime
//! - A specific toolkit (the trait can be implemented many ways)

pub mod error;
pub mod host;
pub mod tasks;
pub mod types;

pub use error::UiError;
pub use host::{Dispatch, FragmentCallbacks, FragmentFactory, UiApi};
pub use tasks::{DestroyObserver, UiTask, WorkerContext, WorkerTask};
pub use types::{
    ActivityResult, ContextInfo, ContextKind, DestroyTarget, FragmentInfo, FragmentSpec, GrantCode,
    GrantResult, Intent, ResultCode, SavedState,
};
