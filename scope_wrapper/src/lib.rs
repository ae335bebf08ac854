//! # Scope Wrapper
//!
//! Activity and fragment scopes for suspendable UI operations.
//!
//! ## Philosophy
//!
//! - **Bound, not borrowed**: a scope remembers which activity (and fragment)
//!   it works for by handle, and re-resolves it on every use
//! - **Explicit marshalling**: launched jobs run on the worker queue and reach
//!   the UI thread only through an explicit hop
//! - **Results outlive the screen**: every request is registered with a
//!   retained holder, so its continuation survives recreation and process
//!   death
//!
//! ## Example
//!
//! ```ignore
//! let handlers = ScopeHandlers::new(HolderConfig::default(), activity_registry, permission_registry);
//! install(&mut host, &handlers);
//!
//! let scope = ActivityScope::new(&mut host, activity, handlers)?;
//! let code = scope.start_activity_for_result(&mut host, Intent::new("pick"), handler)?;
//! ```

pub mod activity;
pub mod binding;
pub mod dialog;
pub mod fragment;
pub mod job;

pub use activity::ActivityScope;
pub use binding::{ContextBinding, FragmentLocator};
pub use dialog::SuspendableDialog;
pub use fragment::FragmentScope;
pub use job::{Job, JobContext, JobId};

use core_types::{ClassName, ContextId};
use parcelable_continuation::ContinuationError;
use retained_holder::{
    ActivityResultPayload, Handlers, HolderConfig, HolderError, HolderPayload, PermissionPayload,
    RetainingHolder,
};
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;
use ui_api::{UiApi, UiError};

/// Errors raised by scope operations
#[derive(Debug, Error)]
pub enum ScopeError {
    /// The bound activity no longer exists
    #[error("Context {0} is gone")]
    ContextGone(ContextId),

    /// The bound fragment cannot be resolved in its activity
    #[error("No fragment with {0}")]
    FragmentNotFound(FragmentLocator),

    #[error("Holder error: {0}")]
    Holder(#[from] HolderError),

    #[error("Continuation error: {0}")]
    Continuation(#[from] ContinuationError),

    #[error("UI error: {0}")]
    Ui(#[from] UiError),

    /// A dialog was used before the host created it
    #[error("Dialog is not attached to an activity")]
    NotAttached,

    #[error("Saved state corrupted: {0}")]
    StateCorrupted(#[from] serde_json::Error),
}

impl From<ScopeError> for UiError {
    fn from(err: ScopeError) -> Self {
        match err {
            ScopeError::Ui(inner) => inner,
            other => UiError::CallbackFailed(other.to_string()),
        }
    }
}

/// Handler registries and holder settings shared by all scopes of a host
#[derive(Clone)]
pub struct ScopeHandlers {
    config: HolderConfig,
    activity: Rc<Handlers<ActivityResultPayload>>,
    permissions: Rc<Handlers<PermissionPayload>>,
}

impl ScopeHandlers {
    pub fn new(
        config: HolderConfig,
        activity: Handlers<ActivityResultPayload>,
        permissions: Handlers<PermissionPayload>,
    ) -> Self {
        Self {
            config,
            activity: Rc::new(activity),
            permissions: Rc::new(permissions),
        }
    }

    pub fn config(&self) -> &HolderConfig {
        &self.config
    }

    /// Restore functions for activity-result handlers
    pub fn activity(&self) -> &Rc<Handlers<ActivityResultPayload>> {
        &self.activity
    }

    /// Restore functions for permission handlers
    pub fn permissions(&self) -> &Rc<Handlers<PermissionPayload>> {
        &self.permissions
    }
}

/// Registers the recreation factories of both holder kinds
///
/// Without this, holders are lost on process death together with the
/// continuations they own.
pub fn install(host: &mut dyn UiApi, handlers: &ScopeHandlers) {
    host.register_fragment_factory(
        ClassName::new(ActivityResultPayload::CLASS),
        RetainingHolder::<ActivityResultPayload>::factory(
            handlers.config.clone(),
            handlers.activity.clone(),
        ),
    );
    host.register_fragment_factory(
        ClassName::new(PermissionPayload::CLASS),
        RetainingHolder::<PermissionPayload>::factory(
            handlers.config.clone(),
            handlers.permissions.clone(),
        ),
    );
    debug!("holder factories installed");
}

#[cfg(test)]
pub(crate) mod test_handlers {
    //! Callback handlers that record what they were resumed with

    use super::*;
    use continuation_codec::Captured;
    use lifecycle::Outcome;
    use parcelable_continuation::{CallbackHandler, ResumeContext, Resumable};
    use std::cell::RefCell;
    use ui_api::{GrantResult, Intent};

    thread_local! {
        static SEEN: RefCell<Vec<String>> = RefCell::new(Vec::new());
    }

    pub fn take_seen() -> Vec<String> {
        SEEN.with(|seen| seen.take())
    }

    pub fn record(entry: String) {
        SEEN.with(|seen| seen.borrow_mut().push(entry));
    }

    fn label(args: &Captured) -> &str {
        args.as_str().unwrap_or("?")
    }

    fn on_activity(_cx: &mut ResumeContext<'_>, args: &Captured, outcome: Outcome<Option<Intent>>) {
        let detail = match outcome {
            Outcome::Ok(Some(intent)) => format!("ok {}", intent.action),
            Outcome::Ok(None) => "ok".to_string(),
            Outcome::Cancelled => "cancelled".to_string(),
            Outcome::Error(failure) => format!("error {}", failure.message),
        };
        record(format!("{}: {}", label(args), detail));
    }

    fn on_permissions(_cx: &mut ResumeContext<'_>, args: &Captured, outcome: Outcome<Option<GrantResult>>) {
        let detail = match outcome {
            Outcome::Ok(Some(grant)) => format!("granted {}", grant.all_granted()),
            Outcome::Ok(None) => "denied".to_string(),
            Outcome::Cancelled => "cancelled".to_string(),
            Outcome::Error(failure) => format!("error {}", failure.message),
        };
        record(format!("{}: {}", label(args), detail));
    }

    pub fn handlers() -> ScopeHandlers {
        let mut activity = Handlers::<ActivityResultPayload>::new();
        activity.register_callback("on_activity", on_activity);
        let mut permissions = Handlers::<PermissionPayload>::new();
        permissions.register_callback("on_permissions", on_permissions);
        ScopeHandlers::new(HolderConfig::default(), activity, permissions)
    }

    pub fn activity_handler(label: &str) -> Box<dyn Resumable<Outcome<Option<Intent>>>> {
        Box::new(CallbackHandler::new("on_activity", on_activity, label))
    }

    pub fn permission_handler(label: &str) -> Box<dyn Resumable<Outcome<Option<GrantResult>>>> {
        Box::new(CallbackHandler::new("on_permissions", on_permissions, label))
    }
}
