//! UI host trait and fragment lifecycle hooks

use crate::{
    ActivityResult, ContextInfo, DestroyObserver, DestroyTarget, FragmentInfo, FragmentSpec,
    GrantResult, Intent, SavedState, UiError, UiTask, WorkerTask,
};
use core_types::{ClassName, ContextId, FragmentId, RequestCode};
use std::any::Any;
use std::rc::Rc;

/// Whether a fragment consumed a result callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The fragment matched the request code and consumed the result
    Handled,
    /// The host must apply its default handling
    Unhandled,
}

/// Builds a fresh fragment instance when its host is recreated after
/// process death
pub type FragmentFactory = Box<dyn Fn() -> Rc<dyn FragmentCallbacks>>;

/// Lifecycle hooks a fragment instance receives from the host
///
/// Hooks take `&self`: the host keeps instances behind `Rc` and a hook may
/// re-enter the host (and through it, the same fragment). Implementations
/// keep their mutable state in cells and release borrows before calling out.
pub trait FragmentCallbacks {
    /// Runtime class of the fragment
    fn class(&self) -> ClassName;

    /// Whether the same instance survives recreation of the host context
    fn retain_instance(&self) -> bool {
        false
    }

    /// Called on every creation, including recreation with a new context
    ///
    /// `saved` carries whatever the previous instance wrote in
    /// [`FragmentCallbacks::on_save_instance_state`].
    fn on_create(
        &self,
        _host: &mut dyn UiApi,
        _fragment: FragmentId,
        _activity: ContextId,
        _saved: Option<&SavedState>,
    ) -> Result<(), UiError> {
        Ok(())
    }

    /// Called before the host context is destroyed for recreation
    fn on_save_instance_state(&self, _host: &dyn UiApi, _out: &mut SavedState) -> Result<(), UiError> {
        Ok(())
    }

    fn on_activity_result(
        &self,
        _host: &mut dyn UiApi,
        _code: RequestCode,
        _result: ActivityResult,
    ) -> Result<Dispatch, UiError> {
        Ok(Dispatch::Unhandled)
    }

    fn on_request_permissions_result(
        &self,
        _host: &mut dyn UiApi,
        _code: RequestCode,
        _grant: GrantResult,
    ) -> Result<Dispatch, UiError> {
        Ok(Dispatch::Unhandled)
    }

    /// Called when a dialog fragment is dismissed or cancelled by the user
    fn on_dismiss(&self, _host: &mut dyn UiApi) -> Result<(), UiError> {
        Ok(())
    }

    /// Called when the fragment is torn down
    ///
    /// `permanent` is false when the fragment is only being destroyed for
    /// recreation.
    fn on_destroy(&self, _host: &mut dyn UiApi, _permanent: bool) -> Result<(), UiError> {
        Ok(())
    }

    /// Upcast used to recover the concrete fragment type
    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

/// The UI host interface
///
/// Multiple implementations are possible:
/// - Simulated host (for testing)
/// - Bindings to a real UI toolkit
///
/// # Design Principles
///
/// **Handles, not objects**: contexts and fragments are named by ids and
/// resolved on every use. A destroyed entity resolves to `None`.
///
/// **Single UI thread**: every method is called from the UI thread. Work
/// queued with [`UiApi::spawn_worker`] must come back through
/// [`crate::WorkerContext::run_on_ui_thread`] before touching the host.
///
/// **Transactions**: fragment additions and removals are queued and only
/// become visible to lookups after [`UiApi::execute_pending_transactions`].
pub trait UiApi {
    /// Resolves a context handle
    fn context_info(&self, context: ContextId) -> Option<ContextInfo>;

    /// Returns the application context of this process
    fn application_context(&self) -> ContextId;

    /// Whether `class` is `ancestor` or a subclass of it
    fn is_instance_of(&self, class: &ClassName, ancestor: &ClassName) -> bool;

    /// Queues the addition of a fragment to a context's fragment manager
    fn add_fragment(
        &mut self,
        host: ContextId,
        spec: FragmentSpec,
        instance: Rc<dyn FragmentCallbacks>,
    ) -> Result<FragmentId, UiError>;

    /// Queues the removal of a fragment
    fn remove_fragment(&mut self, fragment: FragmentId) -> Result<(), UiError>;

    /// Applies every queued fragment transaction
    fn execute_pending_transactions(&mut self);

    fn fragment_info(&self, fragment: FragmentId) -> Option<FragmentInfo>;

    fn fragment_instance(&self, fragment: FragmentId) -> Option<Rc<dyn FragmentCallbacks>>;

    fn find_fragment_by_tag(&self, host: ContextId, tag: &str) -> Option<FragmentId>;

    fn find_fragment_by_id(&self, host: ContextId, container_id: u32) -> Option<FragmentId>;

    /// Starts a sub-activity whose result is delivered to `from`
    fn start_activity_for_result(
        &mut self,
        from: FragmentId,
        intent: Intent,
        code: RequestCode,
    ) -> Result<(), UiError>;

    /// Asks the user for permissions; the grant is delivered to `from`
    fn request_permissions(
        &mut self,
        from: FragmentId,
        permissions: Vec<String>,
        code: RequestCode,
    ) -> Result<(), UiError>;

    /// Shows a dialog fragment that was added to the fragment manager
    fn show_dialog(&mut self, dialog: FragmentId) -> Result<(), UiError>;

    /// Dismisses a shown dialog and removes it from its fragment manager
    ///
    /// The dialog receives [`FragmentCallbacks::on_dismiss`] first.
    fn dismiss_dialog(&mut self, dialog: FragmentId) -> Result<(), UiError>;

    /// Queues a task on the UI thread
    fn run_on_ui_thread(&mut self, task: UiTask);

    /// Queues a task on the worker pool
    fn spawn_worker(&mut self, task: WorkerTask);

    /// Registers how to rebuild fragments of `class` after process death
    fn register_fragment_factory(&mut self, class: ClassName, factory: FragmentFactory);

    /// Calls `observer` once `target` is permanently destroyed
    ///
    /// Observers follow their target across recreation. They are dropped
    /// uncalled when the process dies, and an unknown target is reported as
    /// an error.
    fn observe_destroy(
        &mut self,
        target: DestroyTarget,
        observer: DestroyObserver,
    ) -> Result<(), UiError>;
}
