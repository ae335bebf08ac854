//! Activity scope

use crate::{ContextBinding, Job, JobContext, ScopeError, ScopeHandlers};
use core_types::{ContextId, FragmentId, RequestCode};
use lifecycle::{Failure, Outcome};
use parcelable_continuation::Resumable;
use retained_holder::{
    ActivityResultPayload, Handlers, HolderConfig, HolderError, HolderPayload, PermissionPayload,
    RetainingHolder,
};
use std::rc::Rc;
use tracing::{debug, error, warn};
use ui_api::{DestroyTarget, GrantResult, Intent, UiApi, UiError, WorkerContext};

/// Suspendable operations on behalf of one activity
///
/// The scope owns a root [`Job`]; jobs launched from it are its children and
/// are cancelled with it. The root job is cancelled with
/// [`lifecycle::CancellationReason::HostDestroyed`] when the activity is
/// finished, but not when it is only recreated.
pub struct ActivityScope {
    handlers: ScopeHandlers,
    job: Job,
}

impl ActivityScope {
    /// Creates a scope for a live activity
    pub fn new(
        host: &mut dyn UiApi,
        activity: ContextId,
        handlers: ScopeHandlers,
    ) -> Result<Self, ScopeError> {
        let binding = ContextBinding::for_activity(activity);
        if !binding.is_live(&*host) {
            return Err(ScopeError::ContextGone(activity));
        }
        let job = Job::new(binding);
        job.cancel_on_destroy(host, DestroyTarget::Context(activity))?;
        Ok(Self { handlers, job })
    }

    pub fn activity(&self) -> ContextId {
        self.job.binding().activity()
    }

    pub fn binding(&self) -> &ContextBinding {
        self.job.binding()
    }

    pub fn handlers(&self) -> &ScopeHandlers {
        &self.handlers
    }

    /// Root job of this scope
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Fails with [`ScopeError::ContextGone`] once the activity is destroyed
    pub fn ensure_live(&self, host: &dyn UiApi) -> Result<(), ScopeError> {
        if self.binding().is_live(host) {
            Ok(())
        } else {
            Err(ScopeError::ContextGone(self.activity()))
        }
    }

    /// Launches `body` as a child job on the worker queue
    pub fn launch<F>(&self, host: &mut dyn UiApi, body: F) -> Job
    where
        F: FnOnce(&mut JobContext<'_>) + 'static,
    {
        self.launch_bound(host, self.binding().clone(), body)
    }

    pub(crate) fn launch_bound<F>(&self, host: &mut dyn UiApi, binding: ContextBinding, body: F) -> Job
    where
        F: FnOnce(&mut JobContext<'_>) + 'static,
    {
        let job = self.job.child(binding);
        let running = job.clone();
        debug!(job = %job.id(), context = %self.activity(), "job launched");
        host.spawn_worker(Box::new(move |worker: &mut WorkerContext| {
            if let Some(reason) = running.cancellation_reason() {
                debug!(job = %running.id(), reason = %reason, "job cancelled before it started");
                return;
            }
            body(&mut JobContext::new(running, worker));
        }));
        job
    }

    /// Starts an activity for its result
    ///
    /// The handler is stored in the activity's retained holder under a fresh
    /// request code, which is returned. The platform request itself is
    /// posted to the UI thread.
    pub fn start_activity_for_result(
        &self,
        host: &mut dyn UiApi,
        intent: Intent,
        handler: Box<dyn Resumable<Outcome<Option<Intent>>>>,
    ) -> Result<RequestCode, ScopeError> {
        self.ensure_live(&*host)?;
        let activity = self.activity();
        let config = self.handlers.config().clone();
        let (code, fragment) = register_with_holder::<ActivityResultPayload>(
            host,
            activity,
            &config,
            self.handlers.activity(),
            handler,
        )?;

        host.run_on_ui_thread(Box::new(move |host: &mut dyn UiApi| {
            let issued = host.start_activity_for_result(fragment, intent, code);
            if let Err(err) = issued {
                fail_request::<ActivityResultPayload>(host, activity, &config, code, err);
            }
        }));
        Ok(code)
    }

    /// Requests runtime permissions
    ///
    /// An empty permission list resolves as cancelled without reaching the
    /// platform.
    pub fn request_permissions(
        &self,
        host: &mut dyn UiApi,
        permissions: Vec<String>,
        handler: Box<dyn Resumable<Outcome<Option<GrantResult>>>>,
    ) -> Result<RequestCode, ScopeError> {
        self.ensure_live(&*host)?;
        let activity = self.activity();
        let config = self.handlers.config().clone();
        let (code, fragment) = register_with_holder::<PermissionPayload>(
            host,
            activity,
            &config,
            self.handlers.permissions(),
            handler,
        )?;

        host.run_on_ui_thread(Box::new(move |host: &mut dyn UiApi| {
            if permissions.is_empty() {
                let holder = RetainingHolder::<PermissionPayload>::find(&*host, activity, &config);
                let Some(holder) = holder else {
                    warn!(request_code = %code, "permission holder gone before the request was issued");
                    return;
                };
                if let Err(err) = holder.dispatch(host, code, Outcome::Cancelled) {
                    error!(request_code = %code, error = %err, "empty permission request failed");
                }
                return;
            }
            let issued = host.request_permissions(fragment, permissions, code);
            if let Err(err) = issued {
                fail_request::<PermissionPayload>(host, activity, &config, code, err);
            }
        }));
        Ok(code)
    }

    /// Points the scope at the activity that replaced its old one
    ///
    /// The root job is kept and now also ends with `activity`; jobs already
    /// launched keep their old binding.
    pub fn rebind(&mut self, host: &mut dyn UiApi, activity: ContextId) -> Result<(), ScopeError> {
        let binding = self.binding().rebind(activity);
        if !binding.is_live(&*host) {
            return Err(ScopeError::ContextGone(activity));
        }
        self.job
            .cancel_on_destroy(host, DestroyTarget::Context(activity))?;
        debug!(old = %self.activity(), new = %activity, "scope rebound");
        self.job = self.job.with_binding(binding);
        Ok(())
    }
}

fn register_with_holder<P: HolderPayload>(
    host: &mut dyn UiApi,
    activity: ContextId,
    config: &HolderConfig,
    handlers: &Rc<Handlers<P>>,
    handler: Box<dyn Resumable<Outcome<P::Value>>>,
) -> Result<(RequestCode, FragmentId), ScopeError> {
    let holder = RetainingHolder::<P>::obtain(host, activity, config, handlers)?;
    let fragment = holder.fragment().ok_or(HolderError::Detached)?;
    let code = holder.register(handler)?;
    debug!(request_code = %code, context = %activity, class = P::CLASS, "request registered");
    Ok((code, fragment))
}

/// Resolves a request the platform refused with an error outcome
fn fail_request<P: HolderPayload>(
    host: &mut dyn UiApi,
    activity: ContextId,
    config: &HolderConfig,
    code: RequestCode,
    err: UiError,
) {
    warn!(request_code = %code, error = %err, "platform refused request");
    let Some(holder) = RetainingHolder::<P>::find(&*host, activity, config) else {
        error!(request_code = %code, "holder gone, request result lost");
        return;
    };
    let outcome = Outcome::Error(Failure::platform(err.to_string()));
    if let Err(err) = holder.dispatch(host, code, outcome) {
        error!(request_code = %code, error = %err, "failed to resolve refused request");
    }
}
