//! # Retained Holder
//!
//! A headless, retained fragment that owns the continuations waiting for
//! platform results of one activity.
//!
//! ## Philosophy
//!
//! - **One owner per request code**: every pending continuation has a code
//!   unique within its holder, and each platform callback resumes exactly one
//!   of them
//! - **Survives recreation**: the holder instance is retained across
//!   configuration changes and rebuilt from saved state after process death
//! - **Cleans up after itself**: once nothing is pending the holder removes
//!   itself from its activity
//!
//! ## Threading
//!
//! The holder is shared through `Rc` and keeps its state in cells, so it is
//! neither `Send` nor `Sync`: it can only be touched from the UI thread that
//! created it.

pub mod config;
pub mod payload;

pub use config::HolderConfig;
pub use payload::{ActivityResultPayload, HolderPayload, PermissionPayload};

use core_types::{ClassName, ContextId, FragmentId, RequestCode};
use lifecycle::{CancellationReason, Outcome};
use parcelable_continuation::{
    ContinuationError, ContinuationState, HandlerRegistry, ParcelRecord, ParcelableContinuation,
    Resumable,
};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::mem;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use ui_api::{
    ActivityResult, Dispatch, FragmentCallbacks, FragmentFactory, FragmentSpec, GrantResult,
    SavedState, UiApi, UiError,
};

/// Errors raised by holder operations
#[derive(Debug, Error)]
pub enum HolderError {
    /// A continuation with the same request code is already pending
    #[error("Request code {0} is already pending")]
    DuplicateRequestCode(RequestCode),

    /// The request code was resolved before and is not pending again
    #[error("Request code {0} was already resolved")]
    AlreadyResolved(RequestCode),

    /// The holder is not attached to a live activity
    #[error("Holder is not attached to an activity")]
    Detached,

    #[error("Continuation error: {0}")]
    Continuation(#[from] ContinuationError),

    #[error("UI error: {0}")]
    Ui(#[from] UiError),

    /// The saved-state slot could not be read or written
    #[error("Saved state corrupted: {0}")]
    StateCorrupted(#[from] serde_json::Error),
}

impl From<HolderError> for UiError {
    fn from(err: HolderError) -> Self {
        match err {
            HolderError::Ui(inner) => inner,
            other => UiError::CallbackFailed(other.to_string()),
        }
    }
}

/// Registry type shared by every holder of payload `P`
pub type Handlers<P> = HandlerRegistry<Outcome<<P as HolderPayload>::Value>>;

type Continuation<P> = ParcelableContinuation<Outcome<<P as HolderPayload>::Value>>;

/// Retained fragment owning the pending continuations of one activity
pub struct RetainingHolder<P: HolderPayload> {
    config: HolderConfig,
    handlers: Rc<Handlers<P>>,
    pending: RefCell<Vec<Continuation<P>>>,
    resolved: RefCell<BTreeSet<RequestCode>>,
    issued: Cell<Option<RequestCode>>,
    fragment: Cell<Option<FragmentId>>,
    activity: Cell<Option<ContextId>>,
    _payload: PhantomData<P>,
}

impl<P: HolderPayload> RetainingHolder<P> {
    /// Creates an empty holder, not yet added to any activity
    pub fn new(config: HolderConfig, handlers: Rc<Handlers<P>>) -> Rc<Self> {
        Rc::new(Self {
            config,
            handlers,
            pending: RefCell::new(Vec::new()),
            resolved: RefCell::new(BTreeSet::new()),
            issued: Cell::new(None),
            fragment: Cell::new(None),
            activity: Cell::new(None),
            _payload: PhantomData,
        })
    }

    /// Builds holders of this kind when their activity is restored after
    /// process death
    pub fn factory(config: HolderConfig, handlers: Rc<Handlers<P>>) -> FragmentFactory {
        Box::new(move || -> Rc<dyn FragmentCallbacks> {
            RetainingHolder::<P>::new(config.clone(), handlers.clone())
        })
    }

    /// Finds the holder already added to `activity`
    pub fn find(host: &dyn UiApi, activity: ContextId, config: &HolderConfig) -> Option<Rc<Self>> {
        let fragment = host.find_fragment_by_tag(activity, P::tag(config))?;
        host.fragment_instance(fragment)?
            .as_any_rc()
            .downcast::<Self>()
            .ok()
    }

    /// Finds the holder of `activity`, adding a new one on first use
    pub fn obtain(
        host: &mut dyn UiApi,
        activity: ContextId,
        config: &HolderConfig,
        handlers: &Rc<Handlers<P>>,
    ) -> Result<Rc<Self>, HolderError> {
        if let Some(holder) = Self::find(&*host, activity, config) {
            return Ok(holder);
        }

        let holder = Self::new(config.clone(), handlers.clone());
        host.add_fragment(activity, FragmentSpec::tagged(P::tag(config)), holder.clone())?;
        host.execute_pending_transactions();
        info!(context = %activity, class = P::CLASS, "continuation holder added");
        Ok(holder)
    }

    pub fn config(&self) -> &HolderConfig {
        &self.config
    }

    pub fn handlers(&self) -> &Rc<Handlers<P>> {
        &self.handlers
    }

    /// Fragment handle of this holder, once created by the host
    pub fn fragment(&self) -> Option<FragmentId> {
        self.fragment.get()
    }

    /// Activity the holder is currently attached to
    pub fn activity(&self) -> Option<ContextId> {
        self.activity.get()
    }

    /// Highest request code this holder has handed out, or the code just
    /// below the start value before the first registration
    ///
    /// Never decreases while the holder lives, so a resolved code is not
    /// reused for a later request.
    pub fn last_result_code(&self) -> RequestCode {
        let pending = self.pending.borrow();
        let resolved = self.resolved.borrow();
        pending
            .iter()
            .map(|continuation| continuation.request_code())
            .chain(resolved.iter().copied())
            .chain(self.issued.get())
            .max()
            .unwrap_or_else(|| self.config.request_code_start().prev())
    }

    /// Code the next registered continuation will get
    pub fn next_request_code(&self) -> RequestCode {
        self.last_result_code().next()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Pending request codes, in registration order
    pub fn pending_codes(&self) -> Vec<RequestCode> {
        self.pending
            .borrow()
            .iter()
            .map(|continuation| continuation.request_code())
            .collect()
    }

    /// States of the pending continuations, in registration order
    pub fn pending_states(&self) -> Vec<ContinuationState> {
        self.pending
            .borrow()
            .iter()
            .map(|continuation| continuation.state())
            .collect()
    }

    pub fn has_pending(&self, code: RequestCode) -> bool {
        self.pending
            .borrow()
            .iter()
            .any(|continuation| continuation.request_code() == code)
    }

    /// Stores a continuation until its result arrives
    pub fn add_continuation(&self, continuation: Continuation<P>) -> Result<(), HolderError> {
        let code = continuation.request_code();
        if self.has_pending(code) {
            return Err(HolderError::DuplicateRequestCode(code));
        }
        if self.resolved.borrow().contains(&code) {
            return Err(HolderError::AlreadyResolved(code));
        }
        self.issued.set(self.issued.get().max(Some(code)));
        self.pending.borrow_mut().push(continuation);
        debug!(request_code = %code, pending = self.pending_count(), "continuation registered");
        Ok(())
    }

    /// Wraps `handler` under the next request code and stores it
    pub fn register(
        &self,
        handler: Box<dyn Resumable<Outcome<P::Value>>>,
    ) -> Result<RequestCode, HolderError> {
        let activity = self.activity.get().ok_or(HolderError::Detached)?;
        let code = self.next_request_code();
        self.add_continuation(ParcelableContinuation::new(code, handler, activity))?;
        Ok(code)
    }

    /// Resumes the continuation waiting for `code`
    ///
    /// An unknown code is left to the host's default handling. The holder
    /// removes itself from its activity once nothing is pending.
    pub fn dispatch(
        &self,
        host: &mut dyn UiApi,
        code: RequestCode,
        outcome: Outcome<P::Value>,
    ) -> Result<Dispatch, HolderError> {
        if !self.has_pending(code) {
            if self.resolved.borrow().contains(&code) {
                warn!(request_code = %code, "result delivered twice");
                return Err(HolderError::AlreadyResolved(code));
            }
            debug!(request_code = %code, "result for unknown request code");
            return Ok(Dispatch::Unhandled);
        }

        host.execute_pending_transactions();
        let activity = self.activity.get().ok_or(HolderError::Detached)?;
        let continuation = {
            let mut pending = self.pending.borrow_mut();
            let pos = pending
                .iter()
                .position(|continuation| continuation.request_code() == code);
            pos.map(|pos| pending.remove(pos))
        };
        let Some(mut continuation) = continuation else {
            return Ok(Dispatch::Unhandled);
        };
        self.resolved.borrow_mut().insert(code);

        debug!(request_code = %code, context = %activity, "dispatching result");
        let resumed = continuation.resume(host, &self.handlers, activity, outcome);

        if self.pending.borrow().is_empty() {
            if let Some(fragment) = self.fragment.get() {
                host.remove_fragment(fragment)?;
                info!(context = %activity, class = P::CLASS, "continuation holder removed");
            }
        }

        resumed?;
        Ok(Dispatch::Handled)
    }

    fn restore_pending(&self, saved: &SavedState) -> Result<(), HolderError> {
        if !self.pending.borrow().is_empty() {
            // retained instance: the in-memory list is already serialized
            return Ok(());
        }
        if let Some(bytes) = saved.get(&self.last_code_slot()) {
            let last: RequestCode = serde_json::from_slice(bytes)?;
            self.issued.set(self.issued.get().max(Some(last)));
        }
        let Some(bytes) = saved.get(&self.config.state_slot) else {
            return Ok(());
        };
        let records: Vec<ParcelRecord> = serde_json::from_slice(bytes)?;
        debug!(count = records.len(), "continuations restored from saved state");
        self.pending.borrow_mut().extend(
            records
                .into_iter()
                .map(ParcelableContinuation::from_parcel),
        );
        Ok(())
    }

    fn attach_all(&self, host: &dyn UiApi, activity: ContextId) -> Result<(), HolderError> {
        let mut pending = self.pending.borrow_mut();
        for continuation in pending.iter_mut() {
            continuation.attach(host, &self.handlers, activity)?;
        }
        Ok(())
    }

    fn last_code_slot(&self) -> String {
        format!("{}.last_request_code", self.config.state_slot)
    }

    fn save_pending(&self, host: &dyn UiApi, out: &mut SavedState) -> Result<(), HolderError> {
        let last = self.last_result_code();
        let mut pending = self.pending.borrow_mut();
        let mut records = Vec::with_capacity(pending.len());
        for continuation in pending.iter_mut() {
            continuation.detach(host, &self.handlers)?;
            records.push(continuation.to_parcel()?);
        }
        out.put(self.config.state_slot.clone(), serde_json::to_vec(&records)?);
        out.put(self.last_code_slot(), serde_json::to_vec(&last)?);
        debug!(count = records.len(), "continuations saved");
        Ok(())
    }

    fn cancel_all(&self, host: &mut dyn UiApi) {
        let drained = mem::take(&mut *self.pending.borrow_mut());
        let Some(activity) = self.activity.get() else {
            if !drained.is_empty() {
                warn!(count = drained.len(), "dropping continuations of a detached holder");
            }
            return;
        };
        for mut continuation in drained {
            let code = continuation.request_code();
            warn!(request_code = %code, "cancelling continuation, host destroyed");
            self.resolved.borrow_mut().insert(code);
            if let Err(err) = continuation.cancel(
                host,
                &self.handlers,
                activity,
                CancellationReason::HostDestroyed,
            ) {
                error!(request_code = %code, error = %err, "cancellation failed");
            }
        }
    }

    fn log_failure(&self, code: RequestCode, err: HolderError) -> UiError {
        error!(request_code = %code, error = %err, "result dispatch failed");
        err.into()
    }
}

impl<P: HolderPayload> FragmentCallbacks for RetainingHolder<P> {
    fn class(&self) -> ClassName {
        ClassName::new(P::CLASS)
    }

    fn retain_instance(&self) -> bool {
        true
    }

    fn on_create(
        &self,
        host: &mut dyn UiApi,
        fragment: FragmentId,
        activity: ContextId,
        saved: Option<&SavedState>,
    ) -> Result<(), UiError> {
        self.fragment.set(Some(fragment));
        self.activity.set(Some(activity));
        if let Some(saved) = saved {
            self.restore_pending(saved)?;
        }
        self.attach_all(&*host, activity).map_err(|err| {
            error!(context = %activity, error = %err, "continuation reattach failed");
            UiError::from(err)
        })
    }

    fn on_save_instance_state(&self, host: &dyn UiApi, out: &mut SavedState) -> Result<(), UiError> {
        Ok(self.save_pending(host, out)?)
    }

    fn on_activity_result(
        &self,
        host: &mut dyn UiApi,
        code: RequestCode,
        result: ActivityResult,
    ) -> Result<Dispatch, UiError> {
        if !self.has_pending(code) && !self.resolved.borrow().contains(&code) {
            return Ok(Dispatch::Unhandled);
        }
        let Some(outcome) = P::translate_activity_result(result) else {
            return Ok(Dispatch::Unhandled);
        };
        self.dispatch(host, code, outcome)
            .map_err(|err| self.log_failure(code, err))
    }

    fn on_request_permissions_result(
        &self,
        host: &mut dyn UiApi,
        code: RequestCode,
        grant: GrantResult,
    ) -> Result<Dispatch, UiError> {
        if !self.has_pending(code) && !self.resolved.borrow().contains(&code) {
            return Ok(Dispatch::Unhandled);
        }
        let Some(outcome) = P::translate_permissions(grant) else {
            return Ok(Dispatch::Unhandled);
        };
        self.dispatch(host, code, outcome)
            .map_err(|err| self.log_failure(code, err))
    }

    fn on_destroy(&self, host: &mut dyn UiApi, permanent: bool) -> Result<(), UiError> {
        if permanent {
            self.cancel_all(host);
            self.fragment.set(None);
        }
        self.activity.set(None);
        Ok(())
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use continuation_codec::Captured;
    use parcelable_continuation::{CallbackHandler, ResumeContext};
    use sim_ui::test_utils::bootstrap;
    use sim_ui::SimulatedUi;
    use std::cell::RefCell;
    use ui_api::{GrantCode, Intent, ResultCode};

    type ActivityOutcome = Outcome<Option<Intent>>;

    thread_local! {
        static RESULTS: RefCell<Vec<(String, ActivityOutcome)>> = RefCell::new(Vec::new());
        static GRANTS: RefCell<Vec<Outcome<Option<GrantResult>>>> = RefCell::new(Vec::new());
    }

    fn take_results() -> Vec<(String, ActivityOutcome)> {
        RESULTS.with(|results| results.take())
    }

    fn remember(_cx: &mut ResumeContext<'_>, args: &Captured, outcome: ActivityOutcome) {
        let label = args.as_str().unwrap_or_default().to_string();
        RESULTS.with(|results| results.borrow_mut().push((label, outcome)));
    }

    /// Registers a follow-up request from inside the callback
    fn chain(cx: &mut ResumeContext<'_>, args: &Captured, outcome: ActivityOutcome) {
        remember(cx, args, outcome);
        let holder = RetainingHolder::<ActivityResultPayload>::find(
            cx.host(),
            cx.context(),
            &HolderConfig::default(),
        );
        if let Some(holder) = holder {
            let _ = holder.register(handler("follow-up"));
        }
    }

    fn remember_grant(_cx: &mut ResumeContext<'_>, _args: &Captured, outcome: Outcome<Option<GrantResult>>) {
        GRANTS.with(|grants| grants.borrow_mut().push(outcome));
    }

    fn handlers() -> Rc<Handlers<ActivityResultPayload>> {
        let mut registry = HandlerRegistry::new();
        registry.register_callback("remember", remember);
        registry.register_callback("chain", chain);
        Rc::new(registry)
    }

    fn handler(label: &str) -> Box<dyn Resumable<ActivityOutcome>> {
        Box::new(CallbackHandler::new("remember", remember, label))
    }

    fn setup() -> (SimulatedUi, ContextId, Rc<RetainingHolder<ActivityResultPayload>>) {
        let (mut ui, activity) = bootstrap("MainActivity");
        let holder = RetainingHolder::<ActivityResultPayload>::obtain(
            &mut ui,
            activity,
            &HolderConfig::default(),
            &handlers(),
        )
        .unwrap();
        (ui, activity, holder)
    }

    fn request(
        ui: &mut SimulatedUi,
        holder: &RetainingHolder<ActivityResultPayload>,
        label: &str,
    ) -> RequestCode {
        let code = holder.register(handler(label)).unwrap();
        ui.start_activity_for_result(holder.fragment().unwrap(), Intent::new("pick"), code)
            .unwrap();
        code
    }

    #[test]
    fn test_obtain_reuses_existing_holder() {
        let (mut ui, activity, holder) = setup();
        let again = RetainingHolder::<ActivityResultPayload>::obtain(
            &mut ui,
            activity,
            &HolderConfig::default(),
            &handlers(),
        )
        .unwrap();
        assert!(Rc::ptr_eq(&holder, &again));
        assert_eq!(holder.activity(), Some(activity));
        assert_eq!(
            ui.find_fragment_by_tag(activity, "__RETAINED_CONTINUATION_FRAGMENT__"),
            holder.fragment()
        );
    }

    #[test]
    fn test_request_codes_increase() {
        let (mut ui, _activity, holder) = setup();
        assert_eq!(holder.last_result_code(), RequestCode::new(0xEFF));
        assert_eq!(holder.next_request_code(), RequestCode::START);

        let first = request(&mut ui, &holder, "first");
        let second = request(&mut ui, &holder, "second");
        assert_eq!(first, RequestCode::new(0xF00));
        assert_eq!(second, RequestCode::new(0xF01));
        assert_eq!(holder.last_result_code(), second);
        assert_eq!(holder.pending_codes(), vec![first, second]);
    }

    #[test]
    fn test_ok_result_resumes_and_removes_holder() {
        let (mut ui, activity, holder) = setup();
        let code = request(&mut ui, &holder, "photo");

        let data = Intent::new("picked").with_extra("uri", "content://1");
        let dispatch = ui
            .deliver_activity_result(code, ActivityResult::ok(Some(data.clone())))
            .unwrap();

        assert_eq!(dispatch, Dispatch::Handled);
        assert_eq!(take_results(), vec![("photo".to_string(), Outcome::Ok(Some(data)))]);
        assert_eq!(holder.pending_count(), 0);
        assert!(RetainingHolder::<ActivityResultPayload>::find(&ui, activity, holder.config()).is_none());
    }

    #[test]
    fn test_canceled_result_resumes_with_cancelled() {
        let (mut ui, _activity, holder) = setup();
        let code = request(&mut ui, &holder, "photo");

        ui.deliver_activity_result(code, ActivityResult::canceled())
            .unwrap();
        assert_eq!(take_results(), vec![("photo".to_string(), Outcome::Cancelled)]);
    }

    #[test]
    fn test_unknown_code_goes_to_default_handler() {
        let (mut ui, _activity, holder) = setup();
        request(&mut ui, &holder, "photo");
        let fragment = holder.fragment().unwrap();

        let dispatch = ui
            .deliver_activity_result_to(fragment, RequestCode::new(0xABC), ActivityResult::ok(None))
            .unwrap();

        assert_eq!(dispatch, Dispatch::Unhandled);
        assert_eq!(holder.pending_count(), 1);
        assert_eq!(ui.unhandled_results().len(), 1);
        assert!(take_results().is_empty());
    }

    #[test]
    fn test_custom_result_code_is_not_consumed() {
        let (mut ui, _activity, holder) = setup();
        let code = request(&mut ui, &holder, "photo");
        let custom = ActivityResult {
            result_code: ResultCode::FIRST_USER,
            data: None,
        };

        let dispatch = ui.deliver_activity_result(code, custom).unwrap();
        assert_eq!(dispatch, Dispatch::Unhandled);
        assert_eq!(holder.pending_codes(), vec![code]);
    }

    #[test]
    fn test_dispatching_one_leaves_the_other_pending() {
        let (mut ui, activity, holder) = setup();
        let first = request(&mut ui, &holder, "first");
        let second = request(&mut ui, &holder, "second");

        ui.deliver_activity_result(second, ActivityResult::ok(None))
            .unwrap();

        assert_eq!(take_results(), vec![("second".to_string(), Outcome::Ok(None))]);
        assert_eq!(holder.pending_codes(), vec![first]);
        assert!(RetainingHolder::<ActivityResultPayload>::find(&ui, activity, holder.config()).is_some());
        assert_eq!(holder.last_result_code(), second);
        assert_eq!(holder.next_request_code(), second.next());
    }

    #[test]
    fn test_resolved_code_is_never_reissued() {
        let (mut ui, _activity, holder) = setup();
        let first = request(&mut ui, &holder, "a");
        let second = request(&mut ui, &holder, "b");
        let fragment = holder.fragment().unwrap();

        ui.deliver_activity_result(second, ActivityResult::ok(None))
            .unwrap();
        let third = request(&mut ui, &holder, "c");
        assert_eq!(third, RequestCode::new(0xF02));
        assert_eq!(holder.pending_codes(), vec![first, third]);

        let err = ui
            .deliver_activity_result_to(fragment, second, ActivityResult::ok(None))
            .unwrap_err();
        assert!(matches!(err, UiError::CallbackFailed(_)));
        assert_eq!(take_results(), vec![("b".to_string(), Outcome::Ok(None))]);
        assert_eq!(holder.pending_codes(), vec![first, third]);
    }

    #[test]
    fn test_add_continuation_rejects_resolved_code() {
        let (mut ui, activity, holder) = setup();
        request(&mut ui, &holder, "keep");
        let resolved = request(&mut ui, &holder, "done");
        ui.deliver_activity_result(resolved, ActivityResult::canceled())
            .unwrap();

        let err = holder
            .add_continuation(ParcelableContinuation::new(resolved, handler("again"), activity))
            .unwrap_err();
        assert!(matches!(err, HolderError::AlreadyResolved(code) if code == resolved));
        assert_eq!(holder.pending_count(), 1);
    }

    #[test]
    fn test_second_delivery_is_rejected() {
        let (mut ui, _activity, holder) = setup();
        let first = request(&mut ui, &holder, "first");
        request(&mut ui, &holder, "second");
        let fragment = holder.fragment().unwrap();

        ui.deliver_activity_result(first, ActivityResult::ok(None))
            .unwrap();
        take_results();

        let err = ui
            .deliver_activity_result_to(fragment, first, ActivityResult::ok(None))
            .unwrap_err();
        assert!(matches!(err, UiError::CallbackFailed(_)));
        assert!(matches!(
            holder.dispatch(&mut ui, first, Outcome::Ok(None)),
            Err(HolderError::AlreadyResolved(code)) if code == first
        ));
        assert!(take_results().is_empty());
    }

    #[test]
    fn test_duplicate_request_code_rejected() {
        let (_ui, activity, holder) = setup();
        holder
            .add_continuation(ParcelableContinuation::new(RequestCode::START, handler("a"), activity))
            .unwrap();
        let err = holder
            .add_continuation(ParcelableContinuation::new(RequestCode::START, handler("b"), activity))
            .unwrap_err();
        assert!(matches!(err, HolderError::DuplicateRequestCode(_)));
        assert_eq!(holder.pending_count(), 1);
    }

    #[test]
    fn test_register_requires_attached_holder() {
        let holder = RetainingHolder::<ActivityResultPayload>::new(HolderConfig::default(), handlers());
        assert!(matches!(
            holder.register(handler("x")),
            Err(HolderError::Detached)
        ));
    }

    #[test]
    fn test_recreation_reattaches_every_continuation() {
        let (mut ui, activity, holder) = setup();
        let first = request(&mut ui, &holder, "first");
        let second = request(&mut ui, &holder, "second");

        let recreated = ui.recreate_activity(activity).unwrap();

        assert_eq!(holder.activity(), Some(recreated));
        assert_eq!(
            holder.pending_states(),
            vec![
                ContinuationState::LiveAttached(recreated),
                ContinuationState::LiveAttached(recreated)
            ]
        );

        ui.deliver_activity_result(first, ActivityResult::ok(None))
            .unwrap();
        ui.deliver_activity_result(second, ActivityResult::canceled())
            .unwrap();
        assert_eq!(
            take_results(),
            vec![
                ("first".to_string(), Outcome::Ok(None)),
                ("second".to_string(), Outcome::Cancelled)
            ]
        );
        assert!(RetainingHolder::<ActivityResultPayload>::find(&ui, recreated, holder.config()).is_none());
    }

    #[test]
    fn test_process_death_rebuilds_holder_from_saved_state() {
        let (mut ui, activity, holder) = setup();
        let config = HolderConfig::default();
        ui.register_fragment_factory(
            ClassName::new(ActivityResultPayload::CLASS),
            RetainingHolder::<ActivityResultPayload>::factory(config.clone(), handlers()),
        );
        let code = request(&mut ui, &holder, "photo");
        drop(holder);

        let mapping = ui.kill_process().unwrap();
        let (_, restored_activity) = mapping
            .into_iter()
            .find(|(old, _)| *old == activity)
            .unwrap();

        let restored =
            RetainingHolder::<ActivityResultPayload>::find(&ui, restored_activity, &config).unwrap();
        assert_eq!(
            restored.pending_states(),
            vec![ContinuationState::LiveAttached(restored_activity)]
        );

        ui.deliver_activity_result(code, ActivityResult::ok(None))
            .unwrap();
        assert_eq!(take_results(), vec![("photo".to_string(), Outcome::Ok(None))]);
    }

    #[test]
    fn test_last_code_survives_process_death() {
        let (mut ui, activity, holder) = setup();
        let config = HolderConfig::default();
        ui.register_fragment_factory(
            ClassName::new(ActivityResultPayload::CLASS),
            RetainingHolder::<ActivityResultPayload>::factory(config.clone(), handlers()),
        );
        request(&mut ui, &holder, "kept");
        let resolved = request(&mut ui, &holder, "done");
        ui.deliver_activity_result(resolved, ActivityResult::ok(None))
            .unwrap();
        take_results();
        drop(holder);

        let mapping = ui.kill_process().unwrap();
        let (_, restored_activity) = mapping
            .into_iter()
            .find(|(old, _)| *old == activity)
            .unwrap();
        let restored =
            RetainingHolder::<ActivityResultPayload>::find(&ui, restored_activity, &config).unwrap();
        assert_eq!(restored.last_result_code(), resolved);
        assert_eq!(restored.next_request_code(), resolved.next());
    }

    #[test]
    fn test_permanent_destroy_cancels_pending() {
        let (mut ui, activity, holder) = setup();
        request(&mut ui, &holder, "photo");

        ui.finish_activity(activity).unwrap();

        assert_eq!(take_results(), vec![("photo".to_string(), Outcome::Cancelled)]);
        assert_eq!(holder.pending_count(), 0);
    }

    #[test]
    fn test_handler_may_register_follow_up_request() {
        let (mut ui, activity, holder) = setup();
        let code = holder
            .register(Box::new(CallbackHandler::new("chain", chain, "first")))
            .unwrap();
        ui.start_activity_for_result(holder.fragment().unwrap(), Intent::new("pick"), code)
            .unwrap();

        ui.deliver_activity_result(code, ActivityResult::ok(None))
            .unwrap();

        assert_eq!(take_results(), vec![("first".to_string(), Outcome::Ok(None))]);
        assert_eq!(holder.pending_codes(), vec![code.next()]);
        assert!(RetainingHolder::<ActivityResultPayload>::find(&ui, activity, holder.config()).is_some());
    }

    #[test]
    fn test_saved_state_slot_layout() {
        let (mut ui, _activity, holder) = setup();
        request(&mut ui, &holder, "photo");

        let mut saved = SavedState::new();
        holder.on_save_instance_state(&ui, &mut saved).unwrap();

        let records: Vec<ParcelRecord> =
            serde_json::from_slice(saved.get(&holder.config().state_slot).unwrap()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].request_code, RequestCode::START);
        assert_eq!(holder.pending_states(), vec![ContinuationState::SerializedDetached]);
    }

    #[test]
    fn test_corrupted_saved_state() {
        let (mut ui, activity) = bootstrap("MainActivity");
        let holder = RetainingHolder::<ActivityResultPayload>::new(HolderConfig::default(), handlers());
        let mut saved = SavedState::new();
        saved.put(holder.config().state_slot.clone(), b"garbage".to_vec());

        let fragment = FragmentId::new();
        let err = holder
            .on_create(&mut ui, fragment, activity, Some(&saved))
            .unwrap_err();
        assert!(matches!(err, UiError::CallbackFailed(_)));
    }

    #[test]
    fn test_permission_holder_translates_grants() {
        let (mut ui, activity) = bootstrap("MainActivity");
        let mut registry = HandlerRegistry::new();
        registry.register_callback("grant", remember_grant);
        let config = HolderConfig::default();
        let holder =
            RetainingHolder::<PermissionPayload>::obtain(&mut ui, activity, &config, &Rc::new(registry))
                .unwrap();
        assert_eq!(
            ui.find_fragment_by_tag(activity, &config.permission_holder_tag),
            holder.fragment()
        );

        let ask = |ui: &mut SimulatedUi| {
            let code = holder
                .register(Box::new(CallbackHandler::new("grant", remember_grant, Captured::Null)))
                .unwrap();
            ui.request_permissions(holder.fragment().unwrap(), vec!["camera".to_string()], code)
                .unwrap();
            code
        };

        let denied = ask(&mut ui);
        let granted = ask(&mut ui);
        ui.deliver_permissions_result(
            denied,
            GrantResult::new(vec![("camera".to_string(), GrantCode::Denied)]),
        )
        .unwrap();
        let grant = GrantResult::new(vec![("camera".to_string(), GrantCode::Granted)]);
        ui.deliver_permissions_result(granted, grant.clone())
            .unwrap();

        let grants = GRANTS.with(|grants| grants.take());
        assert_eq!(grants, vec![Outcome::Ok(None), Outcome::Ok(Some(grant))]);
    }
}
