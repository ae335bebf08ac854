//! Dialog fragments that resolve a suspended caller

use crate::ScopeError;
use core_types::{ClassName, ContextId, FragmentId, RequestCode};
use lifecycle::{CancellationReason, Outcome};
use parcelable_continuation::{HandlerRegistry, ParcelRecord, ParcelableContinuation, Resumable};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, error, warn};
use ui_api::{FragmentCallbacks, FragmentFactory, FragmentSpec, SavedState, UiApi, UiError};

/// Saved-state slot holding the pending callback of a dialog
pub const DIALOG_STATE_SLOT: &str = "suspendable_dialog_continuation";

type Callback<T> = ParcelableContinuation<Outcome<T>>;

/// A dialog fragment whose result resumes one stored continuation
///
/// [`SuspendableDialog::show`] stores the caller's handler; the dialog code
/// resolves it with [`SuspendableDialog::dispatch_result`]. Dismissing or
/// cancelling the dialog resolves it as cancelled. The callback is saved
/// with the dialog and reattached when the dialog is recreated.
pub struct SuspendableDialog<T: 'static> {
    class: ClassName,
    handlers: Rc<HandlerRegistry<Outcome<T>>>,
    callback: RefCell<Option<Callback<T>>>,
    next_code: Cell<RequestCode>,
    fragment: Cell<Option<FragmentId>>,
    activity: Cell<Option<ContextId>>,
}

impl<T: 'static> SuspendableDialog<T> {
    pub fn new(class: &str, handlers: Rc<HandlerRegistry<Outcome<T>>>) -> Rc<Self> {
        Rc::new(Self {
            class: ClassName::new(class),
            handlers,
            callback: RefCell::new(None),
            next_code: Cell::new(RequestCode::START),
            fragment: Cell::new(None),
            activity: Cell::new(None),
        })
    }

    /// Builds dialogs of `class` when their activity is restored after
    /// process death
    pub fn factory(class: &str, handlers: Rc<HandlerRegistry<Outcome<T>>>) -> FragmentFactory {
        let class = class.to_string();
        Box::new(move || -> Rc<dyn FragmentCallbacks> {
            SuspendableDialog::<T>::new(&class, handlers.clone())
        })
    }

    /// Finds the dialog tagged `tag` in `activity`
    pub fn find(host: &dyn UiApi, activity: ContextId, tag: &str) -> Option<Rc<Self>> {
        let fragment = host.find_fragment_by_tag(activity, tag)?;
        host.fragment_instance(fragment)?
            .as_any_rc()
            .downcast::<Self>()
            .ok()
    }

    pub fn fragment(&self) -> Option<FragmentId> {
        self.fragment.get()
    }

    pub fn activity(&self) -> Option<ContextId> {
        self.activity.get()
    }

    pub fn has_pending(&self) -> bool {
        self.callback.borrow().is_some()
    }

    /// Shows the dialog in `activity` and stores `handler` for its result
    ///
    /// A callback still pending from an earlier `show` is cancelled as
    /// superseded first.
    pub fn show(
        self: &Rc<Self>,
        host: &mut dyn UiApi,
        activity: ContextId,
        tag: &str,
        handler: Box<dyn Resumable<Outcome<T>>>,
    ) -> Result<FragmentId, ScopeError> {
        let fragment = match self.fragment.get() {
            Some(fragment) => fragment,
            None => {
                let fragment =
                    host.add_fragment(activity, FragmentSpec::tagged(tag), self.clone())?;
                host.execute_pending_transactions();
                fragment
            }
        };
        let activity = self.activity.get().ok_or(ScopeError::NotAttached)?;

        let previous = self.callback.borrow_mut().take();
        if let Some(previous) = previous {
            self.cancel_callback(host, previous, activity, CancellationReason::Superseded);
        }

        let code = self.next_code.get();
        self.next_code.set(code.next());
        *self.callback.borrow_mut() = Some(ParcelableContinuation::new(code, handler, activity));
        host.show_dialog(fragment)?;
        debug!(request_code = %code, context = %activity, tag, "dialog shown");
        Ok(fragment)
    }

    /// Resumes the stored callback with `value`
    ///
    /// Returns `false` when nothing is waiting, e.g. after a dismissal.
    pub fn dispatch_result(&self, host: &mut dyn UiApi, value: T) -> Result<bool, ScopeError> {
        let activity = self.activity.get().ok_or(ScopeError::NotAttached)?;
        let Some(mut callback) = self.callback.borrow_mut().take() else {
            debug!("dialog result without a waiting callback");
            return Ok(false);
        };
        callback.resume(host, &self.handlers, activity, Outcome::Ok(value))?;
        Ok(true)
    }

    fn cancel_callback(
        &self,
        host: &mut dyn UiApi,
        mut callback: Callback<T>,
        activity: ContextId,
        reason: CancellationReason,
    ) {
        let code = callback.request_code();
        debug!(request_code = %code, reason = %reason, "dialog callback cancelled");
        if let Err(err) = callback.cancel(host, &self.handlers, activity, reason) {
            error!(request_code = %code, error = %err, "dialog callback cancellation failed");
        }
    }

    /// Context a callback is resolved against: the activity, or the
    /// application while the dialog sits between destruction and recreation
    fn resolution_context(&self, host: &dyn UiApi) -> ContextId {
        self.activity
            .get()
            .unwrap_or_else(|| host.application_context())
    }

    fn restore(&self, saved: &SavedState) -> Result<(), ScopeError> {
        if self.callback.borrow().is_some() {
            return Ok(());
        }
        let Some(bytes) = saved.get(DIALOG_STATE_SLOT) else {
            return Ok(());
        };
        let record: ParcelRecord = serde_json::from_slice(bytes)?;
        self.next_code.set(record.request_code.next());
        *self.callback.borrow_mut() = Some(ParcelableContinuation::from_parcel(record));
        Ok(())
    }
}

impl<T: 'static> FragmentCallbacks for SuspendableDialog<T> {
    fn class(&self) -> ClassName {
        self.class.clone()
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
            self.restore(saved)?;
        }
        let mut callback = self.callback.borrow_mut();
        if let Some(callback) = callback.as_mut() {
            callback
                .attach(&*host, &self.handlers, activity)
                .map_err(|err| UiError::from(ScopeError::from(err)))?;
        }
        Ok(())
    }

    fn on_save_instance_state(&self, host: &dyn UiApi, out: &mut SavedState) -> Result<(), UiError> {
        let mut callback = self.callback.borrow_mut();
        let Some(callback) = callback.as_mut() else {
            return Ok(());
        };
        let record = callback
            .detach(host, &self.handlers)
            .and_then(|()| callback.to_parcel())
            .map_err(ScopeError::from)?;
        let bytes = serde_json::to_vec(&record).map_err(ScopeError::from)?;
        out.put(DIALOG_STATE_SLOT, bytes);
        Ok(())
    }

    fn on_dismiss(&self, host: &mut dyn UiApi) -> Result<(), UiError> {
        let Some(callback) = self.callback.borrow_mut().take() else {
            return Ok(());
        };
        if self.activity.get().is_none() {
            warn!("dialog dismissed while detached, cancelling against the application");
        }
        let context = self.resolution_context(&*host);
        self.cancel_callback(host, callback, context, CancellationReason::Dismissed);
        Ok(())
    }

    fn on_destroy(&self, host: &mut dyn UiApi, permanent: bool) -> Result<(), UiError> {
        if permanent {
            let pending = self.callback.borrow_mut().take();
            if let Some(callback) = pending {
                let context = self.resolution_context(&*host);
                self.cancel_callback(host, callback, context, CancellationReason::HostDestroyed);
            }
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
    use crate::test_handlers::{record, take_seen};
    use continuation_codec::Captured;
    use lifecycle::Failure;
    use parcelable_continuation::ResumeContext;
    use sim_ui::test_utils::bootstrap;
    use sim_ui::{SimulatedUi, DIALOG_FRAGMENT_CLASS};

    const CLASS: &str = "NumberPickerDialog";

    /// Waits for a number; records how it was resolved
    struct Answer {
        label: String,
    }

    impl Resumable<Outcome<i64>> for Answer {
        fn type_tag(&self) -> &'static str {
            "answer"
        }

        fn capture(&self) -> Captured {
            Captured::from(self.label.as_str())
        }

        fn resume(self: Box<Self>, _cx: &mut ResumeContext<'_>, value: Outcome<i64>) {
            record(format!("{}: {:?}", self.label, value));
        }

        fn resume_with_error(self: Box<Self>, _cx: &mut ResumeContext<'_>, failure: Failure) {
            record(format!("{}: error {}", self.label, failure.message));
        }

        fn cancel(self: Box<Self>, _cx: &mut ResumeContext<'_>, reason: CancellationReason) {
            record(format!("{}: cancelled, {}", self.label, reason));
        }
    }

    fn answer(label: &str) -> Box<dyn Resumable<Outcome<i64>>> {
        Box::new(Answer {
            label: label.to_string(),
        })
    }

    fn handlers() -> Rc<HandlerRegistry<Outcome<i64>>> {
        let mut registry = HandlerRegistry::new();
        registry.register("answer", |state: &Captured| {
            let label = state.as_str()?;
            let handler: Box<dyn Resumable<Outcome<i64>>> = answer(label);
            Ok(handler)
        });
        Rc::new(registry)
    }

    fn setup() -> (SimulatedUi, ContextId, Rc<SuspendableDialog<i64>>) {
        let (mut ui, activity) = bootstrap("MainActivity");
        ui.define_class(CLASS, DIALOG_FRAGMENT_CLASS);
        (ui, activity, SuspendableDialog::new(CLASS, handlers()))
    }

    #[test]
    fn test_result_resumes_caller() {
        let (mut ui, activity, dialog) = setup();
        let fragment = dialog.show(&mut ui, activity, "picker", answer("pick")).unwrap();
        assert_eq!(ui.shown_dialogs(), &[fragment]);
        assert!(ui.is_instance_of(&ClassName::new(CLASS), &ClassName::new(DIALOG_FRAGMENT_CLASS)));

        assert!(dialog.dispatch_result(&mut ui, 7).unwrap());
        assert_eq!(take_seen(), vec!["pick: Ok(7)".to_string()]);

        assert!(!dialog.dispatch_result(&mut ui, 8).unwrap());
        ui.dismiss_dialog(fragment).unwrap();
        assert!(take_seen().is_empty());
    }

    #[test]
    fn test_dismiss_cancels_caller() {
        let (mut ui, activity, dialog) = setup();
        let fragment = dialog.show(&mut ui, activity, "picker", answer("pick")).unwrap();

        ui.dismiss_dialog(fragment).unwrap();
        assert_eq!(take_seen(), vec!["pick: cancelled, dialog dismissed".to_string()]);
        assert!(ui.shown_dialogs().is_empty());
        assert!(SuspendableDialog::<i64>::find(&ui, activity, "picker").is_none());
    }

    #[test]
    fn test_second_show_supersedes_first() {
        let (mut ui, activity, dialog) = setup();
        let first = dialog.show(&mut ui, activity, "picker", answer("first")).unwrap();
        let second = dialog.show(&mut ui, activity, "picker", answer("second")).unwrap();
        assert_eq!(first, second);
        assert_eq!(take_seen(), vec!["first: cancelled, superseded".to_string()]);

        dialog.dispatch_result(&mut ui, 3).unwrap();
        assert_eq!(take_seen(), vec!["second: Ok(3)".to_string()]);
    }

    #[test]
    fn test_callback_survives_recreation() {
        let (mut ui, activity, dialog) = setup();
        dialog.show(&mut ui, activity, "picker", answer("kept")).unwrap();

        let recreated = ui.recreate_activity(activity).unwrap();
        let restored = SuspendableDialog::<i64>::find(&ui, recreated, "picker").unwrap();
        assert_eq!(restored.activity(), Some(recreated));
        assert!(restored.has_pending());

        restored.dispatch_result(&mut ui, 11).unwrap();
        assert_eq!(take_seen(), vec!["kept: Ok(11)".to_string()]);
    }

    #[test]
    fn test_callback_survives_process_death() {
        let (mut ui, activity, dialog) = setup();
        ui.register_fragment_factory(
            ClassName::new(CLASS),
            SuspendableDialog::<i64>::factory(CLASS, handlers()),
        );
        dialog.show(&mut ui, activity, "picker", answer("revived")).unwrap();
        drop(dialog);

        let mapping = ui.kill_process().unwrap();
        let restored = SuspendableDialog::<i64>::find(&ui, mapping[0].1, "picker").unwrap();
        assert_eq!(ui.shown_dialogs().len(), 1);

        let fragment = restored.fragment().unwrap();
        ui.dismiss_dialog(fragment).unwrap();
        assert_eq!(take_seen(), vec!["revived: cancelled, dialog dismissed".to_string()]);
    }

    #[test]
    fn test_finish_cancels_with_host_destroyed() {
        let (mut ui, activity, dialog) = setup();
        dialog.show(&mut ui, activity, "picker", answer("gone")).unwrap();

        ui.finish_activity(activity).unwrap();
        assert_eq!(take_seen(), vec!["gone: cancelled, host destroyed".to_string()]);
        assert!(!dialog.has_pending());
    }

    #[test]
    fn test_dismiss_while_detached_still_cancels() {
        let (mut ui, activity, dialog) = setup();
        dialog.show(&mut ui, activity, "picker", answer("between")).unwrap();

        let mut saved = SavedState::new();
        dialog.on_save_instance_state(&ui, &mut saved).unwrap();
        dialog.on_destroy(&mut ui, false).unwrap();
        assert_eq!(dialog.activity(), None);

        dialog.on_dismiss(&mut ui).unwrap();
        assert_eq!(take_seen(), vec!["between: cancelled, dialog dismissed".to_string()]);
        assert!(!dialog.has_pending());
    }

    #[test]
    fn test_dispatch_before_show() {
        let (mut ui, _activity, dialog) = setup();
        assert!(matches!(
            dialog.dispatch_result(&mut ui, 1),
            Err(ScopeError::NotAttached)
        ));
    }
}
