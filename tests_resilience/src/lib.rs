//! Resilience Test Utilities
//!
//! This crate provides shared utilities for recreation, process-death and
//! result-dispatch tests.
//!
//! ## Test Philosophy
//!
//! - **Requests outlive their screen**: a pending result reaches its caller
//!   after recreation and after process death
//! - **Deterministic lifecycle**: every recreation, kill and delivery is
//!   driven explicitly through `SimulatedUi`
//! - **Exactly once**: every delivered result resumes one continuation, once

use continuation_codec::{Captured, CapturedRecord, CodecError};
use core_types::{ContextId, FragmentId};
use lifecycle::Outcome;
use parcelable_continuation::{CallbackHandler, OutcomeHandler, ResumeContext, Resumable};
use retained_holder::{ActivityResultPayload, Handlers, HolderConfig, PermissionPayload};
use scope_wrapper::{install, ScopeHandlers};
use sim_ui::test_utils::PlainFragment;
use sim_ui::{SimulatedUi, ACTIVITY_CLASS};
use std::cell::RefCell;
use std::rc::Rc;
use ui_api::{FragmentCallbacks, FragmentSpec, GrantResult, Intent, UiApi, UiError};

/// Activity class every bootstrap launches
pub const MAIN_ACTIVITY: &str = "MainActivity";

/// Tag of the fragment added by [`add_preview_fragment`]
pub const PREVIEW_TAG: &str = "preview";

const PREVIEW_CLASS: &str = "PreviewFragment";

thread_local! {
    static JOURNAL: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

/// Drains everything handlers recorded on this thread
pub fn take_journal() -> Vec<String> {
    JOURNAL.with(|journal| journal.take())
}

fn write_journal(entry: String) {
    JOURNAL.with(|journal| journal.borrow_mut().push(entry));
}

fn describe<T>(outcome: &Outcome<T>, ok: impl FnOnce(&T) -> String) -> String {
    match outcome {
        Outcome::Ok(value) => ok(value),
        Outcome::Cancelled => "cancelled".to_string(),
        Outcome::Error(failure) => format!("error {}", failure.message),
    }
}

fn journal_activity(_cx: &mut ResumeContext<'_>, args: &Captured, outcome: Outcome<Option<Intent>>) {
    let label = args.as_str().unwrap_or("?");
    let detail = describe(&outcome, |data| match data {
        Some(intent) => format!("ok {}", intent.action),
        None => "ok".to_string(),
    });
    write_journal(format!("{}: {}", label, detail));
}

fn journal_permissions(
    _cx: &mut ResumeContext<'_>,
    args: &Captured,
    outcome: Outcome<Option<GrantResult>>,
) {
    let label = args.as_str().unwrap_or("?");
    let detail = describe(&outcome, |grant| match grant {
        Some(grant) => format!("granted {}", grant.permissions().collect::<Vec<_>>().join(",")),
        None => "denied".to_string(),
    });
    write_journal(format!("{}: {}", label, detail));
}

/// A step of a multi-screen flow
///
/// Captures the activity that started it, a fragment of that activity and a
/// step counter. On resumption it records whether both references were
/// rebound to live entities of the resuming activity.
pub struct CropFlow {
    owner: ContextId,
    preview: Option<FragmentId>,
    step: i64,
}

impl CropFlow {
    pub const TAG: &'static str = "crop_flow";

    pub fn new(owner: ContextId, preview: Option<FragmentId>, step: i64) -> Self {
        Self {
            owner,
            preview,
            step,
        }
    }

    fn restore(state: &Captured) -> Result<Box<dyn Resumable<Outcome<Option<Intent>>>>, CodecError> {
        let record = state.as_record()?.expect_type("CropFlow")?;
        Ok(Box::new(CropFlow {
            owner: record.field("owner")?.as_context()?,
            preview: record.field("preview")?.as_fragment()?,
            step: record.field("step")?.as_int()?,
        }))
    }
}

impl OutcomeHandler<Option<Intent>> for CropFlow {
    fn type_tag(&self) -> &'static str {
        Self::TAG
    }

    fn capture(&self) -> Captured {
        let preview = match self.preview {
            Some(fragment) => Captured::Fragment(fragment),
            None => Captured::Null,
        };
        CapturedRecord::new("CropFlow")
            .with("owner", self.owner)
            .with("preview", preview)
            .with("step", self.step)
            .into()
    }

    fn on_outcome(self: Box<Self>, cx: &mut ResumeContext<'_>, outcome: Outcome<Option<Intent>>) {
        let context = cx.context();
        let owner_current = self.owner == context;
        let preview_live = self.preview.is_some_and(|fragment| {
            cx.host()
                .fragment_info(fragment)
                .is_some_and(|info| info.host == context)
        });
        let detail = describe(&outcome, |_| "ok".to_string());
        write_journal(format!(
            "crop step {}: {}, owner current {}, preview live {}",
            self.step, detail, owner_current, preview_live
        ));
    }
}

/// Handler registries used by every scenario
pub fn scope_handlers() -> ScopeHandlers {
    let mut activity = Handlers::<ActivityResultPayload>::new();
    activity.register_callback("journal_activity", journal_activity);
    activity.register(CropFlow::TAG, CropFlow::restore);
    let mut permissions = Handlers::<PermissionPayload>::new();
    permissions.register_callback("journal_permissions", journal_permissions);
    ScopeHandlers::new(HolderConfig::default(), activity, permissions)
}

/// Bootstrap helper for tests
///
/// Creates a host with one `MainActivity` (a subclass of `BaseActivity`)
/// and the holder factories installed.
pub fn test_bootstrap() -> (SimulatedUi, ContextId, ScopeHandlers) {
    let mut ui = SimulatedUi::new();
    ui.define_class("BaseActivity", ACTIVITY_CLASS);
    ui.define_class(MAIN_ACTIVITY, "BaseActivity");
    let activity = ui.launch_activity(MAIN_ACTIVITY);
    let handlers = scope_handlers();
    install(&mut ui, &handlers);
    (ui, activity, handlers)
}

/// Adds a tagged fragment that is rebuilt after process death
pub fn add_preview_fragment(ui: &mut SimulatedUi, activity: ContextId) -> Result<FragmentId, UiError> {
    ui.register_fragment_factory(
        PREVIEW_CLASS.into(),
        Box::new(|| -> Rc<dyn FragmentCallbacks> { PlainFragment::new(PREVIEW_CLASS) }),
    );
    let fragment = ui.add_fragment(
        activity,
        FragmentSpec::tagged(PREVIEW_TAG),
        PlainFragment::new(PREVIEW_CLASS),
    )?;
    ui.execute_pending_transactions();
    Ok(fragment)
}

/// New handle of `old` in a process-death mapping
pub fn restored(mapping: &[(ContextId, ContextId)], old: ContextId) -> Option<ContextId> {
    let new = old.follow(mapping);
    (new != old).then_some(new)
}

/// Activity-result handler that journals `"{label}: {outcome}"`
pub fn activity_request(label: &str) -> Box<dyn Resumable<Outcome<Option<Intent>>>> {
    Box::new(CallbackHandler::new("journal_activity", journal_activity, label))
}

/// Permission handler that journals `"{label}: {outcome}"`
pub fn permission_request(label: &str) -> Box<dyn Resumable<Outcome<Option<GrantResult>>>> {
    Box::new(CallbackHandler::new(
        "journal_permissions",
        journal_permissions,
        label,
    ))
}

pub fn crop_flow(
    owner: ContextId,
    preview: Option<FragmentId>,
    step: i64,
) -> Box<dyn Resumable<Outcome<Option<Intent>>>> {
    Box::new(CropFlow::new(owner, preview, step))
}
