//! # Simulated UI Host
//!
//! This crate provides a simulated implementation of the UI API.
//!
//! ## Purpose
//!
//! The simulated host allows testing continuation handling without a device:
//! - Runs under `cargo test`
//! - Deterministic (one UI queue, one worker queue, no real threads)
//! - Recreation on demand (configuration change, process death, finish)
//! - Inspectable (requests, unhandled results and callback failures are
//!   recorded)
//!
//! ## Philosophy
//!
//! **Testability is a first-class design constraint.**
//!
//! Continuations that survive process death are only trustworthy if process
//! death can be reproduced in a unit test. This is a full implementation of
//! the UI API that happens to run in-process.

pub mod test_utils;

use core_types::{ClassName, ContextId, FragmentId, RequestCode};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tracing::{debug, warn};
use ui_api::{
    ActivityResult, ContextInfo, ContextKind, DestroyObserver, DestroyTarget, Dispatch,
    FragmentCallbacks, FragmentFactory, FragmentInfo, FragmentSpec, GrantResult, Intent,
    SavedState, UiApi, UiError, UiTask, WorkerContext, WorkerTask,
};

/// Root class of every context
pub const CONTEXT_CLASS: &str = "Context";
/// Base class of activities
pub const ACTIVITY_CLASS: &str = "Activity";
/// Class of the application context
pub const APPLICATION_CLASS: &str = "Application";
/// Base class of fragments
pub const FRAGMENT_CLASS: &str = "Fragment";
/// Base class of dialog fragments
pub const DIALOG_FRAGMENT_CLASS: &str = "DialogFragment";

/// A sub-request waiting for the platform to answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformRequest {
    /// Fragment the result will be delivered to
    pub fragment: FragmentId,
    pub code: RequestCode,
    pub kind: RequestKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Activity(Intent),
    Permissions(Vec<String>),
}

/// Which callback a result was delivered through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Activity,
    Permissions,
}

/// A result that reached the host's default handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnhandledResult {
    /// Fragment that declined the result, or `None` when no request matched
    pub fragment: Option<FragmentId>,
    pub code: RequestCode,
    pub kind: ResultKind,
}

struct FragmentRecord {
    info: FragmentInfo,
    instance: Rc<dyn FragmentCallbacks>,
}

enum Transaction {
    Add(FragmentRecord),
    Remove(FragmentId),
}

/// Simulated UI host state
///
/// All state is directly accessible for testing.
pub struct SimulatedUi {
    application: ContextId,
    contexts: Vec<ContextInfo>,
    /// Class hierarchy: class -> superclass
    classes: HashMap<ClassName, Option<ClassName>>,
    /// Committed fragments, in insertion order
    fragments: Vec<FragmentRecord>,
    transactions: VecDeque<Transaction>,
    ui_queue: VecDeque<UiTask>,
    worker_queue: VecDeque<WorkerTask>,
    outstanding: Vec<PlatformRequest>,
    shown_dialogs: Vec<FragmentId>,
    factories: HashMap<ClassName, FragmentFactory>,
    unhandled: Vec<UnhandledResult>,
    callback_errors: Vec<UiError>,
    destroy_observers: Vec<(DestroyTarget, DestroyObserver)>,
}

impl SimulatedUi {
    /// Creates a host with an application context and the base classes
    pub fn new() -> Self {
        let mut classes = HashMap::new();
        classes.insert(ClassName::new(CONTEXT_CLASS), None);
        classes.insert(
            ClassName::new(ACTIVITY_CLASS),
            Some(ClassName::new(CONTEXT_CLASS)),
        );
        classes.insert(
            ClassName::new(APPLICATION_CLASS),
            Some(ClassName::new(CONTEXT_CLASS)),
        );
        classes.insert(ClassName::new(FRAGMENT_CLASS), None);
        classes.insert(
            ClassName::new(DIALOG_FRAGMENT_CLASS),
            Some(ClassName::new(FRAGMENT_CLASS)),
        );

        let application = ContextId::new();
        Self {
            application,
            contexts: vec![ContextInfo {
                id: application,
                kind: ContextKind::Application,
                class: ClassName::new(APPLICATION_CLASS),
            }],
            classes,
            fragments: Vec::new(),
            transactions: VecDeque::new(),
            ui_queue: VecDeque::new(),
            worker_queue: VecDeque::new(),
            outstanding: Vec::new(),
            shown_dialogs: Vec::new(),
            factories: HashMap::new(),
            unhandled: Vec::new(),
            callback_errors: Vec::new(),
            destroy_observers: Vec::new(),
        }
    }

    /// Declares `class` as a subclass of `parent`
    pub fn define_class(&mut self, class: &str, parent: &str) {
        self.classes
            .insert(ClassName::new(class), Some(ClassName::new(parent)));
    }

    /// Starts a new activity instance of `class`
    ///
    /// Unknown classes are declared as direct subclasses of `Activity`.
    pub fn launch_activity(&mut self, class: &str) -> ContextId {
        let class = ClassName::new(class);
        if !self.classes.contains_key(&class) {
            self.classes
                .insert(class.clone(), Some(ClassName::new(ACTIVITY_CLASS)));
        }
        let id = ContextId::new();
        debug!(context = %id, class = %class, "activity launched");
        self.contexts.push(ContextInfo {
            id,
            kind: ContextKind::Activity,
            class,
        });
        id
    }

    /// Destroys and recreates an activity, as on a configuration change
    ///
    /// Every hosted fragment saves its state and is destroyed
    /// non-permanently. Retained fragments keep their instance and handle;
    /// others are rebuilt through their factory (or keep the instance under
    /// a fresh handle when no factory is registered). Each fragment then
    /// receives `on_create` with the new context and its saved state.
    pub fn recreate_activity(&mut self, activity: ContextId) -> Result<ContextId, UiError> {
        self.execute_pending_transactions();
        let info = self
            .context_info(activity)
            .ok_or(UiError::UnknownContext(activity))?;

        let hosted = self.hosted_instances(activity);
        let mut saved = Vec::with_capacity(hosted.len());
        for (id, instance) in &hosted {
            let mut state = SavedState::new();
            instance.on_save_instance_state(&*self, &mut state)?;
            saved.push((*id, state));
        }
        for (_, instance) in &hosted {
            instance.on_destroy(self, false)?;
        }

        let recreated = ContextId::new();
        self.contexts.retain(|c| c.id != activity);
        self.contexts.push(ContextInfo {
            id: recreated,
            ..info
        });
        self.retarget_observers(DestroyTarget::Context(activity), DestroyTarget::Context(recreated));
        debug!(old = %activity, new = %recreated, "activity recreated");

        let mut created = Vec::with_capacity(saved.len());
        for (old_id, state) in saved {
            let Some(pos) = self.fragments.iter().position(|r| r.info.id == old_id) else {
                continue;
            };
            let retained = self.fragments[pos].info.retained;
            let new_id = if retained { old_id } else { FragmentId::new() };
            if !retained {
                if let Some(factory) = self.factories.get(&self.fragments[pos].info.class) {
                    self.fragments[pos].instance = factory();
                }
            }
            self.fragments[pos].info.host = recreated;
            self.fragments[pos].info.id = new_id;
            self.remap_fragment(old_id, new_id);
            created.push((new_id, self.fragments[pos].instance.clone(), state));
        }

        for (id, instance, state) in created {
            instance.on_create(self, id, recreated, Some(&state))?;
        }
        Ok(recreated)
    }

    /// Kills the process and restores it from saved state
    ///
    /// Every fragment saves its state, then all instances (retained ones
    /// included) are dropped and every context gets a new handle. Fragments
    /// are rebuilt only through registered factories; a fragment without a
    /// factory is lost together with the requests addressed to it. Pending
    /// UI and worker tasks die with the process.
    ///
    /// Returns `(old, new)` handle pairs for every activity.
    pub fn kill_process(&mut self) -> Result<Vec<(ContextId, ContextId)>, UiError> {
        self.execute_pending_transactions();

        let records: Vec<(FragmentInfo, Rc<dyn FragmentCallbacks>)> = self
            .fragments
            .iter()
            .map(|r| (r.info.clone(), r.instance.clone()))
            .collect();
        let mut saved = Vec::with_capacity(records.len());
        for (info, instance) in records {
            let mut state = SavedState::new();
            instance.on_save_instance_state(&*self, &mut state)?;
            saved.push((info, state));
        }

        self.fragments.clear();
        self.ui_queue.clear();
        self.worker_queue.clear();
        self.destroy_observers.clear();

        let mut mapping = Vec::new();
        for context in &mut self.contexts {
            let new_id = ContextId::new();
            if context.kind == ContextKind::Activity {
                mapping.push((context.id, new_id));
            } else {
                self.application = new_id;
            }
            context.id = new_id;
        }
        warn!(activities = mapping.len(), "process killed");

        let mut created = Vec::with_capacity(saved.len());
        for (info, state) in saved {
            let Some(factory) = self.factories.get(&info.class) else {
                warn!(class = %info.class, "no factory for fragment, dropped with the process");
                self.outstanding.retain(|r| r.fragment != info.id);
                self.shown_dialogs.retain(|d| *d != info.id);
                continue;
            };
            let instance = factory();
            let Some(&(_, host)) = mapping.iter().find(|(old, _)| *old == info.host) else {
                continue;
            };
            let new_id = FragmentId::new();
            self.remap_fragment(info.id, new_id);
            self.fragments.push(FragmentRecord {
                info: FragmentInfo {
                    id: new_id,
                    host,
                    ..info
                },
                instance: instance.clone(),
            });
            created.push((new_id, host, instance, state));
        }

        for (id, host, instance, state) in created {
            instance.on_create(self, id, host, Some(&state))?;
        }
        Ok(mapping)
    }

    /// Permanently destroys an activity and its fragments
    pub fn finish_activity(&mut self, activity: ContextId) -> Result<(), UiError> {
        self.execute_pending_transactions();
        if self.context_info(activity).is_none() {
            return Err(UiError::UnknownContext(activity));
        }

        let hosted = self.hosted_instances(activity);
        for (_, instance) in &hosted {
            instance.on_destroy(self, true)?;
        }
        for (id, _) in &hosted {
            self.outstanding.retain(|r| r.fragment != *id);
            self.shown_dialogs.retain(|d| d != id);
        }
        self.fragments.retain(|r| r.info.host != activity);
        self.contexts.retain(|c| c.id != activity);
        debug!(context = %activity, "activity finished");

        for (id, _) in &hosted {
            self.notify_destroyed(DestroyTarget::Fragment(*id));
        }
        self.notify_destroyed(DestroyTarget::Context(activity));
        Ok(())
    }

    /// Delivers an activity result to the fragment that issued `code`
    ///
    /// When no outstanding request matches, the result goes straight to
    /// the default handler.
    pub fn deliver_activity_result(
        &mut self,
        code: RequestCode,
        result: ActivityResult,
    ) -> Result<Dispatch, UiError> {
        let pos = self
            .outstanding
            .iter()
            .position(|r| r.code == code && matches!(r.kind, RequestKind::Activity(_)));
        match pos {
            Some(pos) => {
                let request = self.outstanding.remove(pos);
                self.deliver_activity_result_to(request.fragment, code, result)
            }
            None => {
                warn!(request_code = %code, "activity result without outstanding request");
                self.unhandled.push(UnhandledResult {
                    fragment: None,
                    code,
                    kind: ResultKind::Activity,
                });
                Ok(Dispatch::Unhandled)
            }
        }
    }

    /// Delivers an activity result to a specific fragment, bypassing the
    /// outstanding-request table
    pub fn deliver_activity_result_to(
        &mut self,
        fragment: FragmentId,
        code: RequestCode,
        result: ActivityResult,
    ) -> Result<Dispatch, UiError> {
        self.execute_pending_transactions();
        let instance = self
            .fragment_instance(fragment)
            .ok_or(UiError::UnknownFragment(fragment))?;
        let dispatch = instance.on_activity_result(self, code, result)?;
        if dispatch == Dispatch::Unhandled {
            self.unhandled.push(UnhandledResult {
                fragment: Some(fragment),
                code,
                kind: ResultKind::Activity,
            });
        }
        self.execute_pending_transactions();
        Ok(dispatch)
    }

    /// Delivers a permission grant to the fragment that issued `code`
    pub fn deliver_permissions_result(
        &mut self,
        code: RequestCode,
        grant: GrantResult,
    ) -> Result<Dispatch, UiError> {
        let pos = self
            .outstanding
            .iter()
            .position(|r| r.code == code && matches!(r.kind, RequestKind::Permissions(_)));
        match pos {
            Some(pos) => {
                let request = self.outstanding.remove(pos);
                self.deliver_permissions_result_to(request.fragment, code, grant)
            }
            None => {
                warn!(request_code = %code, "permission result without outstanding request");
                self.unhandled.push(UnhandledResult {
                    fragment: None,
                    code,
                    kind: ResultKind::Permissions,
                });
                Ok(Dispatch::Unhandled)
            }
        }
    }

    pub fn deliver_permissions_result_to(
        &mut self,
        fragment: FragmentId,
        code: RequestCode,
        grant: GrantResult,
    ) -> Result<Dispatch, UiError> {
        self.execute_pending_transactions();
        let instance = self
            .fragment_instance(fragment)
            .ok_or(UiError::UnknownFragment(fragment))?;
        let dispatch = instance.on_request_permissions_result(self, code, grant)?;
        if dispatch == Dispatch::Unhandled {
            self.unhandled.push(UnhandledResult {
                fragment: Some(fragment),
                code,
                kind: ResultKind::Permissions,
            });
        }
        self.execute_pending_transactions();
        Ok(dispatch)
    }

    /// Runs queued transactions, UI tasks and worker tasks until all queues
    /// are empty
    pub fn run_until_idle(&mut self) {
        loop {
            self.execute_pending_transactions();
            if let Some(task) = self.ui_queue.pop_front() {
                task(self);
                continue;
            }
            if let Some(task) = self.worker_queue.pop_front() {
                let mut worker = WorkerContext::new();
                task(&mut worker);
                self.ui_queue.extend(worker.into_ui_tasks());
                continue;
            }
            break;
        }
    }

    /// Checks if nothing is queued
    pub fn is_idle(&self) -> bool {
        self.transactions.is_empty() && self.ui_queue.is_empty() && self.worker_queue.is_empty()
    }

    /// Requests issued to the platform and not yet answered
    pub fn outstanding_requests(&self) -> &[PlatformRequest] {
        &self.outstanding
    }

    /// Results that reached the default handler
    pub fn unhandled_results(&self) -> &[UnhandledResult] {
        &self.unhandled
    }

    /// Failures reported by `on_create`/`on_destroy` during transactions
    pub fn callback_errors(&self) -> &[UiError] {
        &self.callback_errors
    }

    pub fn shown_dialogs(&self) -> &[FragmentId] {
        &self.shown_dialogs
    }

    /// Committed fragments hosted by `activity`, in insertion order
    pub fn fragments_of(&self, activity: ContextId) -> Vec<FragmentInfo> {
        self.fragments
            .iter()
            .filter(|r| r.info.host == activity)
            .map(|r| r.info.clone())
            .collect()
    }

    fn hosted_instances(&self, activity: ContextId) -> Vec<(FragmentId, Rc<dyn FragmentCallbacks>)> {
        self.fragments
            .iter()
            .filter(|r| r.info.host == activity)
            .map(|r| (r.info.id, r.instance.clone()))
            .collect()
    }

    fn remap_fragment(&mut self, old: FragmentId, new: FragmentId) {
        for request in &mut self.outstanding {
            if request.fragment == old {
                request.fragment = new;
            }
        }
        for dialog in &mut self.shown_dialogs {
            if *dialog == old {
                *dialog = new;
            }
        }
        self.retarget_observers(DestroyTarget::Fragment(old), DestroyTarget::Fragment(new));
    }

    fn retarget_observers(&mut self, old: DestroyTarget, new: DestroyTarget) {
        for (target, _) in &mut self.destroy_observers {
            if *target == old {
                *target = new;
            }
        }
    }

    /// Runs and forgets every observer of `target`
    fn notify_destroyed(&mut self, target: DestroyTarget) {
        let (fired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.destroy_observers)
            .into_iter()
            .partition(|(t, _)| *t == target);
        self.destroy_observers = kept;
        if !fired.is_empty() {
            debug!(entity = ?target, observers = fired.len(), "destroy observers notified");
        }
        for (_, observer) in fired {
            observer();
        }
    }

    /// Number of destroy observers still waiting
    pub fn destroy_observer_count(&self) -> usize {
        self.destroy_observers.len()
    }

    fn pending_add(&self, fragment: FragmentId) -> Option<&FragmentRecord> {
        self.transactions.iter().find_map(|tx| match tx {
            Transaction::Add(record) if record.info.id == fragment => Some(record),
            _ => None,
        })
    }

    fn committed(&self, fragment: FragmentId) -> Option<&FragmentRecord> {
        self.fragments.iter().find(|r| r.info.id == fragment)
    }

    fn tag_in_use(&self, host: ContextId, tag: &str) -> bool {
        let matches = |info: &FragmentInfo| info.host == host && info.tag.as_deref() == Some(tag);
        self.fragments.iter().any(|r| matches(&r.info))
            || self.transactions.iter().any(|tx| match tx {
                Transaction::Add(record) => matches(&record.info),
                Transaction::Remove(_) => false,
            })
    }
}

impl Default for SimulatedUi {
    fn default() -> Self {
        Self::new()
    }
}

impl UiApi for SimulatedUi {
    fn context_info(&self, context: ContextId) -> Option<ContextInfo> {
        self.contexts.iter().find(|c| c.id == context).cloned()
    }

    fn application_context(&self) -> ContextId {
        self.application
    }

    fn is_instance_of(&self, class: &ClassName, ancestor: &ClassName) -> bool {
        let mut current = Some(class.clone());
        while let Some(candidate) = current {
            if &candidate == ancestor {
                return true;
            }
            current = self.classes.get(&candidate).cloned().flatten();
        }
        false
    }

    fn add_fragment(
        &mut self,
        host: ContextId,
        spec: FragmentSpec,
        instance: Rc<dyn FragmentCallbacks>,
    ) -> Result<FragmentId, UiError> {
        if self.context_info(host).is_none() {
            return Err(UiError::UnknownContext(host));
        }
        if let Some(tag) = &spec.tag {
            if self.tag_in_use(host, tag) {
                return Err(UiError::DuplicateTag(tag.clone()));
            }
        }

        let class = instance.class();
        if !self.classes.contains_key(&class) {
            self.classes
                .insert(class.clone(), Some(ClassName::new(FRAGMENT_CLASS)));
        }
        let id = FragmentId::new();
        let info = FragmentInfo {
            id,
            host,
            class,
            tag: spec.tag,
            container_id: spec.container_id,
            retained: instance.retain_instance(),
        };
        self.transactions
            .push_back(Transaction::Add(FragmentRecord { info, instance }));
        Ok(id)
    }

    fn remove_fragment(&mut self, fragment: FragmentId) -> Result<(), UiError> {
        if self.committed(fragment).is_none() && self.pending_add(fragment).is_none() {
            return Err(UiError::UnknownFragment(fragment));
        }
        self.transactions.push_back(Transaction::Remove(fragment));
        Ok(())
    }

    fn execute_pending_transactions(&mut self) {
        while let Some(tx) = self.transactions.pop_front() {
            match tx {
                Transaction::Add(record) => {
                    let (id, host) = (record.info.id, record.info.host);
                    let instance = record.instance.clone();
                    self.fragments.push(record);
                    if let Err(err) = instance.on_create(self, id, host, None) {
                        self.callback_errors.push(err);
                    }
                }
                Transaction::Remove(id) => {
                    let Some(pos) = self.fragments.iter().position(|r| r.info.id == id) else {
                        continue;
                    };
                    let record = self.fragments.remove(pos);
                    self.shown_dialogs.retain(|d| *d != id);
                    self.outstanding.retain(|r| r.fragment != id);
                    if let Err(err) = record.instance.on_destroy(self, true) {
                        self.callback_errors.push(err);
                    }
                    self.notify_destroyed(DestroyTarget::Fragment(id));
                }
            }
        }
    }

    fn fragment_info(&self, fragment: FragmentId) -> Option<FragmentInfo> {
        self.committed(fragment)
            .or_else(|| self.pending_add(fragment))
            .map(|r| r.info.clone())
    }

    fn fragment_instance(&self, fragment: FragmentId) -> Option<Rc<dyn FragmentCallbacks>> {
        self.committed(fragment)
            .or_else(|| self.pending_add(fragment))
            .map(|r| r.instance.clone())
    }

    fn find_fragment_by_tag(&self, host: ContextId, tag: &str) -> Option<FragmentId> {
        self.fragments
            .iter()
            .find(|r| r.info.host == host && r.info.tag.as_deref() == Some(tag))
            .map(|r| r.info.id)
    }

    fn find_fragment_by_id(&self, host: ContextId, container_id: u32) -> Option<FragmentId> {
        self.fragments
            .iter()
            .find(|r| r.info.host == host && r.info.container_id == Some(container_id))
            .map(|r| r.info.id)
    }

    fn start_activity_for_result(
        &mut self,
        from: FragmentId,
        intent: Intent,
        code: RequestCode,
    ) -> Result<(), UiError> {
        if self.fragment_info(from).is_none() {
            return Err(UiError::UnknownFragment(from));
        }
        debug!(request_code = %code, action = %intent.action, "activity requested");
        self.outstanding.push(PlatformRequest {
            fragment: from,
            code,
            kind: RequestKind::Activity(intent),
        });
        Ok(())
    }

    fn request_permissions(
        &mut self,
        from: FragmentId,
        permissions: Vec<String>,
        code: RequestCode,
    ) -> Result<(), UiError> {
        if self.fragment_info(from).is_none() {
            return Err(UiError::UnknownFragment(from));
        }
        if permissions.is_empty() {
            return Err(UiError::RequestRejected(
                "no permissions requested".to_string(),
            ));
        }
        debug!(request_code = %code, count = permissions.len(), "permissions requested");
        self.outstanding.push(PlatformRequest {
            fragment: from,
            code,
            kind: RequestKind::Permissions(permissions),
        });
        Ok(())
    }

    fn show_dialog(&mut self, dialog: FragmentId) -> Result<(), UiError> {
        if self.fragment_info(dialog).is_none() {
            return Err(UiError::UnknownFragment(dialog));
        }
        if !self.shown_dialogs.contains(&dialog) {
            self.shown_dialogs.push(dialog);
        }
        Ok(())
    }

    fn dismiss_dialog(&mut self, dialog: FragmentId) -> Result<(), UiError> {
        self.execute_pending_transactions();
        if !self.shown_dialogs.contains(&dialog) {
            return Err(UiError::UnknownFragment(dialog));
        }
        let instance = self
            .fragment_instance(dialog)
            .ok_or(UiError::UnknownFragment(dialog))?;
        self.shown_dialogs.retain(|d| *d != dialog);
        instance.on_dismiss(self)?;
        self.remove_fragment(dialog)?;
        self.execute_pending_transactions();
        Ok(())
    }

    fn run_on_ui_thread(&mut self, task: UiTask) {
        self.ui_queue.push_back(task);
    }

    fn spawn_worker(&mut self, task: WorkerTask) {
        self.worker_queue.push_back(task);
    }

    fn register_fragment_factory(&mut self, class: ClassName, factory: FragmentFactory) {
        self.factories.insert(class, factory);
    }

    fn observe_destroy(
        &mut self,
        target: DestroyTarget,
        observer: DestroyObserver,
    ) -> Result<(), UiError> {
        match target {
            DestroyTarget::Context(id) if self.context_info(id).is_none() => {
                return Err(UiError::UnknownContext(id));
            }
            DestroyTarget::Fragment(id) if self.fragment_info(id).is_none() => {
                return Err(UiError::UnknownFragment(id));
            }
            _ => {}
        }
        self.destroy_observers.push((target, observer));
        Ok(())
    }
}
