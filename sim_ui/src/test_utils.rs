//! Test utilities for continuation testing
//!
//! This module provides helper functions and a do-nothing fragment for
//! writing host-level tests.

use crate::SimulatedUi;
use core_types::{ClassName, ContextId, FragmentId};
use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;
use ui_api::{FragmentCallbacks, SavedState, UiApi, UiError};

/// Creates a host with one launched activity of class `activity_class`
pub fn bootstrap(activity_class: &str) -> (SimulatedUi, ContextId) {
    let mut ui = SimulatedUi::new();
    let activity = ui.launch_activity(activity_class);
    (ui, activity)
}

/// A fragment that declines every result and counts its lifecycle calls
pub struct PlainFragment {
    class: ClassName,
    retained: bool,
    created: Cell<usize>,
    destroyed_permanently: Cell<usize>,
    last_activity: Cell<Option<ContextId>>,
    last_handle: Cell<Option<FragmentId>>,
}

impl PlainFragment {
    pub fn new(class: &str) -> Rc<Self> {
        Rc::new(Self::with_retain(class, false))
    }

    /// A fragment whose instance survives recreation of its host
    pub fn retained(class: &str) -> Rc<Self> {
        Rc::new(Self::with_retain(class, true))
    }

    fn with_retain(class: &str, retained: bool) -> Self {
        Self {
            class: ClassName::new(class),
            retained,
            created: Cell::new(0),
            destroyed_permanently: Cell::new(0),
            last_activity: Cell::new(None),
            last_handle: Cell::new(None),
        }
    }

    /// Number of `on_create` calls received
    pub fn created(&self) -> usize {
        self.created.get()
    }

    pub fn destroyed_permanently(&self) -> usize {
        self.destroyed_permanently.get()
    }

    /// Context passed to the latest `on_create`
    pub fn last_activity(&self) -> Option<ContextId> {
        self.last_activity.get()
    }

    /// Handle passed to the latest `on_create`
    pub fn last_handle(&self) -> Option<FragmentId> {
        self.last_handle.get()
    }
}

impl FragmentCallbacks for PlainFragment {
    fn class(&self) -> ClassName {
        self.class.clone()
    }

    fn retain_instance(&self) -> bool {
        self.retained
    }

    fn on_create(
        &self,
        _host: &mut dyn UiApi,
        fragment: FragmentId,
        activity: ContextId,
        _saved: Option<&SavedState>,
    ) -> Result<(), UiError> {
        self.created.set(self.created.get() + 1);
        self.last_activity.set(Some(activity));
        self.last_handle.set(Some(fragment));
        Ok(())
    }

    fn on_destroy(&self, _host: &mut dyn UiApi, permanent: bool) -> Result<(), UiError> {
        if permanent {
            self.destroyed_permanently
                .set(self.destroyed_permanently.get() + 1);
        }
        Ok(())
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}
