//! Fragment scope

use crate::{
    ActivityScope, ContextBinding, FragmentLocator, Job, JobContext, ScopeError, ScopeHandlers,
};
use core_types::{ContextId, FragmentId, RequestCode};
use lifecycle::Outcome;
use parcelable_continuation::Resumable;
use ui_api::{DestroyTarget, GrantResult, Intent, UiApi};

/// Suspendable operations on behalf of one fragment
///
/// The fragment is kept as a locator, not a handle, and resolved again on
/// every call. Requests are delegated to the scope of the hosting activity.
/// The root job ends when either the fragment or its activity is
/// permanently destroyed.
pub struct FragmentScope {
    parent: ActivityScope,
    locator: FragmentLocator,
}

impl FragmentScope {
    /// Scope for the fragment tagged `tag` in `activity`
    pub fn from_tag(
        host: &mut dyn UiApi,
        activity: ContextId,
        tag: impl Into<String>,
        handlers: ScopeHandlers,
    ) -> Result<Self, ScopeError> {
        Self::locate(host, activity, FragmentLocator::ByTag(tag.into()), handlers)
    }

    /// Scope for the fragment placed in container `container_id`
    pub fn from_id(
        host: &mut dyn UiApi,
        activity: ContextId,
        container_id: u32,
        handlers: ScopeHandlers,
    ) -> Result<Self, ScopeError> {
        Self::locate(host, activity, FragmentLocator::ById(container_id), handlers)
    }

    fn locate(
        host: &mut dyn UiApi,
        activity: ContextId,
        locator: FragmentLocator,
        handlers: ScopeHandlers,
    ) -> Result<Self, ScopeError> {
        let scope = Self {
            parent: ActivityScope::new(host, activity, handlers)?,
            locator,
        };
        scope.observe_fragment(host)?;
        Ok(scope)
    }

    fn observe_fragment(&self, host: &mut dyn UiApi) -> Result<(), ScopeError> {
        let fragment = self.fragment(&*host)?;
        self.job()
            .cancel_on_destroy(host, DestroyTarget::Fragment(fragment))?;
        Ok(())
    }

    pub fn locator(&self) -> &FragmentLocator {
        &self.locator
    }

    pub fn activity(&self) -> ContextId {
        self.parent.activity()
    }

    /// Scope of the hosting activity
    pub fn activity_scope(&self) -> &ActivityScope {
        &self.parent
    }

    pub fn binding(&self) -> ContextBinding {
        ContextBinding::for_fragment(self.activity(), self.locator.clone())
    }

    pub fn job(&self) -> &Job {
        self.parent.job()
    }

    /// Resolves the fragment in its current activity
    pub fn fragment(&self, host: &dyn UiApi) -> Result<FragmentId, ScopeError> {
        self.parent.ensure_live(host)?;
        self.locator
            .resolve(host, self.activity())
            .ok_or_else(|| ScopeError::FragmentNotFound(self.locator.clone()))
    }

    /// Launches `body` as a child job bound to this fragment
    pub fn launch<F>(&self, host: &mut dyn UiApi, body: F) -> Job
    where
        F: FnOnce(&mut JobContext<'_>) + 'static,
    {
        self.parent.launch_bound(host, self.binding(), body)
    }

    pub fn start_activity_for_result(
        &self,
        host: &mut dyn UiApi,
        intent: Intent,
        handler: Box<dyn Resumable<Outcome<Option<Intent>>>>,
    ) -> Result<RequestCode, ScopeError> {
        self.fragment(&*host)?;
        self.parent.start_activity_for_result(host, intent, handler)
    }

    pub fn request_permissions(
        &self,
        host: &mut dyn UiApi,
        permissions: Vec<String>,
        handler: Box<dyn Resumable<Outcome<Option<GrantResult>>>>,
    ) -> Result<RequestCode, ScopeError> {
        self.fragment(&*host)?;
        self.parent.request_permissions(host, permissions, handler)
    }

    /// Follows the fragment into the activity that replaced the old one
    pub fn rebind(&mut self, host: &mut dyn UiApi, activity: ContextId) -> Result<(), ScopeError> {
        self.parent.rebind(host, activity)?;
        self.observe_fragment(host)
    }
}
