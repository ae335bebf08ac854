//! The scope element carried by child computations

use core_types::{ContextId, FragmentId};
use serde::{Deserialize, Serialize};
use std::fmt;
use ui_api::{ContextKind, UiApi};

/// How a fragment is found again inside its activity
///
/// Fragment handles do not survive recreation, so scopes keep the stable
/// part of a fragment's identity and re-resolve it on every use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmentLocator {
    ByTag(String),
    ById(u32),
}

impl FragmentLocator {
    /// Resolves the locator among the committed fragments of `activity`
    pub fn resolve(&self, host: &dyn UiApi, activity: ContextId) -> Option<FragmentId> {
        match self {
            FragmentLocator::ByTag(tag) => host.find_fragment_by_tag(activity, tag),
            FragmentLocator::ById(id) => host.find_fragment_by_id(activity, *id),
        }
    }
}

impl fmt::Display for FragmentLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentLocator::ByTag(tag) => write!(f, "tag {:?}", tag),
            FragmentLocator::ById(id) => write!(f, "container id {}", id),
        }
    }
}

/// Activity, and optionally fragment, a computation is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBinding {
    activity: ContextId,
    fragment: Option<FragmentLocator>,
}

impl ContextBinding {
    pub fn for_activity(activity: ContextId) -> Self {
        Self {
            activity,
            fragment: None,
        }
    }

    pub fn for_fragment(activity: ContextId, locator: FragmentLocator) -> Self {
        Self {
            activity,
            fragment: Some(locator),
        }
    }

    pub fn activity(&self) -> ContextId {
        self.activity
    }

    pub fn locator(&self) -> Option<&FragmentLocator> {
        self.fragment.as_ref()
    }

    /// Same binding, pointing at the activity that replaced the old one
    pub fn rebind(&self, activity: ContextId) -> Self {
        Self {
            activity,
            fragment: self.fragment.clone(),
        }
    }

    /// Whether the bound activity is still alive
    pub fn is_live(&self, host: &dyn UiApi) -> bool {
        host.context_info(self.activity)
            .is_some_and(|info| info.kind == ContextKind::Activity)
    }

    /// Resolves the bound fragment, if the binding names one
    pub fn resolve_fragment(&self, host: &dyn UiApi) -> Option<FragmentId> {
        self.fragment
            .as_ref()
            .and_then(|locator| locator.resolve(host, self.activity))
    }
}
