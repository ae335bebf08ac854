//! Values exchanged across the UI host boundary

use core_types::{ClassName, ContextId, FragmentId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of a UI context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextKind {
    /// A screen-level entity with its own fragment manager
    Activity,
    /// The process-wide application context
    Application,
}

/// What the host knows about a live context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextInfo {
    pub id: ContextId,
    pub kind: ContextKind,
    pub class: ClassName,
}

/// What the host knows about a live fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentInfo {
    pub id: FragmentId,
    /// Context whose fragment manager holds this fragment
    pub host: ContextId,
    pub class: ClassName,
    pub tag: Option<String>,
    /// Numeric container id, if the fragment was added to a container
    pub container_id: Option<u32>,
    /// Whether the instance survives recreation of its host
    pub retained: bool,
}

/// An entity whose permanent destruction can be observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyTarget {
    Context(ContextId),
    Fragment(FragmentId),
}

/// Placement of a fragment being added to a fragment manager
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FragmentSpec {
    pub tag: Option<String>,
    pub container_id: Option<u32>,
}

impl FragmentSpec {
    /// Places the fragment under a tag
    pub fn tagged(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            container_id: None,
        }
    }

    /// Places the fragment in a numbered container
    pub fn in_container(container_id: u32) -> Self {
        Self {
            tag: None,
            container_id: Some(container_id),
        }
    }
}

/// Description of a sub-activity to start
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Intent {
    pub action: String,
    pub extras: BTreeMap<String, String>,
}

impl Intent {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            extras: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras.get(key).map(String::as_str)
    }
}

/// Result code reported by a finished sub-activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultCode(pub i32);

impl ResultCode {
    pub const OK: ResultCode = ResultCode(-1);
    pub const CANCELED: ResultCode = ResultCode(0);
    pub const FIRST_USER: ResultCode = ResultCode(1);
}

/// Result delivered for a `start_activity_for_result` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityResult {
    pub result_code: ResultCode,
    pub data: Option<Intent>,
}

impl ActivityResult {
    pub fn ok(data: Option<Intent>) -> Self {
        Self {
            result_code: ResultCode::OK,
            data,
        }
    }

    pub fn canceled() -> Self {
        Self {
            result_code: ResultCode::CANCELED,
            data: None,
        }
    }
}

/// Outcome of a single permission in a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantCode {
    Granted,
    Denied,
}

/// Result of a permission request
///
/// Permission names are paired 1:1 with their grant codes, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GrantResult {
    entries: Vec<(String, GrantCode)>,
}

impl GrantResult {
    pub fn new(entries: Vec<(String, GrantCode)>) -> Self {
        Self { entries }
    }

    /// Builds a result from two parallel sequences
    ///
    /// Returns `None` when the sequences differ in length.
    pub fn from_parallel(permissions: Vec<String>, grant_results: Vec<GrantCode>) -> Option<Self> {
        if permissions.len() != grant_results.len() {
            return None;
        }
        Some(Self::new(permissions.into_iter().zip(grant_results).collect()))
    }

    pub fn permissions(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn grant_results(&self) -> impl Iterator<Item = GrantCode> + '_ {
        self.entries.iter().map(|(_, code)| *code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `permission` was requested and granted
    pub fn was_granted(&self, permission: &str) -> bool {
        self.entries
            .iter()
            .any(|(name, code)| name == permission && *code == GrantCode::Granted)
    }

    /// Whether every requested permission was granted
    pub fn all_granted(&self) -> bool {
        self.entries
            .iter()
            .all(|(_, code)| *code == GrantCode::Granted)
    }

    /// Whether every requested permission was denied
    pub fn all_denied(&self) -> bool {
        self.entries
            .iter()
            .all(|(_, code)| *code == GrantCode::Denied)
    }
}

/// Small persisted state blob handed to an entity across recreation
///
/// Named byte slots with stable ordering.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SavedState {
    slots: BTreeMap<String, Vec<u8>>,
}

impl SavedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, bytes: Vec<u8>) {
        self.slots.insert(key.into(), bytes);
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.slots.get(key).map(Vec::as_slice)
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<u8>> {
        self.slots.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
