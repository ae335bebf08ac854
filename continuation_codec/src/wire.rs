//! Persisted form of captured state
//!
//! UI references never appear as handles on the wire: a context is written
//! as its relation to the writing context, a fragment as the key its
//! fragment manager can find it by.

use crate::SuspensionMarker;
use core_types::ClassName;
use serde::{Deserialize, Serialize};

/// Current blob layout version
pub const FORMAT_VERSION: u32 = 1;

/// Persisted context reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextRef {
    /// The context the continuation was attached to when written
    SelfContext { class: ClassName },
    /// The process-wide application context
    Application,
    /// Any other context; reserved, never written
    Other,
}

/// Persisted fragment reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentRef {
    ById { class: ClassName, id: u32 },
    ByTag { class: ClassName, tag: String },
    /// The fragment had neither container id nor tag; it reads back as null
    WithoutHandle { class: ClassName },
}

/// One persisted value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wire {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Wire>),
    Record {
        type_name: String,
        fields: Vec<(String, Wire)>,
    },
    CurrentContext,
    Singleton(String),
    Context(ContextRef),
    Fragment(FragmentRef),
    Suspension(SuspensionMarker),
}

/// Top-level blob: which handler to restore and the state to restore it from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blob {
    pub version: u32,
    pub handler: String,
    pub state: Wire,
}

/// Version header read before the rest of the blob
#[derive(Debug, Deserialize)]
pub(crate) struct BlobHeader {
    pub version: u32,
}
