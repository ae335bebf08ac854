//! In-memory form of a suspended computation's captured state

use crate::CodecError;
use core_types::{ContextId, FragmentId};
use serde::{Deserialize, Serialize};

/// Suspension bookkeeping values a state machine may capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuspensionMarker {
    /// The computation is waiting for a result
    Suspended,
    /// A result was delivered but not yet consumed
    Resumed,
    /// The computation has not decided whether it will suspend
    Undecided,
}

/// A value captured by a suspended computation
///
/// UI entities are captured as handles (`Context`, `Fragment`) or as the
/// `CurrentContext` marker; the codec decides how each is persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum Captured {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Captured>),
    Record(CapturedRecord),
    /// Placeholder for whatever context the continuation is attached to
    CurrentContext,
    /// A stateless, process-wide value identified by name
    Singleton(String),
    Context(ContextId),
    Fragment(FragmentId),
    Suspension(SuspensionMarker),
}

impl Captured {
    /// Short name of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Captured::Null => "null",
            Captured::Bool(_) => "bool",
            Captured::Int(_) => "int",
            Captured::Str(_) => "string",
            Captured::Bytes(_) => "bytes",
            Captured::List(_) => "list",
            Captured::Record(_) => "record",
            Captured::CurrentContext => "current context",
            Captured::Singleton(_) => "singleton",
            Captured::Context(_) => "context",
            Captured::Fragment(_) => "fragment",
            Captured::Suspension(_) => "suspension marker",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Captured::Null)
    }

    pub fn as_bool(&self) -> Result<bool, CodecError> {
        match self {
            Captured::Bool(value) => Ok(*value),
            other => Err(shape("bool", other)),
        }
    }

    pub fn as_int(&self) -> Result<i64, CodecError> {
        match self {
            Captured::Int(value) => Ok(*value),
            other => Err(shape("int", other)),
        }
    }

    pub fn as_str(&self) -> Result<&str, CodecError> {
        match self {
            Captured::Str(value) => Ok(value),
            other => Err(shape("string", other)),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], CodecError> {
        match self {
            Captured::Bytes(value) => Ok(value),
            other => Err(shape("bytes", other)),
        }
    }

    pub fn as_list(&self) -> Result<&[Captured], CodecError> {
        match self {
            Captured::List(items) => Ok(items),
            other => Err(shape("list", other)),
        }
    }

    pub fn as_record(&self) -> Result<&CapturedRecord, CodecError> {
        match self {
            Captured::Record(record) => Ok(record),
            other => Err(shape("record", other)),
        }
    }

    pub fn as_context(&self) -> Result<ContextId, CodecError> {
        match self {
            Captured::Context(id) => Ok(*id),
            other => Err(shape("context", other)),
        }
    }

    /// A fragment handle, or `None` for a fragment that was persisted
    /// without a handle and decoded as `Null`
    pub fn as_fragment(&self) -> Result<Option<FragmentId>, CodecError> {
        match self {
            Captured::Fragment(id) => Ok(Some(*id)),
            Captured::Null => Ok(None),
            other => Err(shape("fragment", other)),
        }
    }
}

fn shape(expected: &str, found: &Captured) -> CodecError {
    CodecError::Shape(format!("expected {}, found {}", expected, found.kind()))
}

/// A named record of captured fields, kept in declaration order
///
/// Field names are free-form; compiler-style synthetic names (leading `$`)
/// are persisted like any other.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedRecord {
    type_name: String,
    fields: Vec<(String, Captured)>,
}

impl CapturedRecord {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Captured>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &[(String, Captured)] {
        &self.fields
    }

    /// Looks up a field by name
    pub fn field(&self, name: &str) -> Result<&Captured, CodecError> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
            .ok_or_else(|| {
                CodecError::Shape(format!("{} has no field {}", self.type_name, name))
            })
    }

    /// Checks the record was captured from `type_name`
    pub fn expect_type(&self, type_name: &str) -> Result<&Self, CodecError> {
        if self.type_name == type_name {
            Ok(self)
        } else {
            Err(CodecError::Shape(format!(
                "expected record {}, found {}",
                type_name, self.type_name
            )))
        }
    }

    pub(crate) fn from_parts(type_name: String, fields: Vec<(String, Captured)>) -> Self {
        Self { type_name, fields }
    }
}

impl From<bool> for Captured {
    fn from(value: bool) -> Self {
        Captured::Bool(value)
    }
}

impl From<i64> for Captured {
    fn from(value: i64) -> Self {
        Captured::Int(value)
    }
}

impl From<i32> for Captured {
    fn from(value: i32) -> Self {
        Captured::Int(i64::from(value))
    }
}

impl From<u32> for Captured {
    fn from(value: u32) -> Self {
        Captured::Int(i64::from(value))
    }
}

impl From<String> for Captured {
    fn from(value: String) -> Self {
        Captured::Str(value)
    }
}

impl From<&str> for Captured {
    fn from(value: &str) -> Self {
        Captured::Str(value.to_string())
    }
}

impl From<Vec<u8>> for Captured {
    fn from(value: Vec<u8>) -> Self {
        Captured::Bytes(value)
    }
}

impl From<Vec<Captured>> for Captured {
    fn from(items: Vec<Captured>) -> Self {
        Captured::List(items)
    }
}

impl From<CapturedRecord> for Captured {
    fn from(record: CapturedRecord) -> Self {
        Captured::Record(record)
    }
}

impl From<ContextId> for Captured {
    fn from(id: ContextId) -> Self {
        Captured::Context(id)
    }
}

impl From<FragmentId> for Captured {
    fn from(id: FragmentId) -> Self {
        Captured::Fragment(id)
    }
}

impl From<SuspensionMarker> for Captured {
    fn from(marker: SuspensionMarker) -> Self {
        Captured::Suspension(marker)
    }
}

impl<T: Into<Captured>> From<Option<T>> for Captured {
    fn from(value: Option<T>) -> Self {
        value.map_or(Captured::Null, Into::into)
    }
}
