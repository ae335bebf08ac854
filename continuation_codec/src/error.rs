//! Codec error types

use core_types::ClassName;
use thiserror::Error;

/// Errors raised while encoding or decoding captured continuation state
#[derive(Debug, Error)]
pub enum CodecError {
    /// A reference resolved to an entity of the wrong class
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: ClassName, found: ClassName },

    /// The value cannot be persisted (or a persisted form cannot be read)
    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),

    /// A persisted reference has no live counterpart
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// The operation needs a context but the codec has none
    #[error("No context available to {0}")]
    MissingContext(&'static str),

    /// No restore function is registered under the handler tag
    #[error("Unknown handler: {0}")]
    UnknownHandler(String),

    /// The blob was written by an incompatible format version
    #[error("Unsupported format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// The blob is not valid JSON of the expected layout
    #[error("Malformed blob: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Captured state does not have the shape a handler expects
    #[error("Unexpected shape: {0}")]
    Shape(String),
}
