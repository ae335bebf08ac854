//! # Continuation Codec
//!
//! This crate turns the captured state of a suspended computation into a
//! relocatable byte blob and back.
//!
//! ## Philosophy
//!
//! - **No live references on disk**: contexts and fragments are written as
//!   relations ("the context I was attached to", "the fragment tagged X")
//!   and re-resolved against whatever context the blob is read with
//! - **Refuse what cannot be rebound**: a context that is neither the
//!   attached one nor the application context is an encode error, not a
//!   silently stale handle
//! - **No global codec**: every codec is built by [`codec_for`] for one
//!   (host, context) pair and dropped after use
//!
//! ## Example
//!
//! ```ignore
//! let codec = codec_for(&ui, Some(activity));
//! let bytes = codec.encode("counter", &state)?;
//!
//! let codec = codec_for(&ui, Some(recreated));
//! let (handler, state) = codec.decode(&bytes)?;
//! ```

pub mod captured;
pub mod error;
mod rules;
pub mod wire;

pub use captured::{Captured, CapturedRecord, SuspensionMarker};
pub use error::CodecError;
pub use wire::{Blob, ContextRef, FragmentRef, Wire, FORMAT_VERSION};

use core_types::ContextId;
use rules::RULES;
use std::collections::BTreeSet;
use tracing::{debug, trace};
use ui_api::UiApi;
use wire::BlobHeader;

/// Encoder/decoder bound to one host and (optionally) one context
///
/// A codec without a context is used to persist continuations that are not
/// attached anywhere; it refuses every value that needs a context.
pub struct ContinuationCodec<'h> {
    host: &'h dyn UiApi,
    context: Option<ContextId>,
    singletons: BTreeSet<String>,
}

/// Builds a codec for `context`
pub fn codec_for(host: &dyn UiApi, context: Option<ContextId>) -> ContinuationCodec<'_> {
    ContinuationCodec {
        host,
        context,
        singletons: BTreeSet::new(),
    }
}

impl<'h> ContinuationCodec<'h> {
    /// Adds names of singletons this codec may restore
    pub fn with_singletons<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.singletons.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn host(&self) -> &'h dyn UiApi {
        self.host
    }

    /// Context the codec writes relative to and reads into
    pub fn context(&self) -> Option<ContextId> {
        self.context
    }

    pub fn knows_singleton(&self, name: &str) -> bool {
        self.singletons.contains(name)
    }

    pub(crate) fn require_context(&self, purpose: &'static str) -> Result<ContextId, CodecError> {
        self.context.ok_or(CodecError::MissingContext(purpose))
    }

    /// Encodes one value through the first rule that accepts it
    pub fn encode_value(&self, value: &Captured) -> Result<Wire, CodecError> {
        let rule = RULES
            .iter()
            .find(|rule| (rule.accepts)(value))
            .ok_or_else(|| CodecError::UnsupportedValue(value.kind().to_string()))?;
        trace!(rule = rule.name, "encoding value");
        (rule.write)(self, value)
    }

    /// Decodes one value through the first rule that reads it
    pub fn decode_value(&self, wire: Wire) -> Result<Captured, CodecError> {
        let rule = RULES
            .iter()
            .find(|rule| (rule.reads)(&wire))
            .ok_or_else(|| CodecError::UnsupportedValue("unreadable wire value".to_string()))?;
        trace!(rule = rule.name, "decoding value");
        (rule.read)(self, wire)
    }

    /// Encodes a handler's state into a blob
    pub fn encode(&self, handler: &str, state: &Captured) -> Result<Vec<u8>, CodecError> {
        let blob = Blob {
            version: FORMAT_VERSION,
            handler: handler.to_string(),
            state: self.encode_value(state)?,
        };
        let bytes = serde_json::to_vec(&blob)?;
        debug!(handler, bytes = bytes.len(), "continuation state encoded");
        Ok(bytes)
    }

    /// Decodes a blob into its handler tag and state
    pub fn decode(&self, bytes: &[u8]) -> Result<(String, Captured), CodecError> {
        let header: BlobHeader = serde_json::from_slice(bytes)?;
        if header.version != FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion {
                found: header.version,
                expected: FORMAT_VERSION,
            });
        }
        let blob: Blob = serde_json::from_slice(bytes)?;
        let state = self.decode_value(blob.state)?;
        debug!(handler = %blob.handler, "continuation state decoded");
        Ok((blob.handler, state))
    }
}
