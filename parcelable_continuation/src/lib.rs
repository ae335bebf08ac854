//! # Parcelable Continuation
//!
//! A suspended computation that can be persisted, relocated to a new UI
//! context, and resumed exactly once.
//!
//! ## Philosophy
//!
//! - **State machines, not closures**: a handler's captured state is
//!   ordinary data ([`Resumable::capture`]) and is rebuilt from a registry
//!   ([`HandlerRegistry`]) after process death
//! - **Bound to one context at a time**: a live handler is attached to the
//!   context it will resume in; moving it re-encodes its state against the
//!   new context
//! - **Resumed once**: every terminal operation consumes the continuation,
//!   later operations fail fast
//!
//! ## States
//!
//! ```text
//!                  attach(ctx)                      resume/cancel
//!  SerializedDetached ───────► LiveAttached(ctx) ─────────────────► Consumed
//!          ▲                     │        ▲
//!          └────── detach ───────┘        │ attach(ctx)
//!          ▲                              │
//!          └────── detach ─────── LiveDetached
//! ```

pub mod handler;

pub use handler::{
    CallbackFn, CallbackHandler, HandlerRegistry, OutcomeHandler, ResumeContext, Resumable,
};

use continuation_codec::CodecError;
use core_types::{ContextId, RequestCode};
use lifecycle::{CancellationReason, Failure};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::mem;
use thiserror::Error;
use tracing::debug;
use ui_api::UiApi;

/// Errors raised by continuation operations
#[derive(Debug, Error)]
pub enum ContinuationError {
    /// The operation is not valid in the continuation's current state
    #[error("Continuation {request_code} cannot {operation}: {reason}")]
    InvalidState {
        request_code: RequestCode,
        operation: &'static str,
        reason: String,
    },

    /// Persisting or restoring the handler failed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Observable state of a continuation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationState {
    LiveAttached(ContextId),
    LiveDetached,
    SerializedDetached,
    Consumed,
}

impl fmt::Display for ContinuationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContinuationState::LiveAttached(context) => write!(f, "attached to {}", context),
            ContinuationState::LiveDetached => write!(f, "live and detached"),
            ContinuationState::SerializedDetached => write!(f, "serialized"),
            ContinuationState::Consumed => write!(f, "consumed"),
        }
    }
}

/// Persisted form of one continuation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParcelRecord {
    pub request_code: RequestCode,
    pub payload: Vec<u8>,
}

enum Payload<T> {
    Live(Box<dyn Resumable<T>>),
    Serialized(Vec<u8>),
    Consumed,
}

/// A suspended computation waiting for the result of `request_code`
pub struct ParcelableContinuation<T> {
    request_code: RequestCode,
    payload: Payload<T>,
    attached: Option<ContextId>,
}

impl<T: 'static> ParcelableContinuation<T> {
    /// Wraps a live handler bound to `context`
    pub fn new(request_code: RequestCode, handler: Box<dyn Resumable<T>>, context: ContextId) -> Self {
        Self {
            request_code,
            payload: Payload::Live(handler),
            attached: Some(context),
        }
    }

    /// Wraps a live handler that is not bound to any context yet
    pub fn detached(request_code: RequestCode, handler: Box<dyn Resumable<T>>) -> Self {
        Self {
            request_code,
            payload: Payload::Live(handler),
            attached: None,
        }
    }

    /// Rebuilds a continuation from its persisted form
    pub fn from_parcel(record: ParcelRecord) -> Self {
        Self {
            request_code: record.request_code,
            payload: Payload::Serialized(record.payload),
            attached: None,
        }
    }

    /// Persisted form; only available while serialized
    pub fn to_parcel(&self) -> Result<ParcelRecord, ContinuationError> {
        match &self.payload {
            Payload::Serialized(bytes) => Ok(ParcelRecord {
                request_code: self.request_code,
                payload: bytes.clone(),
            }),
            _ => Err(self.invalid("write a parcel", "detach it first")),
        }
    }

    pub fn request_code(&self) -> RequestCode {
        self.request_code
    }

    pub fn state(&self) -> ContinuationState {
        match (&self.payload, self.attached) {
            (Payload::Live(_), Some(context)) => ContinuationState::LiveAttached(context),
            (Payload::Live(_), None) => ContinuationState::LiveDetached,
            (Payload::Serialized(_), _) => ContinuationState::SerializedDetached,
            (Payload::Consumed, _) => ContinuationState::Consumed,
        }
    }

    pub fn is_consumed(&self) -> bool {
        matches!(self.payload, Payload::Consumed)
    }

    /// Binds the continuation to `context`
    ///
    /// A serialized continuation is decoded against `context`. A live one
    /// bound elsewhere is re-encoded against its current context and decoded
    /// against the new one, so every context reference it captured follows
    /// it. Attaching to the current context is a no-op.
    pub fn attach(
        &mut self,
        host: &dyn UiApi,
        handlers: &HandlerRegistry<T>,
        context: ContextId,
    ) -> Result<(), ContinuationError> {
        if host.context_info(context).is_none() {
            return Err(self.invalid("attach", format!("{} is not a live context", context)));
        }

        let relocated = match &self.payload {
            Payload::Consumed => return Err(self.invalid("attach", "it was already resumed")),
            Payload::Serialized(bytes) => restore(host, handlers, Some(context), bytes)?,
            Payload::Live(handler) => match self.attached {
                Some(current) if current == context => return Ok(()),
                Some(current) => {
                    let bytes = handlers
                        .codec(host, Some(current))
                        .encode(handler.type_tag(), &handler.capture())?;
                    restore(host, handlers, Some(context), &bytes)?
                }
                None => {
                    self.attached = Some(context);
                    return Ok(());
                }
            },
        };

        debug!(request_code = %self.request_code, context = %context, "continuation attached");
        self.payload = Payload::Live(relocated);
        self.attached = Some(context);
        Ok(())
    }

    /// Serializes the continuation and unbinds it
    ///
    /// An attached continuation is encoded against its context, which must
    /// still be alive if the captured state refers to it.
    pub fn detach(&mut self, host: &dyn UiApi, handlers: &HandlerRegistry<T>) -> Result<(), ContinuationError> {
        let bytes = match &self.payload {
            Payload::Consumed => return Err(self.invalid("detach", "it was already resumed")),
            Payload::Serialized(_) => return Ok(()),
            Payload::Live(handler) => handlers
                .codec(host, self.attached)
                .encode(handler.type_tag(), &handler.capture())?,
        };

        debug!(request_code = %self.request_code, bytes = bytes.len(), "continuation detached");
        self.payload = Payload::Serialized(bytes);
        self.attached = None;
        Ok(())
    }

    /// Resumes the computation with a value
    pub fn resume(
        &mut self,
        host: &mut dyn UiApi,
        handlers: &HandlerRegistry<T>,
        context: ContextId,
        value: T,
    ) -> Result<(), ContinuationError> {
        let handler = self.take_handler(&*host, handlers, context, "resume")?;
        handler.resume(&mut ResumeContext::new(host, context), value);
        Ok(())
    }

    /// Resumes the computation with a failure
    pub fn resume_with_error(
        &mut self,
        host: &mut dyn UiApi,
        handlers: &HandlerRegistry<T>,
        context: ContextId,
        failure: Failure,
    ) -> Result<(), ContinuationError> {
        let handler = self.take_handler(&*host, handlers, context, "resume with an error")?;
        handler.resume_with_error(&mut ResumeContext::new(host, context), failure);
        Ok(())
    }

    /// Cancels the computation
    pub fn cancel(
        &mut self,
        host: &mut dyn UiApi,
        handlers: &HandlerRegistry<T>,
        context: ContextId,
        reason: CancellationReason,
    ) -> Result<(), ContinuationError> {
        let handler = self.take_handler(&*host, handlers, context, "cancel")?;
        debug!(request_code = %self.request_code, reason = %reason, "continuation cancelled");
        handler.cancel(&mut ResumeContext::new(host, context), reason);
        Ok(())
    }

    fn take_handler(
        &mut self,
        host: &dyn UiApi,
        handlers: &HandlerRegistry<T>,
        context: ContextId,
        operation: &'static str,
    ) -> Result<Box<dyn Resumable<T>>, ContinuationError> {
        if self.is_consumed() {
            return Err(self.invalid(operation, "it was already resumed"));
        }
        self.attach(host, handlers, context)?;
        match mem::replace(&mut self.payload, Payload::Consumed) {
            Payload::Live(handler) => {
                self.attached = None;
                Ok(handler)
            }
            other => {
                self.payload = other;
                Err(self.invalid(operation, "no live handler after attach"))
            }
        }
    }

    fn invalid(&self, operation: &'static str, reason: impl Into<String>) -> ContinuationError {
        ContinuationError::InvalidState {
            request_code: self.request_code,
            operation,
            reason: reason.into(),
        }
    }
}

fn restore<T: 'static>(
    host: &dyn UiApi,
    handlers: &HandlerRegistry<T>,
    context: Option<ContextId>,
    bytes: &[u8],
) -> Result<Box<dyn Resumable<T>>, CodecError> {
    let (tag, state) = handlers.codec(host, context).decode(bytes)?;
    handlers.restore(&tag, &state)
}

impl<T> fmt::Debug for ParcelableContinuation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = match &self.payload {
            Payload::Live(_) => "live",
            Payload::Serialized(_) => "serialized",
            Payload::Consumed => "consumed",
        };
        f.debug_struct("ParcelableContinuation")
            .field("request_code", &self.request_code)
            .field("payload", &payload)
            .field("attached", &self.attached)
            .finish()
    }
}
