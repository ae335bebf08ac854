//! Resumable handlers and their restore registry

use continuation_codec::{codec_for, Captured, CodecError, ContinuationCodec};
use core_types::ContextId;
use lifecycle::{CancellationReason, Failure, Outcome};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;
use ui_api::UiApi;

/// What a handler sees while it runs
///
/// Handlers run on the UI thread with the context they were attached to at
/// the moment of resumption.
pub struct ResumeContext<'a> {
    host: &'a mut dyn UiApi,
    context: ContextId,
}

impl<'a> ResumeContext<'a> {
    pub fn new(host: &'a mut dyn UiApi, context: ContextId) -> Self {
        Self { host, context }
    }

    /// The context the continuation is resuming in
    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn host(&self) -> &(dyn UiApi + 'a) {
        &*self.host
    }

    pub fn host_mut(&mut self) -> &mut (dyn UiApi + 'a) {
        &mut *self.host
    }
}

/// A suspended computation, expressed as a state-machine value
///
/// Everything the computation needs after resumption lives in its captured
/// state, so it can be persisted with [`Resumable::capture`] and rebuilt by
/// the restore function registered under [`Resumable::type_tag`].
///
/// Each of the three terminal methods consumes the handler: a computation is
/// resumed at most once.
pub trait Resumable<T> {
    /// Key of the restore function in a [`HandlerRegistry`]
    fn type_tag(&self) -> &'static str;

    /// Snapshot of the state needed to rebuild this handler
    fn capture(&self) -> Captured;

    fn resume(self: Box<Self>, cx: &mut ResumeContext<'_>, value: T);

    fn resume_with_error(self: Box<Self>, cx: &mut ResumeContext<'_>, failure: Failure);

    fn cancel(self: Box<Self>, cx: &mut ResumeContext<'_>, reason: CancellationReason);
}

/// A handler that receives every result as one [`Outcome`]
///
/// Errors and cancellations are folded into the outcome, which is how UI
/// requests report them.
pub trait OutcomeHandler<P> {
    fn type_tag(&self) -> &'static str;

    fn capture(&self) -> Captured;

    fn on_outcome(self: Box<Self>, cx: &mut ResumeContext<'_>, outcome: Outcome<P>);
}

impl<P, H> Resumable<Outcome<P>> for H
where
    H: OutcomeHandler<P>,
{
    fn type_tag(&self) -> &'static str {
        OutcomeHandler::type_tag(self)
    }

    fn capture(&self) -> Captured {
        OutcomeHandler::capture(self)
    }

    fn resume(self: Box<Self>, cx: &mut ResumeContext<'_>, value: Outcome<P>) {
        self.on_outcome(cx, value);
    }

    fn resume_with_error(self: Box<Self>, cx: &mut ResumeContext<'_>, failure: Failure) {
        self.on_outcome(cx, Outcome::Error(failure));
    }

    fn cancel(self: Box<Self>, cx: &mut ResumeContext<'_>, _reason: CancellationReason) {
        self.on_outcome(cx, Outcome::Cancelled);
    }
}

/// Signature of a callback-style handler
///
/// Receives the arguments captured at registration and the outcome.
pub type CallbackFn<P> = fn(&mut ResumeContext<'_>, &Captured, Outcome<P>);

/// A plain function plus captured arguments, persisted by name
///
/// The function itself never reaches the blob: only `name` and `args` do,
/// and the registry maps the name back to the function.
pub struct CallbackHandler<P> {
    name: &'static str,
    callback: CallbackFn<P>,
    args: Captured,
}

impl<P> CallbackHandler<P> {
    pub fn new(name: &'static str, callback: CallbackFn<P>, args: impl Into<Captured>) -> Self {
        Self {
            name,
            callback,
            args: args.into(),
        }
    }
}

impl<P> OutcomeHandler<P> for CallbackHandler<P> {
    fn type_tag(&self) -> &'static str {
        self.name
    }

    fn capture(&self) -> Captured {
        self.args.clone()
    }

    fn on_outcome(self: Box<Self>, cx: &mut ResumeContext<'_>, outcome: Outcome<P>) {
        (self.callback)(cx, &self.args, outcome);
    }
}

type Restorer<T> = Box<dyn Fn(&Captured) -> Result<Box<dyn Resumable<T>>, CodecError>>;

/// Maps handler tags to the functions that rebuild them from captured state
pub struct HandlerRegistry<T> {
    restorers: HashMap<&'static str, Restorer<T>>,
    singletons: BTreeSet<String>,
}

impl<T: 'static> HandlerRegistry<T> {
    pub fn new() -> Self {
        Self {
            restorers: HashMap::new(),
            singletons: BTreeSet::new(),
        }
    }

    /// Registers the restore function for handlers tagged `tag`
    ///
    /// A later registration under the same tag replaces the earlier one.
    pub fn register<F>(&mut self, tag: &'static str, restore: F)
    where
        F: Fn(&Captured) -> Result<Box<dyn Resumable<T>>, CodecError> + 'static,
    {
        if self.restorers.insert(tag, Box::new(restore)).is_some() {
            warn!(tag, "handler restore function replaced");
        }
    }

    /// Declares a singleton name that captured state may refer to
    pub fn register_singleton(&mut self, name: impl Into<String>) {
        self.singletons.insert(name.into());
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.restorers.contains_key(tag)
    }

    /// Rebuilds a handler from its tag and captured state
    pub fn restore(&self, tag: &str, state: &Captured) -> Result<Box<dyn Resumable<T>>, CodecError> {
        let restore = self
            .restorers
            .get(tag)
            .ok_or_else(|| CodecError::UnknownHandler(tag.to_string()))?;
        restore(state)
    }

    /// Builds a codec that knows this registry's singletons
    pub fn codec<'h>(&self, host: &'h dyn UiApi, context: Option<ContextId>) -> ContinuationCodec<'h> {
        codec_for(host, context).with_singletons(self.singletons.iter().cloned())
    }
}

impl<P: 'static> HandlerRegistry<Outcome<P>> {
    /// Registers a callback-style handler under `name`
    pub fn register_callback(&mut self, name: &'static str, callback: CallbackFn<P>) {
        self.register(name, move |args| {
            let handler: Box<dyn Resumable<Outcome<P>>> =
                Box::new(CallbackHandler::new(name, callback, args.clone()));
            Ok(handler)
        });
    }
}

impl<T: 'static> Default for HandlerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
