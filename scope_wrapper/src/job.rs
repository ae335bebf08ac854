//! Child jobs launched from a scope

use crate::ContextBinding;
use lifecycle::{CancellationReason, CancellationSource, CancellationToken};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use ui_api::{DestroyTarget, UiApi, UiError, WorkerContext};
use uuid::Uuid;

/// Job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job({})", self.0)
    }
}

/// A cancellable unit of work bound to a UI context
///
/// Cancelling a job cancels every job launched under it. Clones share the
/// same cancellation state.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    binding: ContextBinding,
    source: CancellationSource,
}

impl Job {
    /// Creates a root job for `binding`
    pub fn new(binding: ContextBinding) -> Self {
        Self {
            id: JobId::new(),
            binding,
            source: CancellationSource::new(),
        }
    }

    /// Creates a job that is cancelled together with `self`
    pub fn child(&self, binding: ContextBinding) -> Self {
        Self {
            id: JobId::new(),
            binding,
            source: self.source.child(),
        }
    }

    /// Same job, bound to `binding`
    pub fn with_binding(&self, binding: ContextBinding) -> Self {
        Self {
            binding,
            ..self.clone()
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn binding(&self) -> &ContextBinding {
        &self.binding
    }

    /// Token observing this job and its ancestors
    pub fn token(&self) -> CancellationToken {
        self.source.token()
    }

    pub fn cancel(&self, reason: CancellationReason) {
        if self.source.cancel(reason.clone()) {
            debug!(job = %self.id, reason = %reason, "job cancelled");
        }
    }

    /// Reason this job, or the nearest cancelled ancestor, was cancelled
    pub fn cancellation_reason(&self) -> Option<CancellationReason> {
        self.source.token().reason()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_reason().is_some()
    }

    /// Cancels this job with [`CancellationReason::HostDestroyed`] once
    /// `target` is permanently destroyed
    pub fn cancel_on_destroy(
        &self,
        host: &mut dyn UiApi,
        target: DestroyTarget,
    ) -> Result<(), UiError> {
        let job = self.clone();
        host.observe_destroy(
            target,
            Box::new(move || job.cancel(CancellationReason::HostDestroyed)),
        )
    }
}

/// What a launched body sees while it runs on the worker queue
///
/// Workers cannot touch the host; UI work is marshalled through
/// [`JobContext::run_on_ui_thread`], which drops the task if the job is
/// cancelled by the time it reaches the UI thread.
pub struct JobContext<'w> {
    job: Job,
    worker: &'w mut WorkerContext,
}

impl<'w> JobContext<'w> {
    pub(crate) fn new(job: Job, worker: &'w mut WorkerContext) -> Self {
        Self { job, worker }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn binding(&self) -> &ContextBinding {
        self.job.binding()
    }

    pub fn is_cancelled(&self) -> bool {
        self.job.is_cancelled()
    }

    /// Queues `task` for the UI thread, handing it this job's binding
    pub fn run_on_ui_thread(
        &mut self,
        task: impl FnOnce(&mut dyn UiApi, &ContextBinding) + 'static,
    ) {
        let job = self.job.clone();
        self.worker.run_on_ui_thread(move |host| {
            if let Some(reason) = job.cancellation_reason() {
                debug!(job = %job.id(), reason = %reason, "UI task dropped, job cancelled");
                return;
            }
            task(host, job.binding());
        });
    }
}
