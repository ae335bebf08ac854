//! UI-thread and worker-pool tasks

use crate::UiApi;

/// Work that must run on the UI thread
pub type UiTask = Box<dyn FnOnce(&mut dyn UiApi)>;

/// Work that runs on the worker pool
pub type WorkerTask = Box<dyn FnOnce(&mut WorkerContext)>;

/// Called once when an observed entity is permanently destroyed
pub type DestroyObserver = Box<dyn FnOnce()>;

/// Execution context of a worker task
///
/// Workers have no access to the host. The only way back to it is an
/// explicit [`WorkerContext::run_on_ui_thread`].
#[derive(Default)]
pub struct WorkerContext {
    ui_tasks: Vec<UiTask>,
}

impl WorkerContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marshals `task` to the UI thread
    pub fn run_on_ui_thread(&mut self, task: impl FnOnce(&mut dyn UiApi) + 'static) {
        self.ui_tasks.push(Box::new(task));
    }

    /// Number of tasks waiting to be marshalled
    pub fn pending_ui_tasks(&self) -> usize {
        self.ui_tasks.len()
    }

    /// Hands the collected UI tasks to the host, in submission order
    pub fn into_ui_tasks(self) -> Vec<UiTask> {
        self.ui_tasks
    }
}
