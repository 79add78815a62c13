//! Task scheduling.
//!
//! Everything asynchronous in the crate (mailbox drains, tile fetches,
//! decodes, eviction timers) is expressed as a [`Task`] handed to a
//! [`Scheduler`]. Two implementations are provided:
//!
//! - [`ThreadPoolScheduler`]: worker threads for computation tasks and a
//!   render-thread drained queue for graphics tasks
//! - [`ManualScheduler`]: deterministic, caller-driven, with a virtual clock
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tileflow::scheduler::{Scheduler, ThreadPoolScheduler, Task, TaskConfig};
//!
//! let scheduler = Arc::new(ThreadPoolScheduler::with_defaults()?);
//! scheduler.add_task(Task::new(TaskConfig::new("warmup"), || println!("hi")));
//!
//! // On the render thread, once per frame:
//! scheduler.run_graphics_tasks();
//! ```

mod manual;
mod policy;
mod queue;
mod task;
mod thread_pool;

pub use manual::{ManualScheduler, DEFAULT_MAX_IDLE_STEPS};
pub use policy::{ExecutionEnvironment, TaskPriority};
pub use queue::{DelayedQueue, QueuedTask, TaskQueue};
pub use task::{Task, TaskConfig};
pub use thread_pool::{
    ThreadPoolScheduler, ThreadPoolSchedulerConfig, DEFAULT_THREAD_NAME_PREFIX,
    DEFAULT_WORKER_COUNT,
};

/// Accepts tasks and runs them on the environment they ask for.
///
/// Implementations must be callable from any thread, including from inside
/// a task they are currently running.
pub trait Scheduler: Send + Sync + 'static {
    /// Submits a task. Tasks with a non-zero delay become runnable later.
    fn add_task(&self, task: Task);

    /// Submits several tasks at once.
    fn add_tasks(&self, tasks: Vec<Task>) {
        for task in tasks {
            self.add_task(task);
        }
    }

    /// Removes every pending task with the given name.
    ///
    /// Returns how many were removed. Tasks already running are unaffected.
    fn remove_task(&self, name: &str) -> usize;

    /// Stops handing out tasks. Submission still works while paused.
    fn pause(&self);

    fn resume(&self);

    /// Discards every pending task.
    fn clear(&self);
}
