//! Thread pool scheduler.
//!
//! Computation tasks run on a fixed set of named worker threads. Graphics
//! tasks are parked in their own queue until the render thread calls
//! [`ThreadPoolScheduler::run_graphics_tasks`], typically once per frame.
//! Delayed tasks of either environment sit in a shared [`DelayedQueue`] and
//! are promoted when due: workers sleep until the earliest due time, and the
//! graphics drain promotes due graphics tasks itself.
//!
//! # Architecture
//!
//! ```text
//! add_task ──► delayed? ──yes──► DelayedQueue ──due──┐
//!                 │ no                               │
//!                 ▼                                  ▼
//!         environment? ──computation──► TaskQueue ──► worker threads
//!                 │
//!                 └──graphics──► TaskQueue ──► run_graphics_tasks() (render thread)
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, trace};

use super::policy::ExecutionEnvironment;
use super::queue::{DelayedQueue, TaskQueue};
use super::task::Task;
use super::Scheduler;
use crate::error::SchedulerError;

// =============================================================================
// Configuration
// =============================================================================

/// Fallback worker count when the platform cannot report its parallelism.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default thread name prefix; workers are named `<prefix>-<index>`.
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "tileflow-worker";

/// Configuration for [`ThreadPoolScheduler`].
#[derive(Clone, Debug)]
pub struct ThreadPoolSchedulerConfig {
    /// Number of computation worker threads.
    pub worker_count: usize,
    pub thread_name_prefix: String,
}

impl Default for ThreadPoolSchedulerConfig {
    fn default() -> Self {
        let worker_count = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(DEFAULT_WORKER_COUNT);
        Self {
            worker_count,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl ThreadPoolSchedulerConfig {
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}

// =============================================================================
// Shared State
// =============================================================================

#[derive(Default)]
struct PoolState {
    computation: TaskQueue,
    graphics: TaskQueue,
    delayed: DelayedQueue,
    paused: bool,
    shutdown: bool,
}

impl PoolState {
    fn enqueue_ready(&mut self, task: Task) {
        match task.environment() {
            ExecutionEnvironment::Computation => self.computation.push(task),
            ExecutionEnvironment::Graphics => self.graphics.push(task),
        }
    }

    /// Moves due delayed tasks into their ready queues.
    fn promote_due(&mut self, now: Instant) -> usize {
        let due = self.delayed.pop_due(now);
        let promoted = due.len();
        for task in due {
            self.enqueue_ready(task);
        }
        promoted
    }
}

struct Shared {
    state: Mutex<PoolState>,
    work_available: Condvar,
}

// =============================================================================
// Scheduler
// =============================================================================

/// Multi-threaded [`Scheduler`] with a render-thread graphics queue.
///
/// Dropping the scheduler shuts it down and joins its workers.
pub struct ThreadPoolScheduler {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPoolScheduler {
    /// Spawns the worker threads described by `config`.
    pub fn new(config: ThreadPoolSchedulerConfig) -> Result<Self, SchedulerError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState::default()),
            work_available: Condvar::new(),
        });

        let worker_count = config.worker_count.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let name = format!("{}-{}", config.thread_name_prefix, index);
            let worker_shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(worker_shared))
                .map_err(|source| SchedulerError::Spawn { name, source })?;
            workers.push(handle);
        }

        info!(worker_count, "Thread pool scheduler started");

        Ok(Self {
            shared,
            workers: Mutex::new(workers),
        })
    }

    /// Creates a scheduler with [`ThreadPoolSchedulerConfig::default`].
    pub fn with_defaults() -> Result<Self, SchedulerError> {
        Self::new(ThreadPoolSchedulerConfig::default())
    }

    /// Runs every graphics task that is ready now on the calling thread.
    ///
    /// Tasks enqueued while this runs are left for the next call, so a task
    /// that reschedules itself cannot starve the caller. Returns the number of
    /// tasks executed.
    pub fn run_graphics_tasks(&self) -> usize {
        let batch = {
            let mut state = self.shared.state.lock();
            if state.paused || state.shutdown {
                return 0;
            }
            state.promote_due(Instant::now());
            let mut batch = Vec::with_capacity(state.graphics.len());
            while let Some(queued) = state.graphics.pop() {
                batch.push(queued.task);
            }
            batch
        };

        let executed = batch.len();
        for task in batch {
            run_guarded(task);
        }
        if executed > 0 {
            trace!(executed, "Graphics tasks drained");
        }
        executed
    }

    /// Number of graphics tasks ready to run.
    pub fn pending_graphics_tasks(&self) -> usize {
        self.shared.state.lock().graphics.len()
    }

    /// Number of computation tasks waiting for a worker.
    pub fn pending_computation_tasks(&self) -> usize {
        self.shared.state.lock().computation.len()
    }

    pub fn pending_delayed_tasks(&self) -> usize {
        self.shared.state.lock().delayed.len()
    }

    /// Stops the workers and waits for them to exit.
    ///
    /// Queued tasks are discarded. Safe to call more than once, and safe to
    /// call from a task running on one of the workers.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            state.computation.clear();
            state.graphics.clear();
            state.delayed.clear();
        }
        self.shared.work_available.notify_all();

        let current = thread::current().id();
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in workers {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("Scheduler worker exited with a panic");
            }
        }
        info!("Thread pool scheduler stopped");
    }
}

impl Scheduler for ThreadPoolScheduler {
    fn add_task(&self, task: Task) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            debug!(task = task.name(), "Scheduler stopped, dropping task");
            return;
        }
        let delay = task.delay();
        if delay.is_zero() {
            state.enqueue_ready(task);
        } else {
            state.delayed.push(task, Instant::now() + delay);
        }
        drop(state);
        // Wake one worker either to run the task or to re-arm its timer.
        self.shared.work_available.notify_one();
    }

    fn add_tasks(&self, tasks: Vec<Task>) {
        let count = tasks.len();
        {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                return;
            }
            let now = Instant::now();
            for task in tasks {
                let delay = task.delay();
                if delay.is_zero() {
                    state.enqueue_ready(task);
                } else {
                    state.delayed.push(task, now + delay);
                }
            }
        }
        if count > 1 {
            self.shared.work_available.notify_all();
        } else {
            self.shared.work_available.notify_one();
        }
    }

    fn remove_task(&self, name: &str) -> usize {
        let mut state = self.shared.state.lock();
        state.computation.remove_named(name)
            + state.graphics.remove_named(name)
            + state.delayed.remove_named(name)
    }

    fn pause(&self) {
        self.shared.state.lock().paused = true;
        debug!("Scheduler paused");
    }

    fn resume(&self) {
        self.shared.state.lock().paused = false;
        self.shared.work_available.notify_all();
        debug!("Scheduler resumed");
    }

    fn clear(&self) {
        let mut state = self.shared.state.lock();
        state.computation.clear();
        state.graphics.clear();
        state.delayed.clear();
    }
}

impl Drop for ThreadPoolScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadPoolScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ThreadPoolScheduler")
            .field("computation", &state.computation)
            .field("graphics", &state.graphics)
            .field("delayed", &state.delayed)
            .field("paused", &state.paused)
            .finish()
    }
}

// =============================================================================
// Worker Loop
// =============================================================================

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let task = {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                state.promote_due(Instant::now());
                if !state.paused {
                    if let Some(queued) = state.computation.pop() {
                        trace!(
                            task = queued.task.name(),
                            wait_us = queued.wait_time().as_micros() as u64,
                            "Worker picked task"
                        );
                        break queued.task;
                    }
                }
                match state.delayed.next_due() {
                    Some(due) => {
                        shared.work_available.wait_until(&mut state, due);
                    }
                    None => shared.work_available.wait(&mut state),
                }
            }
        };
        run_guarded(task);
    }
}

/// Runs a task, logging instead of unwinding through the worker if it panics.
fn run_guarded(task: Task) {
    let name = task.name().to_string();
    if panic::catch_unwind(AssertUnwindSafe(|| task.run())).is_err() {
        error!(task = %name, "Scheduled task panicked");
    }
}
