//! Deterministic single-threaded scheduler.
//!
//! [`ManualScheduler`] never runs anything on its own. The caller drives it
//! with [`run_next`](ManualScheduler::run_next) or
//! [`run_until_idle`](ManualScheduler::run_until_idle), and moves a virtual
//! clock with [`advance_time`](ManualScheduler::advance_time) to release
//! delayed tasks. Used by tests and by the CLI simulation.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

use super::policy::ExecutionEnvironment;
use super::queue::{DelayedQueue, TaskQueue};
use super::task::Task;
use super::Scheduler;

/// Upper bound on tasks executed by one [`ManualScheduler::run_until_idle`] call.
pub const DEFAULT_MAX_IDLE_STEPS: usize = 100_000;

struct ManualState {
    computation: TaskQueue,
    graphics: TaskQueue,
    delayed: DelayedQueue,
    origin: Instant,
    elapsed: Duration,
    paused: bool,
    executed: u64,
}

impl ManualState {
    fn now(&self) -> Instant {
        self.origin + self.elapsed
    }

    fn enqueue(&mut self, task: Task) {
        if task.delay().is_zero() {
            self.enqueue_ready(task);
        } else {
            let due = self.now() + task.delay();
            self.delayed.push(task, due);
        }
    }

    fn enqueue_ready(&mut self, task: Task) {
        match task.environment() {
            ExecutionEnvironment::Computation => self.computation.push(task),
            ExecutionEnvironment::Graphics => self.graphics.push(task),
        }
    }

    fn queue_len(&self, environment: ExecutionEnvironment) -> usize {
        match environment {
            ExecutionEnvironment::Computation => self.computation.len(),
            ExecutionEnvironment::Graphics => self.graphics.len(),
        }
    }

    fn queue_mut(&mut self, environment: ExecutionEnvironment) -> &mut TaskQueue {
        match environment {
            ExecutionEnvironment::Computation => &mut self.computation,
            ExecutionEnvironment::Graphics => &mut self.graphics,
        }
    }
}

/// A [`Scheduler`] that only runs tasks when told to.
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManualState {
                computation: TaskQueue::new(),
                graphics: TaskQueue::new(),
                delayed: DelayedQueue::new(),
                origin: Instant::now(),
                elapsed: Duration::ZERO,
                paused: false,
                executed: 0,
            }),
        }
    }

    /// Runs the next ready task of `environment`, if any.
    ///
    /// The task runs without the scheduler lock held, so it may enqueue more
    /// tasks.
    pub fn run_next_in(&self, environment: ExecutionEnvironment) -> bool {
        let task = {
            let mut state = self.state.lock();
            if state.paused {
                return false;
            }
            match state.queue_mut(environment).pop() {
                Some(queued) => {
                    state.executed += 1;
                    queued.task
                }
                None => return false,
            }
        };
        task.run();
        true
    }

    /// Runs the next ready task, computation before graphics.
    pub fn run_next(&self) -> bool {
        ExecutionEnvironment::ALL
            .iter()
            .any(|environment| self.run_next_in(*environment))
    }

    /// Runs tasks until both ready queues are empty.
    ///
    /// Delayed tasks are not released; see [`advance_time`](Self::advance_time).
    /// Returns the number of tasks executed.
    pub fn run_until_idle(&self) -> usize {
        let mut executed = 0;
        while self.run_next() {
            executed += 1;
            if executed >= DEFAULT_MAX_IDLE_STEPS {
                warn!(executed, "Manual scheduler did not go idle, stopping");
                break;
            }
        }
        executed
    }

    /// Runs only computation tasks until that queue is empty.
    pub fn run_computation_until_idle(&self) -> usize {
        let mut executed = 0;
        while self.run_next_in(ExecutionEnvironment::Computation) {
            executed += 1;
        }
        executed
    }

    /// Runs the graphics tasks that are ready now, like one rendered frame.
    pub fn run_graphics_tasks(&self) -> usize {
        let ready = self.state.lock().graphics.len();
        let mut executed = 0;
        while executed < ready && self.run_next_in(ExecutionEnvironment::Graphics) {
            executed += 1;
        }
        executed
    }

    /// Advances the virtual clock and releases delayed tasks that became due.
    ///
    /// Returns the number of tasks released.
    pub fn advance_time(&self, duration: Duration) -> usize {
        let mut state = self.state.lock();
        state.elapsed += duration;
        let now = state.now();
        let due = state.delayed.pop_due(now);
        let released = due.len();
        for task in due {
            state.enqueue_ready(task);
        }
        released
    }

    /// Virtual time elapsed since construction.
    pub fn elapsed(&self) -> Duration {
        self.state.lock().elapsed
    }

    pub fn pending(&self) -> usize {
        let state = self.state.lock();
        state.computation.len() + state.graphics.len()
    }

    pub fn pending_in(&self, environment: ExecutionEnvironment) -> usize {
        self.state.lock().queue_len(environment)
    }

    pub fn pending_delayed(&self) -> usize {
        self.state.lock().delayed.len()
    }

    /// Total tasks executed so far.
    pub fn executed(&self) -> u64 {
        self.state.lock().executed
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn add_task(&self, task: Task) {
        self.state.lock().enqueue(task);
    }

    fn add_tasks(&self, tasks: Vec<Task>) {
        let mut state = self.state.lock();
        for task in tasks {
            state.enqueue(task);
        }
    }

    fn remove_task(&self, name: &str) -> usize {
        let mut state = self.state.lock();
        state.computation.remove_named(name)
            + state.graphics.remove_named(name)
            + state.delayed.remove_named(name)
    }

    fn pause(&self) {
        self.state.lock().paused = true;
    }

    fn resume(&self) {
        self.state.lock().paused = false;
    }

    fn clear(&self) {
        let mut state = self.state.lock();
        state.computation.clear();
        state.graphics.clear();
        state.delayed.clear();
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualScheduler")
            .field("computation", &state.computation)
            .field("graphics", &state.graphics)
            .field("delayed", &state.delayed)
            .field("elapsed", &state.elapsed)
            .finish()
    }
}
