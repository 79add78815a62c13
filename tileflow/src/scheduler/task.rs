//! Schedulable units of work.
//!
//! A [`Task`] pairs a [`TaskConfig`] (name, delay, priority, environment)
//! with a one-shot closure. Names are not unique; they group tasks so a
//! scheduler can remove every pending task of one kind at once.

use std::fmt;
use std::time::Duration;

use super::policy::{ExecutionEnvironment, TaskPriority};

/// Scheduling metadata for a task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskConfig {
    /// Group name, used by [`Scheduler::remove_task`](super::Scheduler::remove_task).
    pub name: String,

    /// How long to wait before the task becomes runnable.
    pub delay: Duration,

    pub priority: TaskPriority,

    pub environment: ExecutionEnvironment,
}

impl TaskConfig {
    /// Creates an immediate, normal-priority computation task config.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delay: Duration::ZERO,
            priority: TaskPriority::Normal,
            environment: ExecutionEnvironment::Computation,
        }
    }

    /// Shorthand for a graphics-environment config.
    pub fn graphics(name: impl Into<String>) -> Self {
        Self::new(name).with_environment(ExecutionEnvironment::Graphics)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_environment(mut self, environment: ExecutionEnvironment) -> Self {
        self.environment = environment;
        self
    }
}

/// A one-shot unit of work submitted to a [`Scheduler`](super::Scheduler).
pub struct Task {
    config: TaskConfig,
    work: Box<dyn FnOnce() + Send + 'static>,
}

impl Task {
    pub fn new<F>(config: TaskConfig, work: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            config,
            work: Box::new(work),
        }
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn environment(&self) -> ExecutionEnvironment {
        self.config.environment
    }

    pub fn priority(&self) -> TaskPriority {
        self.config.priority
    }

    pub fn delay(&self) -> Duration {
        self.config.delay
    }

    /// Consumes the task and runs its closure on the calling thread.
    pub fn run(self) {
        (self.work)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("config", &self.config).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_config_builders() {
        let config = TaskConfig::graphics("draw")
            .with_delay(Duration::from_millis(5))
            .with_priority(TaskPriority::High);
        assert_eq!(config.name, "draw");
        assert_eq!(config.environment, ExecutionEnvironment::Graphics);
        assert_eq!(config.delay, Duration::from_millis(5));
        assert_eq!(config.priority, TaskPriority::High);
    }

    #[test]
    fn test_run_consumes_closure() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let task = Task::new(TaskConfig::new("flag"), move || flag.store(true, Ordering::SeqCst));
        assert_eq!(task.name(), "flag");
        task.run();
        assert!(ran.load(Ordering::SeqCst));
    }
}
