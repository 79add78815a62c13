//! Scheduling policy types.
//!
//! - [`TaskPriority`]: ordering among ready tasks (higher runs first)
//! - [`ExecutionEnvironment`]: which pool a task runs on

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Priority
// =============================================================================

/// Task scheduling priority.
///
/// Derived ordering is `Low < Normal < High`, which is what the max-heap in
/// [`TaskQueue`](super::TaskQueue) expects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Housekeeping such as outdated tile eviction.
    Low,
    /// Regular tile fetches and decodes.
    #[default]
    Normal,
    /// Work that gates what is on screen right now.
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Execution Environment
// =============================================================================

/// The pool a task or message runs on.
///
/// Computation tasks run on background workers. Graphics tasks run on the
/// render thread, which drains them by calling
/// [`ThreadPoolScheduler::run_graphics_tasks`](super::ThreadPoolScheduler::run_graphics_tasks)
/// once per frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionEnvironment {
    #[default]
    Computation,
    Graphics,
}

impl ExecutionEnvironment {
    /// Both environments, in drain order.
    pub const ALL: [ExecutionEnvironment; 2] =
        [ExecutionEnvironment::Computation, ExecutionEnvironment::Graphics];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionEnvironment::Computation => "computation",
            ExecutionEnvironment::Graphics => "graphics",
        }
    }
}

impl fmt::Display for ExecutionEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::High > TaskPriority::Normal);
        assert!(TaskPriority::Normal > TaskPriority::Low);
        assert_eq!(TaskPriority::default(), TaskPriority::Normal);
    }

    #[test]
    fn test_environment_serde_names() {
        let json = serde_json::to_string(&ExecutionEnvironment::Graphics).unwrap();
        assert_eq!(json, "\"graphics\"");
        let parsed: ExecutionEnvironment = serde_json::from_str("\"computation\"").unwrap();
        assert_eq!(parsed, ExecutionEnvironment::Computation);
    }
}
