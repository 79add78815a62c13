//! Ready and delayed task queues.
//!
//! Ready tasks are ordered by priority (higher first), then by enqueue order
//! (FIFO within the same priority). Delayed tasks are ordered by due time,
//! then by enqueue order.
//!
//! # Example
//!
//! ```ignore
//! use tileflow::scheduler::{TaskQueue, Task, TaskConfig, TaskPriority};
//!
//! let mut queue = TaskQueue::new();
//! queue.push(Task::new(TaskConfig::new("evict").with_priority(TaskPriority::Low), || {}));
//! queue.push(Task::new(TaskConfig::new("load").with_priority(TaskPriority::High), || {}));
//!
//! // The high priority task comes out first despite being pushed second
//! assert_eq!(queue.pop().unwrap().task.name(), "load");
//! ```

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use super::policy::TaskPriority;
use super::task::Task;

// =============================================================================
// Sequence Number Generator
// =============================================================================

/// Global sequence counter for FIFO ordering within priority levels.
static SEQUENCE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_sequence() -> u64 {
    SEQUENCE_COUNTER.fetch_add(1, AtomicOrdering::Relaxed)
}

// =============================================================================
// Queued Task
// =============================================================================

/// A ready task waiting for a worker.
pub struct QueuedTask {
    pub task: Task,

    /// Sequence number for FIFO ordering within priority level.
    sequence: u64,

    /// When the task was enqueued (for wait time logging).
    pub enqueued_at: Instant,
}

impl QueuedTask {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            sequence: next_sequence(),
            enqueued_at: Instant::now(),
        }
    }

    pub fn priority(&self) -> TaskPriority {
        self.task.priority()
    }

    /// Returns how long this task has been waiting in the queue.
    pub fn wait_time(&self) -> Duration {
        self.enqueued_at.elapsed()
    }
}

impl std::fmt::Debug for QueuedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedTask")
            .field("task_name", &self.task.name())
            .field("priority", &self.priority())
            .field("sequence", &self.sequence)
            .finish()
    }
}

// Ordering for BinaryHeap: higher priority first, then lower sequence (older) first
impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority() == other.priority() && self.sequence == other.sequence
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority().cmp(&other.priority()) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            other_ordering => other_ordering,
        }
    }
}

// =============================================================================
// Task Queue
// =============================================================================

/// Priority queue of ready tasks.
///
/// Not thread-safe; schedulers wrap it in a mutex.
#[derive(Default)]
pub struct TaskQueue {
    heap: BinaryHeap<QueuedTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: Task) {
        self.heap.push(QueuedTask::new(task));
    }

    /// Removes and returns the highest-priority, oldest task.
    pub fn pop(&mut self) -> Option<QueuedTask> {
        self.heap.pop()
    }

    pub fn peek(&self) -> Option<&QueuedTask> {
        self.heap.peek()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Removes all tasks with the given name.
    ///
    /// Returns the number of tasks removed.
    pub fn remove_named(&mut self, name: &str) -> usize {
        let before = self.heap.len();
        self.heap.retain(|queued| queued.task.name() != name);
        before - self.heap.len()
    }

    /// Returns the number of tasks at each priority level.
    pub fn priority_counts(&self) -> HashMap<TaskPriority, usize> {
        let mut counts = HashMap::new();
        for queued in self.heap.iter() {
            *counts.entry(queued.priority()).or_insert(0) += 1;
        }
        counts
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("len", &self.heap.len())
            .field("priority_counts", &self.priority_counts())
            .finish()
    }
}

// =============================================================================
// Delayed Queue
// =============================================================================

struct DelayedTask {
    due: Instant,
    sequence: u64,
    task: Task,
}

impl DelayedTask {
    fn key(&self) -> Reverse<(Instant, u64)> {
        Reverse((self.due, self.sequence))
    }
}

impl PartialEq for DelayedTask {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for DelayedTask {}

impl PartialOrd for DelayedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap over Reverse keys yields the earliest due task first.
        self.key().cmp(&other.key())
    }
}

/// Tasks waiting for their delay to elapse.
#[derive(Default)]
pub struct DelayedQueue {
    heap: BinaryHeap<DelayedTask>,
}

impl DelayedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `task` to become runnable at `due`.
    pub fn push(&mut self, task: Task, due: Instant) {
        self.heap.push(DelayedTask {
            due,
            sequence: next_sequence(),
            task,
        });
    }

    /// Removes every task whose due time is at or before `now`, earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<Task> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|delayed| delayed.due <= now) {
            if let Some(delayed) = self.heap.pop() {
                due.push(delayed.task);
            }
        }
        due
    }

    /// The earliest due time, if any task is waiting.
    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|delayed| delayed.due)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn remove_named(&mut self, name: &str) -> usize {
        let before = self.heap.len();
        self.heap.retain(|delayed| delayed.task.name() != name);
        before - self.heap.len()
    }
}

impl std::fmt::Debug for DelayedQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedQueue")
            .field("len", &self.heap.len())
            .field("next_due", &self.next_due())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
