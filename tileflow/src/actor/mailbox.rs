//! Per-object message queue with two execution environments.
//!
//! A [`Mailbox`] owns one FIFO queue per [`ExecutionEnvironment`] and a
//! single re-entrant receive lock shared by both, so at most one message of
//! the owning object runs at any time regardless of environment.
//!
//! # Drain protocol
//!
//! - `push` schedules a drain task only when none is outstanding for that
//!   queue, so each queue has at most one drain task at a time
//! - a drain task the scheduler discards unrun (`clear`, `remove_task`)
//!   releases its queue, and the next push schedules a new one
//! - a drain task runs exactly one message and, if the queue is still
//!   non-empty, schedules the next drain
//! - graphics drains never block: if the receive lock is busy they
//!   reschedule themselves and return
//! - computation drains wait for the receive lock

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use tracing::{error, trace};

use super::message::{DuplicationStrategy, Message};
use crate::error::MailboxError;
use crate::scheduler::{ExecutionEnvironment, Scheduler, Task, TaskConfig};

/// Task name used for mailbox drain tasks.
pub const MAILBOX_DRAIN_TASK: &str = "mailbox_drain";

pub struct Mailbox {
    self_ref: Weak<Mailbox>,
    scheduler: Arc<dyn Scheduler>,
    capacity: Option<usize>,
    push_lock: Mutex<()>,
    computation: Lane,
    graphics: Lane,
    receiving: ReentrantMutex<()>,
}

/// One environment's queue and whether a drain task for it is outstanding.
#[derive(Default)]
struct Lane {
    queue: Mutex<VecDeque<Message>>,
    drain_scheduled: AtomicBool,
}

/// Travels with a drain task. If the scheduler drops the task without
/// running it (`clear`, `remove_task`), the lane is marked as having no
/// drain outstanding so the next push schedules a fresh one.
struct DrainTicket {
    mailbox: Weak<Mailbox>,
    environment: ExecutionEnvironment,
    armed: bool,
}

impl DrainTicket {
    fn redeem(mut self) -> Option<Arc<Mailbox>> {
        self.armed = false;
        self.mailbox.upgrade()
    }
}

impl Drop for DrainTicket {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // May run under the scheduler's own lock, so only the flag is touched.
        if let Some(mailbox) = self.mailbox.upgrade() {
            trace!(environment = %self.environment, "Drain task discarded unrun");
            mailbox
                .lane(self.environment)
                .drain_scheduled
                .store(false, AtomicOrdering::Release);
        }
    }
}

impl Mailbox {
    /// Creates an unbounded mailbox.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Arc<Self> {
        Self::with_capacity(scheduler, None)
    }

    /// Creates a mailbox whose queues each hold at most `capacity` messages.
    ///
    /// Coalescing pushes that replace a queued message are always accepted.
    pub fn with_capacity(scheduler: Arc<dyn Scheduler>, capacity: Option<usize>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            scheduler,
            capacity,
            push_lock: Mutex::new(()),
            computation: Lane::default(),
            graphics: Lane::default(),
            receiving: ReentrantMutex::new(()),
        })
    }

    fn lane(&self, environment: ExecutionEnvironment) -> &Lane {
        match environment {
            ExecutionEnvironment::Computation => &self.computation,
            ExecutionEnvironment::Graphics => &self.graphics,
        }
    }

    fn queue(&self, environment: ExecutionEnvironment) -> &Mutex<VecDeque<Message>> {
        &self.lane(environment).queue
    }

    /// Enqueues a message on the queue of its environment.
    ///
    /// A [`DuplicationStrategy::ReplaceNewest`] message replaces a queued
    /// `ReplaceNewest` message with the same identifier at that message's
    /// position; the replaced message is dropped without running.
    pub fn push(&self, message: Message) -> Result<(), MailboxError> {
        self.enqueue(message, self.capacity)
    }

    /// Like [`push`](Self::push), but ignores the capacity bound.
    ///
    /// For messages that complete work the owning object already started;
    /// rejecting them would leave that work unfinished.
    pub(crate) fn push_unbounded(&self, message: Message) -> Result<(), MailboxError> {
        self.enqueue(message, None)
    }

    fn enqueue(&self, message: Message, capacity: Option<usize>) -> Result<(), MailboxError> {
        let _pushing = self.push_lock.lock();
        let environment = message.environment();

        let replaced = {
            let mut queue = self.queue(environment).lock();
            let slot = match message.strategy() {
                DuplicationStrategy::ReplaceNewest => queue.iter_mut().find(|queued| {
                    queued.strategy() == DuplicationStrategy::ReplaceNewest
                        && queued.identifier() == message.identifier()
                }),
                DuplicationStrategy::None => None,
            };
            match slot {
                Some(slot) => Some(std::mem::replace(slot, message)),
                None => {
                    if let Some(capacity) = capacity {
                        if queue.len() >= capacity {
                            return Err(MailboxError::QueueFull {
                                environment,
                                capacity,
                            });
                        }
                    }
                    queue.push_back(message);
                    None
                }
            }
        };

        if let Some(replaced) = replaced {
            trace!(operation = replaced.operation(), "Coalesced queued message");
            // Dropped outside the queue lock: captured state may run arbitrary drops.
            drop(replaced);
        }
        if !self
            .lane(environment)
            .drain_scheduled
            .swap(true, AtomicOrdering::AcqRel)
        {
            self.schedule_drain(environment);
        }
        Ok(())
    }

    /// Hands a drain task to the scheduler. The lane's `drain_scheduled`
    /// flag must already be set.
    fn schedule_drain(&self, environment: ExecutionEnvironment) {
        let ticket = DrainTicket {
            mailbox: self.self_ref.clone(),
            environment,
            armed: true,
        };
        self.scheduler.add_task(Task::new(
            TaskConfig::new(MAILBOX_DRAIN_TASK).with_environment(environment),
            move || {
                if let Some(mailbox) = ticket.redeem() {
                    mailbox.receive(environment);
                }
            },
        ));
    }

    /// Schedules the next drain if messages remain, otherwise marks the lane
    /// idle. Under the push lock so a concurrent push cannot fall between
    /// the check and the flag update.
    fn finish_drain(&self, environment: ExecutionEnvironment) {
        let _pushing = self.push_lock.lock();
        if self.queue(environment).lock().is_empty() {
            self.lane(environment)
                .drain_scheduled
                .store(false, AtomicOrdering::Release);
        } else {
            self.schedule_drain(environment);
        }
    }

    /// Runs the front message of `environment`'s queue. Called only by the
    /// lane's outstanding drain task.
    fn receive(&self, environment: ExecutionEnvironment) {
        let _receiving = match environment {
            ExecutionEnvironment::Graphics => match self.receiving.try_lock() {
                Some(guard) => guard,
                None => {
                    trace!("Receive lock busy, rescheduling graphics drain");
                    self.schedule_drain(environment);
                    return;
                }
            },
            ExecutionEnvironment::Computation => self.receiving.lock(),
        };

        let message = self.queue(environment).lock().pop_front();
        if let Some(message) = message {
            let operation = message.operation();
            if panic::catch_unwind(AssertUnwindSafe(|| message.run())).is_err() {
                error!(operation, %environment, "Mailbox message panicked");
            }
        }

        self.finish_drain(environment);
    }

    /// Acquires the receive lock, excluding every message of this mailbox.
    ///
    /// Re-entrant on the holding thread.
    pub fn lock_receiving(&self) -> ReentrantMutexGuard<'_, ()> {
        self.receiving.lock()
    }

    /// Number of queued messages in `environment`.
    pub fn len(&self, environment: ExecutionEnvironment) -> usize {
        self.queue(environment).lock().len()
    }

    pub fn is_empty(&self) -> bool {
        ExecutionEnvironment::ALL
            .iter()
            .all(|environment| self.queue(*environment).lock().is_empty())
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }
}

impl std::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("computation", &self.len(ExecutionEnvironment::Computation))
            .field("graphics", &self.len(ExecutionEnvironment::Graphics))
            .field("capacity", &self.capacity)
            .finish()
    }
}
