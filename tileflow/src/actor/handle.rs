//! Strong and weak references to an object that lives behind a mailbox.
//!
//! An [`Actor`] owns its object; a [`WeakActor`] does not keep it alive.
//! Messages and asks sent through either hold only a weak reference to the
//! object, so a queued message never extends the object's lifetime. If the
//! object is gone when the message runs, the message is dropped with a
//! warning and any ask resolves with [`MailboxError::ReceiverExpired`].
//!
//! # Example
//!
//! ```ignore
//! let mailbox = Mailbox::new(scheduler);
//! let counter = Actor::new(mailbox, 0u32);
//!
//! counter.send("increment", |value| *value += 1);
//! let reply = counter.ask(ExecutionEnvironment::Computation, "read", |value| *value);
//! assert_eq!(reply.wait(), Ok(1));
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::warn;

use super::mailbox::Mailbox;
use super::message::{coalescing_identifier, DuplicationStrategy, Message};
use super::reply::Reply;
use crate::error::MailboxError;
use crate::scheduler::ExecutionEnvironment;

/// Owning handle to an object processed through a [`Mailbox`].
///
/// The object is only ever touched by its messages, by
/// [`sync_access`](Actor::sync_access), or by code holding the mailbox's
/// receive lock. Code running inside a message must not call `sync_access`
/// or block on an ask addressed to the same actor.
pub struct Actor<T: Send + 'static> {
    object: Arc<Mutex<T>>,
    mailbox: Arc<Mailbox>,
}

impl<T: Send + 'static> Actor<T> {
    pub fn new(mailbox: Arc<Mailbox>, object: T) -> Self {
        Self {
            object: Arc::new(Mutex::new(object)),
            mailbox,
        }
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    pub fn downgrade(&self) -> WeakActor<T> {
        WeakActor {
            object: Arc::downgrade(&self.object),
            mailbox: Arc::downgrade(&self.mailbox),
        }
    }

    /// Queues `operation` with an explicit environment and strategy.
    pub fn message<F>(
        &self,
        environment: ExecutionEnvironment,
        strategy: DuplicationStrategy,
        operation: &'static str,
        work: F,
    ) -> Result<(), MailboxError>
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        let weak = Arc::downgrade(&self.object);
        self.mailbox
            .push(make_message(&weak, environment, strategy, operation, work))
    }

    /// Queues `operation` on the computation environment without coalescing.
    ///
    /// Push failures are logged and the message discarded.
    pub fn send<F>(&self, operation: &'static str, work: F)
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        if let Err(error) = self.message(
            ExecutionEnvironment::Computation,
            DuplicationStrategy::None,
            operation,
            work,
        ) {
            warn!(operation, %error, "Failed to queue message");
        }
    }

    /// Queues `operation` and returns a handle to its result.
    pub fn ask<R, F>(
        &self,
        environment: ExecutionEnvironment,
        operation: &'static str,
        work: F,
    ) -> Reply<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut T) -> R + Send + 'static,
    {
        let object = Arc::downgrade(&self.object);
        ask_via(&self.mailbox, &object, environment, operation, work)
    }

    /// Runs `f` on the calling thread while holding the mailbox receive lock.
    ///
    /// No message of this actor runs concurrently with `f`.
    pub fn sync_access<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _receiving = self.mailbox.lock_receiving();
        let mut object = self.object.lock();
        f(&mut object)
    }
}

impl<T: Send + 'static> Clone for Actor<T> {
    fn clone(&self) -> Self {
        Self {
            object: Arc::clone(&self.object),
            mailbox: Arc::clone(&self.mailbox),
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for Actor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actor").field("mailbox", &self.mailbox).finish()
    }
}

/// Non-owning handle to an actor.
///
/// Messages sent through a dead handle are dropped with a warning; asks
/// resolve with [`MailboxError::ReceiverExpired`].
pub struct WeakActor<T: Send + 'static> {
    object: Weak<Mutex<T>>,
    mailbox: Weak<Mailbox>,
}

impl<T: Send + 'static> WeakActor<T> {
    /// A handle that points at nothing.
    pub fn new() -> Self {
        Self {
            object: Weak::new(),
            mailbox: Weak::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.object.strong_count() > 0 && self.mailbox.strong_count() > 0
    }

    pub fn upgrade(&self) -> Option<Actor<T>> {
        Some(Actor {
            object: self.object.upgrade()?,
            mailbox: self.mailbox.upgrade()?,
        })
    }

    pub fn message<F>(
        &self,
        environment: ExecutionEnvironment,
        strategy: DuplicationStrategy,
        operation: &'static str,
        work: F,
    ) -> Result<(), MailboxError>
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        let mailbox = self.mailbox.upgrade().ok_or(MailboxError::ReceiverExpired)?;
        if self.object.strong_count() == 0 {
            return Err(MailboxError::ReceiverExpired);
        }
        mailbox.push(make_message(&self.object, environment, strategy, operation, work))
    }

    /// Like [`Actor::send`]; a dead target is logged at warn level.
    pub fn send<F>(&self, operation: &'static str, work: F)
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        if let Err(error) = self.message(
            ExecutionEnvironment::Computation,
            DuplicationStrategy::None,
            operation,
            work,
        ) {
            warn!(operation, %error, "Failed to queue message on weak actor");
        }
    }

    /// Queues `operation` on the computation environment, bypassing the
    /// mailbox capacity bound.
    ///
    /// For completions of work the object already started (a finished load
    /// or decode). Dropping those on a full queue would strand the work, so
    /// only a dead target discards them.
    pub(crate) fn deliver<F>(&self, operation: &'static str, work: F)
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        let mailbox = match self.mailbox.upgrade() {
            Some(mailbox) if self.object.strong_count() > 0 => mailbox,
            _ => {
                warn!(operation, "Completion target expired, dropping message");
                return;
            }
        };
        let message = make_message(
            &self.object,
            ExecutionEnvironment::Computation,
            DuplicationStrategy::None,
            operation,
            work,
        );
        if let Err(error) = mailbox.push_unbounded(message) {
            warn!(operation, %error, "Failed to queue completion");
        }
    }

    pub fn ask<R, F>(
        &self,
        environment: ExecutionEnvironment,
        operation: &'static str,
        work: F,
    ) -> Reply<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut T) -> R + Send + 'static,
    {
        match self.mailbox.upgrade() {
            Some(mailbox) => ask_via(&mailbox, &self.object, environment, operation, work),
            None => Reply::failed(MailboxError::ReceiverExpired),
        }
    }

    /// Like [`Actor::sync_access`], or `None` if the actor is gone.
    pub fn sync_access<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.upgrade().map(|actor| actor.sync_access(f))
    }
}

impl<T: Send + 'static> Default for WeakActor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Clone for WeakActor<T> {
    fn clone(&self) -> Self {
        Self {
            object: self.object.clone(),
            mailbox: self.mailbox.clone(),
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for WeakActor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakActor")
            .field("alive", &self.is_alive())
            .finish()
    }
}

// =============================================================================
// Message Construction
// =============================================================================

fn identifier_for<T>(object: &Weak<Mutex<T>>, operation: &str) -> u64 {
    coalescing_identifier(object.as_ptr() as *const () as usize, operation)
}

fn make_message<T, F>(
    object: &Weak<Mutex<T>>,
    environment: ExecutionEnvironment,
    strategy: DuplicationStrategy,
    operation: &'static str,
    work: F,
) -> Message
where
    T: Send + 'static,
    F: FnOnce(&mut T) + Send + 'static,
{
    let identifier = identifier_for(object, operation);
    let target = object.clone();
    Message::new(environment, strategy, identifier, operation, move || {
        match target.upgrade() {
            Some(object) => work(&mut object.lock()),
            None => warn!(operation, "Mailbox receiver expired, dropping message"),
        }
    })
}

fn ask_via<T, R, F>(
    mailbox: &Mailbox,
    object: &Weak<Mutex<T>>,
    environment: ExecutionEnvironment,
    operation: &'static str,
    work: F,
) -> Reply<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: FnOnce(&mut T) -> R + Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let identifier = identifier_for(object, operation);
    let target = object.clone();
    let message = Message::new(
        environment,
        DuplicationStrategy::None,
        identifier,
        operation,
        move || {
            let outcome = match target.upgrade() {
                Some(object) => Ok(work(&mut object.lock())),
                None => {
                    warn!(operation, "Mailbox receiver expired, failing ask");
                    Err(MailboxError::ReceiverExpired)
                }
            };
            // The caller may have stopped waiting.
            let _ = sender.send(outcome);
        },
    );
    match mailbox.push(message) {
        Ok(()) => Reply::pending(receiver),
        Err(error) => Reply::failed(error),
    }
}
