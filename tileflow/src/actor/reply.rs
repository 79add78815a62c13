//! Reply handles for asks.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::MailboxError;

type Outcome<R> = Result<R, MailboxError>;

enum State<R> {
    Pending(oneshot::Receiver<Outcome<R>>),
    Failed(Option<MailboxError>),
}

/// The eventual result of an ask.
///
/// Resolves with the operation's return value, with
/// [`MailboxError::ReceiverExpired`] if the target was gone when the message
/// ran, or with [`MailboxError::MessageDropped`] if the message never ran.
/// Can be waited on synchronously, polled, or awaited.
pub struct Reply<R> {
    state: State<R>,
}

impl<R> Reply<R> {
    pub(crate) fn pending(receiver: oneshot::Receiver<Outcome<R>>) -> Self {
        Self {
            state: State::Pending(receiver),
        }
    }

    pub(crate) fn failed(error: MailboxError) -> Self {
        Self {
            state: State::Failed(Some(error)),
        }
    }

    /// Blocks the calling thread until the reply arrives.
    ///
    /// Must not be called from a message running on the same mailbox, which
    /// could never complete.
    pub fn wait(self) -> Outcome<R> {
        futures::executor::block_on(self)
    }

    /// Takes the reply if it has arrived, without blocking.
    ///
    /// Returns `None` while the ask is still pending. After a value has been
    /// taken, further calls report [`MailboxError::MessageDropped`].
    pub fn try_take(&mut self) -> Option<Outcome<R>> {
        match &mut self.state {
            State::Pending(receiver) => match receiver.try_recv() {
                Ok(outcome) => {
                    self.state = State::Failed(None);
                    Some(outcome)
                }
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => {
                    Some(Err(MailboxError::MessageDropped))
                }
            },
            State::Failed(error) => {
                Some(Err(error.take().unwrap_or(MailboxError::MessageDropped)))
            }
        }
    }
}

impl<R> Future for Reply<R> {
    type Output = Outcome<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            State::Pending(receiver) => Pin::new(receiver)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(MailboxError::MessageDropped))),
            State::Failed(error) => {
                Poll::Ready(Err(error.take().unwrap_or(MailboxError::MessageDropped)))
            }
        }
    }
}

impl<R> std::fmt::Debug for Reply<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Pending(_) => "pending",
            State::Failed(_) => "failed",
        };
        f.debug_struct("Reply").field("state", &state).finish()
    }
}
