//! Actor mailboxes.
//!
//! Objects whose state is touched from several threads live behind a
//! [`Mailbox`]: callers queue closures ("messages") instead of calling
//! methods directly, and the mailbox runs them one at a time on the
//! [`Scheduler`](crate::scheduler::Scheduler).
//!
//! - [`Mailbox`]: two queues (computation, graphics) and one receive lock
//! - [`Message`]: a queued closure with a [`DuplicationStrategy`]
//! - [`Actor`] / [`WeakActor`]: typed handles that build messages
//! - [`Reply`]: the result of an ask

mod handle;
mod mailbox;
mod message;
mod reply;

pub use handle::{Actor, WeakActor};
pub use mailbox::{Mailbox, MAILBOX_DRAIN_TASK};
pub use message::{coalescing_identifier, DuplicationStrategy, Message};
pub use reply::Reply;
