//! Error types shared across the crate.
//!
//! Each concern owns a small `thiserror` enum. Errors that cross the
//! asynchronous boundary (mailbox replies, decode results) are `Clone` so
//! they can be delivered to more than one observer.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::scheduler::ExecutionEnvironment;

/// Errors surfaced by mailboxes and actor references.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailboxError {
    /// The object a message or ask was addressed to no longer exists.
    #[error("mailbox receiver has expired")]
    ReceiverExpired,

    /// The message was discarded before it ran (replaced, cleared or the
    /// mailbox itself was dropped).
    #[error("message was dropped before it was processed")]
    MessageDropped,

    /// A bounded queue refused a new message.
    #[error("{environment} queue is full (capacity {capacity})")]
    QueueFull {
        environment: ExecutionEnvironment,
        capacity: usize,
    },
}

/// Errors produced by a [`TileDecoder`](crate::source::TileDecoder).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The payload could not be interpreted.
    #[error("malformed tile payload: {0}")]
    Malformed(String),

    /// The payload is well-formed but uses a feature the decoder lacks.
    #[error("unsupported tile payload: {0}")]
    Unsupported(String),

    /// Reading auxiliary data failed.
    #[error("I/O error while decoding: {0}")]
    Io(String),
}

impl From<io::Error> for DecodeError {
    fn from(error: io::Error) -> Self {
        DecodeError::Io(error.to_string())
    }
}

/// Errors raised while spawning scheduler workers.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to spawn worker thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Errors raised while constructing loaders.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// A file loader root does not exist or is not a directory.
    #[error("loader root is not a directory: {0}")]
    InvalidRoot(PathBuf),
}

/// Errors raised while reading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The configuration parsed but describes an unusable layer.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
