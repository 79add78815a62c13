//! Mailbox messages.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::scheduler::ExecutionEnvironment;

/// What a mailbox does when a message with an already-queued identifier
/// arrives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DuplicationStrategy {
    /// Always append.
    #[default]
    None,
    /// Replace the queued message with the same identifier in place, keeping
    /// its position in the queue.
    ReplaceNewest,
}

/// Computes the coalescing identifier for an operation on a target object.
///
/// Two messages share an identifier exactly when they address the same
/// object (by address) and name the same operation.
pub fn coalescing_identifier(target_address: usize, operation: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    target_address.hash(&mut hasher);
    operation.hash(&mut hasher);
    hasher.finish()
}

/// A deferred operation queued on a [`Mailbox`](super::Mailbox).
pub struct Message {
    strategy: DuplicationStrategy,
    environment: ExecutionEnvironment,
    identifier: u64,
    operation: &'static str,
    work: Box<dyn FnOnce() + Send + 'static>,
}

impl Message {
    pub fn new<F>(
        environment: ExecutionEnvironment,
        strategy: DuplicationStrategy,
        identifier: u64,
        operation: &'static str,
        work: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            strategy,
            environment,
            identifier,
            operation,
            work: Box::new(work),
        }
    }

    pub fn strategy(&self) -> DuplicationStrategy {
        self.strategy
    }

    pub fn environment(&self) -> ExecutionEnvironment {
        self.environment
    }

    pub fn identifier(&self) -> u64 {
        self.identifier
    }

    /// Operation name, used for coalescing and diagnostics.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub(crate) fn run(self) {
        (self.work)()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("operation", &self.operation)
            .field("environment", &self.environment)
            .field("strategy", &self.strategy)
            .field("identifier", &self.identifier)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_depends_on_target_and_operation() {
        let a = coalescing_identifier(0x1000, "update");
        assert_eq!(a, coalescing_identifier(0x1000, "update"));
        assert_ne!(a, coalescing_identifier(0x2000, "update"));
        assert_ne!(a, coalescing_identifier(0x1000, "reload"));
    }
}
