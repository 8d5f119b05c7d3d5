//! # Bus Errors

use thiserror::Error;

/// Errors raised by the bus or by its listeners.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// A listener failed while handling a message.
    #[error("Listener failed on message {msg_id}: {reason}")]
    ListenerFailed { msg_id: i32, reason: String },

    /// A transactional listener asked the caller to roll back.
    #[error("Transaction aborted by listener {listener}: {reason}")]
    TransactionAborted { listener: String, reason: String },

    /// `start` was called outside of a tokio runtime.
    #[error("No tokio runtime available to run the delivery worker")]
    NoRuntime,

    /// `start` was called twice.
    #[error("Delivery worker already started")]
    AlreadyStarted,
}

impl BusError {
    /// Shorthand for a listener failure.
    pub fn listener(msg_id: i32, reason: impl Into<String>) -> Self {
        Self::ListenerFailed {
            msg_id,
            reason: reason.into(),
        }
    }
}
