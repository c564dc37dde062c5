//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Hand-off skipped because the worker scope was already cancelled
    #[error("hand-off skipped: worker scope already cancelled")]
    HandoffSkipped,

    /// Worker scope cancelled while waiting for queue space
    #[error("hand-off cancelled while waiting for queue space")]
    HandoffCancelled,

    /// Worker queue closed
    #[error("hand-off failed: worker queue closed")]
    HandoffClosed,

    /// Value encoding error
    #[error("failed to encode value for '{topic}': {message}")]
    Encode { topic: String, message: String },

    /// Broker or handler error (from contract)
    #[error("contract error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create an encode error
    pub fn encode(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encode {
            topic: topic.into(),
            message: message.into(),
        }
    }
}
