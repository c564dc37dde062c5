//! Broker error types

use contracts::ContractError;
use thiserror::Error;

/// Broker construction errors
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Invalid broker settings
    #[error("invalid broker config: {message}")]
    InvalidConfig { message: String },

    /// Backend not compiled in
    #[error("broker backend '{backend}' is not available; rebuild with feature '{feature}'")]
    Unsupported {
        backend: &'static str,
        feature: &'static str,
    },

    /// Kafka client error
    #[cfg(feature = "kafka")]
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl BrokerError {
    /// Create invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, BrokerError>;
