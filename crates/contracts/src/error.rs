//! Layered error definitions
//!
//! Categorized by source: config / broker / handler / encode

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Broker Errors =====
    /// Broker connection error
    #[error("broker connection error: {message}")]
    BrokerConnection { message: String },

    /// Fetch error reported alongside a polled batch
    #[error("fetch error on '{topic}'[{partition}]: {message}")]
    Fetch {
        topic: String,
        partition: i32,
        message: String,
    },

    /// Produce error
    #[error("produce to '{topic}' failed: {message}")]
    Produce { topic: String, message: String },

    /// Broker client has been closed
    #[error("broker client is closed")]
    BrokerClosed,

    // ===== Handler Errors =====
    /// Handler reported a failure for a batch
    #[error("handler for '{topic}' failed: {message}")]
    Handler { topic: String, message: String },

    // ===== Encoding Errors =====
    /// Value encoding error
    #[error("encode error: {message}")]
    Encode { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create fetch error
    pub fn fetch(topic: impl Into<String>, partition: i32, message: impl Into<String>) -> Self {
        Self::Fetch {
            topic: topic.into(),
            partition,
            message: message.into(),
        }
    }

    /// Create produce error
    pub fn produce(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Produce {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create handler error
    pub fn handler(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create encode error
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }
}
