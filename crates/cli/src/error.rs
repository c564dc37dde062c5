//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Broker construction error
    #[error("Failed to create {kind} broker: {message}")]
    BrokerSetup { kind: String, message: String },

    /// Service already running
    #[error("Service '{name}' is already running")]
    AlreadyRunning { name: String },

    /// Demo publishing error
    #[error("Failed to publish demo record to '{topic}': {message}")]
    DemoPublish { topic: String, message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn broker_setup(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BrokerSetup {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn already_running(name: impl Into<String>) -> Self {
        Self::AlreadyRunning { name: name.into() }
    }

    pub fn demo_publish(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DemoPublish {
            topic: topic.into(),
            message: message.into(),
        }
    }
}
