//! RuntimeConfig - Config Loader output
//!
//! Describes the whole runtime: service tuning, broker connection and the
//! consumers declared up front.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Poll loop and worker tuning
    #[serde(default)]
    pub service: ServiceSettings,

    /// Broker connection
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Consumers registered at startup
    #[serde(default)]
    pub consumers: Vec<ConsumerConfig>,
}

/// Poll loop and worker tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service name (used in logs)
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Passed through to handlers; also drives broker auto-commit
    #[serde(default = "default_auto_commit")]
    pub auto_commit: bool,

    /// Per-topic hand-off queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Time-based flush interval for batching consumers
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Delay before restarting a crashed generation
    #[serde(default = "default_restart_backoff_ms")]
    pub restart_backoff_ms: u64,

    /// Delay before re-checking an empty consumer registry
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    /// When topic workers are torn down
    #[serde(default)]
    pub worker_lifecycle: WorkerLifecycle,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            auto_commit: default_auto_commit(),
            queue_capacity: default_queue_capacity(),
            flush_interval_ms: default_flush_interval_ms(),
            restart_backoff_ms: default_restart_backoff_ms(),
            idle_backoff_ms: default_idle_backoff_ms(),
            worker_lifecycle: WorkerLifecycle::default(),
        }
    }
}

fn default_service_name() -> String {
    "topic-dispatch".to_string()
}

fn default_auto_commit() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_restart_backoff_ms() -> u64 {
    3000
}

fn default_idle_backoff_ms() -> u64 {
    3000
}

/// Worker teardown policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerLifecycle {
    /// Workers live until the generation ends; the flush timer drives time-based batching
    #[default]
    Persistent,
    /// Workers are closed and drained after every poll call
    PerPoll,
}

/// Broker backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerKind {
    /// In-process broker (tests, demos)
    #[default]
    Memory,
    /// Kafka cluster
    Kafka,
}

/// Broker connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Backend type
    #[serde(default)]
    pub kind: BrokerKind,

    /// Seed brokers (host:port)
    #[serde(default)]
    pub brokers: Vec<String>,

    /// Client identifier
    #[serde(default)]
    pub client_id: Option<String>,

    /// Consumer group
    #[serde(default)]
    pub consumer_group: Option<String>,

    /// Maximum records returned by one poll
    #[serde(default = "default_poll_max_records")]
    pub poll_max_records: usize,

    /// Extra client properties passed through to the backend
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: BrokerKind::default(),
            brokers: Vec::new(),
            client_id: None,
            consumer_group: None,
            poll_max_records: default_poll_max_records(),
            properties: HashMap::new(),
        }
    }
}

fn default_poll_max_records() -> usize {
    500
}

/// Consumer declared in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Topic to consume
    pub topic: String,

    /// Accumulate records into batches
    #[serde(default)]
    pub batch: bool,

    /// Batch size that triggers a flush
    #[serde(default = "default_batch_max_count")]
    pub batch_max_count: usize,

    /// Built-in handler to attach
    #[serde(default)]
    pub handler: HandlerKind,
}

fn default_batch_max_count() -> usize {
    1
}

/// Built-in handler types available from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    /// Log each record via tracing
    #[default]
    Log,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_defaults() {
        let settings = ServiceSettings::default();
        assert!(settings.auto_commit);
        assert_eq!(settings.queue_capacity, 1024);
        assert_eq!(settings.flush_interval_ms, 1000);
        assert_eq!(settings.restart_backoff_ms, 3000);
        assert_eq!(settings.worker_lifecycle, WorkerLifecycle::Persistent);
    }

    #[test]
    fn test_consumer_defaults_from_json() {
        let consumer: ConsumerConfig = serde_json::from_str(r#"{ "topic": "orders" }"#).unwrap();
        assert!(!consumer.batch);
        assert_eq!(consumer.batch_max_count, 1);
        assert_eq!(consumer.handler, HandlerKind::Log);
    }

    #[test]
    fn test_lifecycle_snake_case() {
        let lifecycle: WorkerLifecycle = serde_json::from_str(r#""per_poll""#).unwrap();
        assert_eq!(lifecycle, WorkerLifecycle::PerPoll);
    }
}
