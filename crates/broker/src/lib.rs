//! # Broker
//!
//! Broker client implementations of `contracts::BrokerClient`.
//!
//! - `MemoryBroker`: in-process broker for tests and demos
//! - `KafkaBroker`: Kafka cluster via librdkafka
//! - `Broker`: runtime selection between the two from `BrokerConfig`
//!
//! ## Feature Flags
//!
//! - `kafka`: Enable the Kafka client (requires rdkafka)

pub mod any;
pub mod error;
pub mod memory;

#[cfg(feature = "kafka")]
pub mod kafka;

pub use any::Broker;
pub use contracts::{BrokerClient, PollBatch};
pub use error::{BrokerError, Result};
pub use memory::{MemoryBroker, MemoryBrokerConfig};

#[cfg(feature = "kafka")]
pub use kafka::KafkaBroker;
