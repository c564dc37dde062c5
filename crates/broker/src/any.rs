//! Broker selected at runtime from `BrokerConfig`

use contracts::{
    BrokerClient, BrokerConfig, BrokerKind, CancellationToken, ContractError, PollBatch, Record,
};
use tracing::instrument;

use crate::error::Result;
use crate::memory::{MemoryBroker, MemoryBrokerConfig};

#[cfg(feature = "kafka")]
use crate::kafka::KafkaBroker;

/// Any supported broker backend
pub enum Broker {
    Memory(MemoryBroker),
    #[cfg(feature = "kafka")]
    Kafka(KafkaBroker),
}

impl Broker {
    /// Build the backend named by `config.kind`
    ///
    /// The memory backend loops produced records back into its queue and
    /// has no offsets, so it ignores `auto_commit`.
    #[instrument(name = "broker_from_config", skip(config), fields(kind = ?config.kind))]
    #[cfg_attr(not(feature = "kafka"), allow(unused_variables))]
    pub fn from_config(config: &BrokerConfig, auto_commit: bool) -> Result<Self> {
        match config.kind {
            BrokerKind::Memory => Ok(Self::Memory(MemoryBroker::with_config(MemoryBrokerConfig {
                poll_max_records: config.poll_max_records,
                loopback: true,
            }))),
            #[cfg(feature = "kafka")]
            BrokerKind::Kafka => Ok(Self::Kafka(KafkaBroker::from_config(config, auto_commit)?)),
            #[cfg(not(feature = "kafka"))]
            BrokerKind::Kafka => Err(crate::error::BrokerError::Unsupported {
                backend: "kafka",
                feature: "kafka",
            }),
        }
    }

    /// Backend name
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            #[cfg(feature = "kafka")]
            Self::Kafka(_) => "kafka",
        }
    }

    /// The memory backend, if selected
    pub fn as_memory(&self) -> Option<&MemoryBroker> {
        match self {
            Self::Memory(broker) => Some(broker),
            #[cfg(feature = "kafka")]
            Self::Kafka(_) => None,
        }
    }
}

impl BrokerClient for Broker {
    async fn poll_batch(&self, scope: &CancellationToken) -> PollBatch {
        match self {
            Self::Memory(broker) => broker.poll_batch(scope).await,
            #[cfg(feature = "kafka")]
            Self::Kafka(broker) => broker.poll_batch(scope).await,
        }
    }

    fn subscribe(&self, topic: &str) {
        match self {
            Self::Memory(broker) => broker.subscribe(topic),
            #[cfg(feature = "kafka")]
            Self::Kafka(broker) => broker.subscribe(topic),
        }
    }

    fn pause(&self, topic: &str) {
        match self {
            Self::Memory(broker) => broker.pause(topic),
            #[cfg(feature = "kafka")]
            Self::Kafka(broker) => broker.pause(topic),
        }
    }

    fn close(&self) {
        match self {
            Self::Memory(broker) => broker.close(),
            #[cfg(feature = "kafka")]
            Self::Kafka(broker) => broker.close(),
        }
    }

    async fn produce(&self, record: Record) -> std::result::Result<Record, ContractError> {
        match self {
            Self::Memory(broker) => broker.produce(record).await,
            #[cfg(feature = "kafka")]
            Self::Kafka(broker) => broker.produce(record).await,
        }
    }
}
