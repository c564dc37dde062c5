//! Kafka broker client
//!
//! `StreamConsumer` for polling, `FutureProducer` for publishing. Both are
//! configured from the same `BrokerConfig`; consumer-only settings are
//! applied to the consumer alone.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::message::{BorrowedMessage, Header, Headers, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::{ClientConfig, Message, TopicPartitionList};
use tracing::{debug, error, info, instrument, warn};

use contracts::{
    BrokerClient, BrokerConfig, CancellationToken, ContractError, PollBatch, Record, RecordHeader,
};

use crate::error::{BrokerError, Result};

/// Producer flush timeout on close
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Kafka broker client
pub struct KafkaBroker {
    consumer: StreamConsumer,
    producer: FutureProducer,
    /// Union of subscribed topics
    topics: Mutex<BTreeSet<String>>,
    paused: Mutex<HashSet<String>>,
    /// Errors seen after records were already collected; reported by the next poll
    deferred_errors: Mutex<Vec<ContractError>>,
    closed: AtomicBool,
    poll_max_records: usize,
}

impl KafkaBroker {
    /// Create the consumer and producer
    ///
    /// `auto_commit` maps to `enable.auto.commit` on the consumer.
    #[instrument(name = "kafka_broker_create", skip(config), fields(brokers = ?config.brokers))]
    pub fn from_config(config: &BrokerConfig, auto_commit: bool) -> Result<Self> {
        if config.brokers.is_empty() {
            return Err(BrokerError::invalid_config("kafka requires at least one broker"));
        }
        let group = config
            .consumer_group
            .as_deref()
            .filter(|g| !g.trim().is_empty())
            .ok_or_else(|| BrokerError::invalid_config("kafka requires a consumer group"))?;

        let mut base = ClientConfig::new();
        base.set("bootstrap.servers", config.brokers.join(","));
        if let Some(client_id) = &config.client_id {
            base.set("client.id", client_id);
        }
        for (key, value) in &config.properties {
            base.set(key, value);
        }

        let producer: FutureProducer = base.create()?;

        let mut consumer_config = base.clone();
        consumer_config
            .set("group.id", group)
            .set("enable.auto.commit", if auto_commit { "true" } else { "false" });
        let consumer: StreamConsumer = consumer_config.create()?;

        info!(group, auto_commit, "Kafka broker created");

        Ok(Self {
            consumer,
            producer,
            topics: Mutex::new(BTreeSet::new()),
            paused: Mutex::new(HashSet::new()),
            deferred_errors: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            poll_max_records: config.poll_max_records.max(1),
        })
    }

    /// Partitions of `topic` currently assigned to this consumer
    fn assigned_partitions(&self, topic: &str) -> KafkaResult<TopicPartitionList> {
        let assignment = self.consumer.assignment()?;
        let mut partitions = TopicPartitionList::new();
        for elem in assignment.elements_for_topic(topic) {
            partitions.add_partition(topic, elem.partition());
        }
        Ok(partitions)
    }

    fn collect(&self, message: KafkaResult<BorrowedMessage<'_>>, batch: &mut PollBatch) -> bool {
        match message {
            Ok(message) => {
                batch.records.push(to_record(&message));
                true
            }
            Err(e) => {
                let error = ContractError::BrokerConnection {
                    message: e.to_string(),
                };
                if batch.records.is_empty() {
                    batch.errors.push(error);
                } else {
                    lock(&self.deferred_errors).push(error);
                }
                false
            }
        }
    }
}

impl BrokerClient for KafkaBroker {
    async fn poll_batch(&self, scope: &CancellationToken) -> PollBatch {
        if self.closed.load(Ordering::Acquire) {
            return PollBatch::closed();
        }

        let deferred = std::mem::take(&mut *lock(&self.deferred_errors));
        if !deferred.is_empty() {
            return PollBatch::errors(deferred);
        }

        let first = tokio::select! {
            _ = scope.cancelled() => return PollBatch::default(),
            message = self.consumer.recv() => message,
        };

        let mut batch = PollBatch::default();
        if !self.collect(first, &mut batch) {
            return batch;
        }
        while batch.records.len() < self.poll_max_records {
            match self.consumer.recv().now_or_never() {
                Some(message) => {
                    if !self.collect(message, &mut batch) {
                        break;
                    }
                }
                None => break,
            }
        }
        batch
    }

    fn subscribe(&self, topic: &str) {
        let topics: Vec<String> = {
            let mut topics = lock(&self.topics);
            topics.insert(topic.to_string());
            topics.iter().cloned().collect()
        };
        let refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        if let Err(e) = self.consumer.subscribe(&refs) {
            error!(topic, error = %e, "Kafka subscribe failed");
            return;
        }

        if lock(&self.paused).remove(topic) {
            match self.assigned_partitions(topic) {
                Ok(partitions) if partitions.count() > 0 => {
                    if let Err(e) = self.consumer.resume(&partitions) {
                        warn!(topic, error = %e, "Kafka resume failed");
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(topic, error = %e, "Kafka assignment lookup failed"),
            }
        }
        debug!(topic, topics = refs.len(), "Kafka subscribed");
    }

    // Partitions assigned after a rebalance are not paused; their records
    // reach the service as an unknown topic and are dropped there.
    fn pause(&self, topic: &str) {
        lock(&self.paused).insert(topic.to_string());
        match self.assigned_partitions(topic) {
            Ok(partitions) if partitions.count() > 0 => {
                if let Err(e) = self.consumer.pause(&partitions) {
                    warn!(topic, error = %e, "Kafka pause failed");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(topic, error = %e, "Kafka assignment lookup failed"),
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.consumer.unsubscribe();
        if let Err(e) = self.producer.flush(Timeout::After(CLOSE_FLUSH_TIMEOUT)) {
            warn!(error = %e, "Kafka producer flush failed on close");
        }
        info!("Kafka broker closed");
    }

    #[instrument(name = "kafka_broker_produce", skip(self, record), fields(topic = %record.topic))]
    async fn produce(&self, record: Record) -> std::result::Result<Record, ContractError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ContractError::BrokerClosed);
        }

        let mut headers = OwnedHeaders::new_with_capacity(record.headers.len());
        for header in &record.headers {
            headers = headers.insert(Header {
                key: &header.key,
                value: Some(&header.value[..]),
            });
        }

        let mut future_record: FutureRecord<'_, [u8], [u8]> =
            FutureRecord::to(&record.topic).payload(&record.value[..]).headers(headers);
        if let Some(key) = &record.key {
            future_record = future_record.key(&key[..]);
        }

        match self.producer.send(future_record, Timeout::Never).await {
            Ok((partition, offset)) => Ok(record.with_position(partition, offset)),
            Err((e, _)) => Err(ContractError::produce(&record.topic, e.to_string())),
        }
    }
}

fn to_record(message: &BorrowedMessage<'_>) -> Record {
    let value = Bytes::copy_from_slice(message.payload().unwrap_or_default());
    let mut record =
        Record::new(message.topic(), value).with_position(message.partition(), message.offset());
    record.key = message.key().map(Bytes::copy_from_slice);
    if let Some(headers) = message.headers() {
        record.headers = headers
            .iter()
            .map(|h| RecordHeader::new(h.key, Bytes::copy_from_slice(h.value.unwrap_or_default())))
            .collect();
    }
    record.timestamp_ms = message.timestamp().to_millis();
    record
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
