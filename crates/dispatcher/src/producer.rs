//! Producer - publishes records through the broker client
//!
//! Values are encoded before publishing: bytes and text pass through,
//! readers are drained, structured values are JSON-encoded. The current
//! trace id is attached as the `traceId` header unless one is already set.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use contracts::{BrokerClient, Record, RecordHeader};

use crate::error::DispatcherError;

/// Header carrying the trace id
pub const TRACE_HEADER: &str = "traceId";

tokio::task_local! {
    static TRACE_ID: String;
}

/// Run `fut` with `trace_id` as the current trace id
pub async fn with_trace_id<F: Future>(trace_id: impl Into<String>, fut: F) -> F::Output {
    TRACE_ID.scope(trace_id.into(), fut).await
}

/// Trace id of the current task, if any
pub fn current_trace_id() -> Option<String> {
    TRACE_ID.try_with(Clone::clone).ok()
}

/// Completion callback of `publish_async`
pub type PublishCallback = Box<dyn FnOnce(Result<Record, DispatcherError>) + Send + 'static>;

/// A value to publish
pub enum MessageValue {
    /// Raw bytes, passed through
    Bytes(Bytes),
    /// Text, passed through as UTF-8
    Text(String),
    /// Reader drained to the end
    Reader(Box<dyn AsyncRead + Send + Unpin>),
    /// JSON-encoded value
    Structured(serde_json::Value),
}

impl MessageValue {
    pub fn reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::Reader(Box::new(reader))
    }

    /// Capture any serializable value for JSON encoding
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::Structured)
    }

    /// Encode into the record payload
    pub async fn encode(self, topic: &str) -> Result<Bytes, DispatcherError> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Text(text) => Ok(Bytes::from(text)),
            Self::Reader(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
            Self::Structured(value) => serde_json::to_vec(&value)
                .map(Bytes::from)
                .map_err(|e| DispatcherError::encode(topic, e.to_string())),
        }
    }
}

impl fmt::Debug for MessageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Text(t) => f.debug_tuple("Text").field(t).finish(),
            Self::Reader(_) => f.write_str("Reader(..)"),
            Self::Structured(v) => f.debug_tuple("Structured").field(v).finish(),
        }
    }
}

impl From<Bytes> for MessageValue {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for MessageValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<&[u8]> for MessageValue {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(Bytes::copy_from_slice(value))
    }
}

impl From<String> for MessageValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MessageValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<serde_json::Value> for MessageValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Structured(value)
    }
}

/// Publishes records through a shared broker client
pub struct Producer<B: BrokerClient> {
    name: String,
    client: Arc<B>,
}

impl<B: BrokerClient> Clone for Producer<B> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            client: Arc::clone(&self.client),
        }
    }
}

impl<B: BrokerClient> Producer<B> {
    pub fn new(name: impl Into<String>, client: Arc<B>) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publish and wait for the broker acknowledgement
    #[instrument(name = "producer_publish", skip(self, key, value, headers), fields(producer = %self.name))]
    pub async fn publish(
        &self,
        topic: &str,
        key: Option<Bytes>,
        value: impl Into<MessageValue>,
        headers: Vec<RecordHeader>,
    ) -> Result<Record, DispatcherError> {
        let record = build_record(topic, key, value.into(), headers, current_trace_id()).await?;
        let record = self.client.produce(record).await?;
        debug!(partition = record.partition, offset = record.offset, "Record published");
        Ok(record)
    }

    /// Publish in the background
    ///
    /// Returns immediately; `callback` receives the outcome. Without a
    /// callback, failures are only logged.
    pub fn publish_async(
        &self,
        topic: &str,
        key: Option<Bytes>,
        value: impl Into<MessageValue>,
        headers: Vec<RecordHeader>,
        callback: Option<PublishCallback>,
    ) -> JoinHandle<()> {
        let trace_id = current_trace_id();
        let client = Arc::clone(&self.client);
        let producer = self.name.clone();
        let topic = topic.to_string();
        let value = value.into();

        tokio::spawn(async move {
            let result = match build_record(&topic, key, value, headers, trace_id).await {
                Ok(record) => client.produce(record).await.map_err(DispatcherError::from),
                Err(e) => Err(e),
            };
            match callback {
                Some(callback) => callback(result),
                None => {
                    if let Err(e) = result {
                        warn!(producer = %producer, topic = %topic, error = %e, "Async publish failed");
                    }
                }
            }
        })
    }
}

async fn build_record(
    topic: &str,
    key: Option<Bytes>,
    value: MessageValue,
    mut headers: Vec<RecordHeader>,
    trace_id: Option<String>,
) -> Result<Record, DispatcherError> {
    let payload = value.encode(topic).await?;
    inject_trace_id(&mut headers, trace_id);

    let mut record = Record::new(topic, payload);
    record.key = key;
    record.headers = headers;
    Ok(record)
}

fn inject_trace_id(headers: &mut Vec<RecordHeader>, trace_id: Option<String>) {
    let Some(trace_id) = trace_id.filter(|id| !id.is_empty()) else {
        return;
    };
    if headers.iter().any(|h| h.key == TRACE_HEADER) {
        return;
    }
    headers.push(RecordHeader::new(TRACE_HEADER, trace_id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker::MemoryBroker;
    use tokio::sync::oneshot;

    #[derive(Serialize)]
    struct Order {
        id: u32,
        item: &'static str,
    }

    fn producer() -> (Arc<MemoryBroker>, Producer<MemoryBroker>) {
        let broker = Arc::new(MemoryBroker::new());
        (Arc::clone(&broker), Producer::new("test", broker))
    }

    #[tokio::test]
    async fn test_publish_passes_bytes_and_text_through() {
        let (broker, producer) = producer();

        producer
            .publish("raw", None, vec![0_u8, 159, 146, 150], vec![])
            .await
            .unwrap();
        producer
            .publish("text", Some(Bytes::from_static(b"k")), "hello", vec![])
            .await
            .unwrap();

        let produced = broker.produced();
        assert_eq!(&produced[0].value[..], &[0_u8, 159, 146, 150]);
        assert_eq!(&produced[1].value[..], b"hello");
        assert_eq!(produced[1].key.as_deref(), Some(&b"k"[..]));
    }

    #[tokio::test]
    async fn test_publish_structured_as_json() {
        let (broker, producer) = producer();
        let value = MessageValue::structured(&Order { id: 7, item: "book" }).unwrap();

        let record = producer.publish("orders", None, value, vec![]).await.unwrap();
        let decoded: serde_json::Value = serde_json::from_slice(&record.value).unwrap();
        assert_eq!(decoded, serde_json::json!({"id": 7, "item": "book"}));
        assert_eq!(broker.produced().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_drains_reader() {
        let (_broker, producer) = producer();
        let reader = std::io::Cursor::new(b"streamed payload".to_vec());

        let record = producer
            .publish("stream", None, MessageValue::reader(reader), vec![])
            .await
            .unwrap();
        assert_eq!(&record.value[..], b"streamed payload");
    }

    #[tokio::test]
    async fn test_trace_id_injected_when_absent() {
        let (_broker, producer) = producer();

        let record = with_trace_id("trace-123", producer.publish("t", None, "v", vec![]))
            .await
            .unwrap();
        assert_eq!(record.header(TRACE_HEADER).map(|v| &v[..]), Some(&b"trace-123"[..]));

        let record = producer.publish("t", None, "v", vec![]).await.unwrap();
        assert!(record.header(TRACE_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_existing_trace_header_wins() {
        let (_broker, producer) = producer();
        let headers = vec![RecordHeader::new(TRACE_HEADER, "caller")];

        let record = with_trace_id("ambient", producer.publish("t", None, "v", headers))
            .await
            .unwrap();
        let values: Vec<&[u8]> = record
            .headers
            .iter()
            .filter(|h| h.key == TRACE_HEADER)
            .map(|h| &h.value[..])
            .collect();
        assert_eq!(values, vec![&b"caller"[..]]);
    }

    #[tokio::test]
    async fn test_publish_error_propagates() {
        let (broker, producer) = producer();
        broker.close();

        let err = producer.publish("t", None, "v", vec![]).await.unwrap_err();
        assert!(matches!(err, DispatcherError::Contract(_)));
    }

    #[tokio::test]
    async fn test_publish_async_invokes_callback_with_trace() {
        let (broker, producer) = producer();
        let (tx, rx) = oneshot::channel();

        with_trace_id("async-trace", async {
            producer.publish_async(
                "t",
                None,
                "v",
                vec![],
                Some(Box::new(move |result| {
                    let _ = tx.send(result);
                })),
            );
        })
        .await;

        let record = rx.await.unwrap().unwrap();
        assert_eq!(record.header(TRACE_HEADER).map(|v| &v[..]), Some(&b"async-trace"[..]));
        assert_eq!(broker.produced().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_async_without_callback() {
        let (broker, producer) = producer();

        producer
            .publish_async("t", None, "v", vec![], None)
            .await
            .unwrap();
        assert_eq!(broker.produced().len(), 1);

        // Failure without a callback is only logged
        broker.close();
        producer
            .publish_async("t", None, "v", vec![], None)
            .await
            .unwrap();
        assert_eq!(broker.produced().len(), 1);
    }
}
