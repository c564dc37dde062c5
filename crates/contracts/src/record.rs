//! Record - the unit of delivery between broker, poll loop and handlers

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single key/value header attached to a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub key: String,
    pub value: Bytes,
}

impl RecordHeader {
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A record polled from (or produced to) a broker topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Topic name, the fan-out key
    pub topic: String,
    /// Partition within the topic (-1 = unassigned)
    pub partition: i32,
    /// Offset within the partition (-1 = not yet written)
    pub offset: i64,
    /// Optional record key
    pub key: Option<Bytes>,
    /// Encoded value
    pub value: Bytes,
    /// Record headers, in insertion order
    #[serde(default)]
    pub headers: Vec<RecordHeader>,
    /// Broker timestamp (unix millis)
    pub timestamp_ms: Option<i64>,
}

impl Record {
    /// Create an unassigned record for `topic`
    pub fn new(topic: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            partition: -1,
            offset: -1,
            key: None,
            value: value.into(),
            headers: Vec::new(),
            timestamp_ms: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.headers.push(RecordHeader::new(key, value));
        self
    }

    pub fn with_position(mut self, partition: i32, offset: i64) -> Self {
        self.partition = partition;
        self.offset = offset;
        self
    }

    /// First header value stored under `key`
    pub fn header(&self, key: &str) -> Option<&Bytes> {
        self.headers.iter().find(|h| h.key == key).map(|h| &h.value)
    }
}
