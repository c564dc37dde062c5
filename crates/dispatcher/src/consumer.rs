//! Consumer registration

use std::fmt;
use std::sync::Arc;

use contracts::{ConsumerConfig, HandlerKind, RecordHandler};

use crate::handlers::LogHandler;

/// A registered topic consumer
///
/// Batching with `batch_max_count <= 1` is normalized to passthrough when
/// the consumer is registered.
#[derive(Clone)]
pub struct Consumer {
    topic: String,
    batch: bool,
    batch_max_count: usize,
    handler: Arc<dyn RecordHandler>,
}

impl Consumer {
    /// Create a consumer owning `handler`
    pub fn new<H>(topic: impl Into<String>, batch: bool, batch_max_count: usize, handler: H) -> Self
    where
        H: RecordHandler + 'static,
    {
        Self::with_shared_handler(topic, batch, batch_max_count, Arc::new(handler))
    }

    /// Create a consumer around a handler shared with other consumers
    pub fn with_shared_handler(
        topic: impl Into<String>,
        batch: bool,
        batch_max_count: usize,
        handler: Arc<dyn RecordHandler>,
    ) -> Self {
        Self {
            topic: topic.into(),
            batch,
            batch_max_count,
            handler,
        }
    }

    /// Consumer that sees every record on its own
    pub fn single<H>(topic: impl Into<String>, handler: H) -> Self
    where
        H: RecordHandler + 'static,
    {
        Self::new(topic, false, 1, handler)
    }

    /// Consumer that receives up to `max_count` records per call
    pub fn batched<H>(topic: impl Into<String>, max_count: usize, handler: H) -> Self
    where
        H: RecordHandler + 'static,
    {
        Self::new(topic, true, max_count, handler)
    }

    /// Build a consumer from its config entry
    pub fn from_config(config: &ConsumerConfig) -> Self {
        let handler: Arc<dyn RecordHandler> = match config.handler {
            HandlerKind::Log => Arc::new(LogHandler::new(format!("log:{}", config.topic.trim()))),
        };
        Self::with_shared_handler(
            config.topic.clone(),
            config.batch,
            config.batch_max_count,
            handler,
        )
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_batching(&self) -> bool {
        self.batch
    }

    pub fn batch_max_count(&self) -> usize {
        self.batch_max_count
    }

    pub fn handler(&self) -> &Arc<dyn RecordHandler> {
        &self.handler
    }

    /// Trim the topic and fix up batching; `None` for a blank topic
    pub(crate) fn normalized(mut self) -> Option<Self> {
        let trimmed = self.topic.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.len() != self.topic.len() {
            self.topic = trimmed.to_string();
        }
        if self.batch && self.batch_max_count <= 1 {
            self.batch = false;
        }
        if !self.batch {
            self.batch_max_count = 1;
        }
        Some(self)
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("topic", &self.topic)
            .field("batch", &self.batch)
            .field("batch_max_count", &self.batch_max_count)
            .finish_non_exhaustive()
    }
}
