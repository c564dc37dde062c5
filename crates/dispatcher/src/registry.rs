//! Consumer and worker registries
//!
//! Both maps sit behind a `std::sync::Mutex` held only for the map mutation
//! itself, never across an `.await`.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::consumer::Consumer;
use crate::handle::{TopicWorkerHandle, WorkerLane};
use crate::metrics::MetricsSnapshot;
use crate::worker::WorkerSettings;

/// Registered consumers keyed by topic
pub type ConsumerSnapshot = HashMap<String, Arc<Consumer>>;

/// Topic → consumer registration
#[derive(Default)]
pub struct ConsumerRegistry {
    consumers: Mutex<ConsumerSnapshot>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer unless its topic is blank or already taken
    ///
    /// `on_insert` runs under the lock after a successful insert and must
    /// not block. Returns whether the consumer was inserted.
    pub fn register(&self, consumer: Consumer, on_insert: impl FnOnce(&str)) -> bool {
        let Some(consumer) = consumer.normalized() else {
            debug!("Ignoring consumer with blank topic");
            return false;
        };

        let mut consumers = self.lock();
        match consumers.entry(consumer.topic().to_string()) {
            Entry::Occupied(entry) => {
                debug!(topic = %entry.key(), "Topic already registered, keeping first consumer");
                false
            }
            Entry::Vacant(entry) => {
                on_insert(entry.key());
                entry.insert(Arc::new(consumer));
                true
            }
        }
    }

    /// Remove the registration for `topic`
    ///
    /// `on_remove` runs under the lock only when a registration existed.
    pub fn remove(&self, topic: &str, on_remove: impl FnOnce(&str)) -> bool {
        let topic = topic.trim();
        let mut consumers = self.lock();
        if consumers.remove(topic).is_some() {
            on_remove(topic);
            true
        } else {
            false
        }
    }

    /// Clone of the current registrations
    pub fn snapshot(&self) -> ConsumerSnapshot {
        self.lock().clone()
    }

    pub fn get(&self, topic: &str) -> Option<Arc<Consumer>> {
        self.lock().get(topic.trim()).cloned()
    }

    /// Registered topics, sorted
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.lock().keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, ConsumerSnapshot> {
        self.consumers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Topic → live worker
pub struct WorkerRegistry {
    workers: Mutex<HashMap<String, TopicWorkerHandle>>,
    settings: WorkerSettings,
}

impl WorkerRegistry {
    pub fn new(settings: WorkerSettings) -> Self {
        Self {
            workers: Mutex::new(HashMap::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Lane to the live worker for `consumer`, spawning it lazily
    ///
    /// A worker that is retired or was spawned for an earlier registration of
    /// the same topic is drained and awaited before its replacement starts, so
    /// records for one topic are never handled out of order across workers.
    pub async fn lane(&self, consumer: &Arc<Consumer>, parent: &CancellationToken) -> WorkerLane {
        let topic = consumer.topic();

        let replaced = {
            let mut workers = self.lock();
            if let Some(handle) = workers
                .get(topic)
                .filter(|h| !h.is_retired() && h.serves(consumer))
            {
                return handle.lane();
            }
            workers.remove(topic)
        };

        if let Some(handle) = replaced {
            debug!(topic = %topic, "Reaping replaced worker");
            handle.close().await;
        }

        let mut workers = self.lock();
        workers
            .entry(topic.to_string())
            .or_insert_with(|| TopicWorkerHandle::spawn(Arc::clone(consumer), &self.settings, parent))
            .lane()
    }

    /// Close workers whose registration is no longer in `registered`
    ///
    /// A topic that was removed and registered again counts as unregistered
    /// for the old worker. Returns how many workers were closed.
    pub async fn retire_unregistered(&self, registered: &ConsumerSnapshot) -> usize {
        let stale: Vec<TopicWorkerHandle> = {
            let mut workers = self.lock();
            let topics: Vec<String> = workers
                .iter()
                .filter(|(topic, handle)| {
                    registered
                        .get(*topic)
                        .is_none_or(|consumer| !handle.serves(consumer))
                })
                .map(|(topic, _)| topic.clone())
                .collect();
            topics.iter().filter_map(|t| workers.remove(t)).collect()
        };

        let count = stale.len();
        for handle in stale {
            debug!(topic = %handle.topic(), "Retiring worker for removed topic");
            handle.close().await;
        }
        count
    }

    /// Close every worker and wait for all drains
    pub async fn close_all(&self) {
        let handles: Vec<TopicWorkerHandle> = {
            let mut workers = self.lock();
            workers.drain().map(|(_, handle)| handle).collect()
        };

        if !handles.is_empty() {
            debug!(workers = handles.len(), "Closing all workers");
        }
        futures::future::join_all(handles.into_iter().map(TopicWorkerHandle::close)).await;
    }

    /// Topics with a live worker, sorted
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, h)| !h.is_retired())
            .map(|(t, _)| t.clone())
            .collect();
        topics.sort();
        topics
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Get metrics for all workers
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        let mut metrics: Vec<(String, MetricsSnapshot)> = self
            .lock()
            .iter()
            .map(|(topic, h)| (topic.clone(), h.metrics().snapshot()))
            .collect();
        metrics.sort_by(|a, b| a.0.cmp(&b.0));
        metrics
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TopicWorkerHandle>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
