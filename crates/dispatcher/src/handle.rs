//! TopicWorkerHandle - owns one topic worker's queue, scope and task

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use contracts::{HandlerContext, Record};
use observability::DropReason;

use crate::consumer::Consumer;
use crate::handoff::{handoff_queue, safe_send, Delivery};
use crate::metrics::WorkerMetrics;
use crate::worker::{TopicWorker, WorkerSettings, WorkerState};

/// Handle to a running topic worker
pub struct TopicWorkerHandle {
    /// Topic served by the worker
    topic: String,
    /// Registration the worker was spawned for
    consumer: Arc<Consumer>,
    /// Channel to send records to worker
    tx: mpsc::Sender<Record>,
    /// Worker scope, child of the service root
    scope: CancellationToken,
    /// Shared metrics
    metrics: Arc<WorkerMetrics>,
    /// Lifecycle state published by the worker
    state: watch::Receiver<WorkerState>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl TopicWorkerHandle {
    /// Create the worker's queue and scope and spawn its task
    pub fn spawn(
        consumer: Arc<Consumer>,
        settings: &WorkerSettings,
        parent: &CancellationToken,
    ) -> Self {
        let topic = consumer.topic().to_string();
        let (tx, rx) = handoff_queue(settings.queue_capacity);
        let scope = parent.child_token();
        let metrics = Arc::new(WorkerMetrics::new());
        let (state_tx, state) = watch::channel(WorkerState::Active);

        let ctx = HandlerContext::new(topic.clone(), scope.clone(), settings.auto_commit);
        let worker = TopicWorker::new(
            Arc::clone(&consumer),
            ctx,
            rx,
            settings.flush_interval,
            Arc::clone(&metrics),
            state_tx,
        );
        let worker_handle = tokio::spawn(worker.run());

        debug!(topic = %topic, "Topic worker spawned");

        Self {
            topic,
            consumer,
            tx,
            scope,
            metrics,
            state,
            worker_handle,
        }
    }

    /// Get topic name
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// True when the worker was spawned for exactly this registration
    pub fn serves(&self, consumer: &Arc<Consumer>) -> bool {
        Arc::ptr_eq(&self.consumer, consumer)
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<WorkerMetrics> {
        &self.metrics
    }

    pub fn scope(&self) -> &CancellationToken {
        &self.scope
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// A sending endpoint usable without holding the registry lock
    pub fn lane(&self) -> WorkerLane {
        WorkerLane {
            topic: self.topic.clone(),
            tx: self.tx.clone(),
            scope: self.scope.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// True once the worker can no longer accept records
    pub fn is_retired(&self) -> bool {
        self.scope.is_cancelled()
            || self.tx.is_closed()
            || self.worker_handle.is_finished()
            || self.state() != WorkerState::Active
    }

    /// Close the queue and wait for the worker to drain it
    #[instrument(name = "topic_worker_close", skip(self), fields(topic = %self.topic))]
    pub async fn close(self) {
        // Lanes cloned from this handle only live for one send
        drop(self.tx);
        Self::join(self.topic, self.worker_handle).await;
    }

    /// Cancel the worker scope and wait for it to exit
    ///
    /// Records still queued are not delivered; the pending batch is flushed.
    #[instrument(name = "topic_worker_cancel", skip(self), fields(topic = %self.topic))]
    pub async fn cancel(self) {
        self.scope.cancel();
        Self::join(self.topic, self.worker_handle).await;
    }

    async fn join(topic: String, worker_handle: JoinHandle<()>) {
        if let Err(e) = worker_handle.await {
            error!(topic = %topic, error = ?e, "Worker task failed");
        }
        debug!(topic = %topic, "TopicWorkerHandle shutdown complete");
    }
}

/// Sending side of one worker's hand-off queue
#[derive(Clone)]
pub struct WorkerLane {
    topic: String,
    tx: mpsc::Sender<Record>,
    scope: CancellationToken,
    metrics: Arc<WorkerMetrics>,
}

impl WorkerLane {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Hand a record to the worker, waiting for queue space
    pub async fn send(&self, record: Record) -> Delivery {
        let offset = record.offset;
        let delivery = safe_send(&self.scope, &self.tx, record).await;
        match delivery {
            Delivery::Sent => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                observability::record_record_dispatched(&self.topic);
            }
            Delivery::Skipped | Delivery::Cancelled => {
                self.metrics.inc_dropped_count();
                observability::record_record_dropped(&self.topic, DropReason::WorkerCancelled);
                warn!(topic = %self.topic, offset, ?delivery, "Worker scope cancelled, record dropped");
            }
            Delivery::Closed => {
                self.metrics.inc_dropped_count();
                observability::record_record_dropped(&self.topic, DropReason::WorkerClosed);
                error!(topic = %self.topic, offset, "Worker queue closed unexpectedly");
            }
        }
        delivery
    }
}
