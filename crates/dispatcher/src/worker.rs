//! Topic worker - drains one topic's hand-off queue into its handler
//!
//! A worker accumulates records into a batch and flushes it when the batch
//! reaches `batch_max_count` or when the flush timer ticks, whichever comes
//! first. Handler invocations are sequential and in arrival order.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use contracts::{HandlerContext, Record};
use observability::FlushTrigger;

use crate::consumer::Consumer;
use crate::metrics::WorkerMetrics;

/// Default flush timer period
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(1000);

const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Default hand-off queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Worker lifecycle state, published through the handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Accepting records
    Active,
    /// Flushing the pending batch before exit
    Draining,
    /// Task finished
    Closed,
}

/// Settings shared by every worker of a service
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub queue_capacity: usize,
    pub flush_interval: Duration,
    pub auto_commit: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            auto_commit: true,
        }
    }
}

pub(crate) struct TopicWorker {
    consumer: Arc<Consumer>,
    ctx: HandlerContext,
    rx: mpsc::Receiver<Record>,
    pending: Vec<Record>,
    last_flush: Instant,
    flush_interval: Duration,
    metrics: Arc<WorkerMetrics>,
    state: watch::Sender<WorkerState>,
}

impl TopicWorker {
    pub(crate) fn new(
        consumer: Arc<Consumer>,
        ctx: HandlerContext,
        rx: mpsc::Receiver<Record>,
        flush_interval: Duration,
        metrics: Arc<WorkerMetrics>,
        state: watch::Sender<WorkerState>,
    ) -> Self {
        let capacity = if consumer.is_batching() {
            consumer.batch_max_count()
        } else {
            0
        };
        Self {
            consumer,
            ctx,
            rx,
            pending: Vec::with_capacity(capacity),
            last_flush: Instant::now(),
            flush_interval: flush_interval.max(MIN_FLUSH_INTERVAL),
            metrics,
            state,
        }
    }

    #[instrument(
        name = "topic_worker_loop",
        skip(self),
        fields(topic = %self.consumer.topic(), batch = self.consumer.is_batching())
    )]
    pub(crate) async fn run(mut self) {
        debug!("Topic worker started");

        let scope = self.ctx.scope().clone();
        let mut ticker = time::interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = scope.cancelled() => {
                    debug!(queued = self.rx.len(), "Worker scope cancelled");
                    break;
                }
                record = self.rx.recv() => match record {
                    Some(record) => self.accept(record).await,
                    None => {
                        debug!("Worker queue closed");
                        break;
                    }
                },
                _ = ticker.tick() => self.on_tick().await,
            }
        }

        self.state.send_replace(WorkerState::Draining);
        drop(ticker);
        if !self.pending.is_empty() {
            self.flush(FlushTrigger::Drain).await;
        }
        self.state.send_replace(WorkerState::Closed);

        info!(
            received = self.metrics.received_count(),
            batches = self.metrics.batch_count(),
            "Topic worker stopped"
        );
    }

    async fn accept(&mut self, record: Record) {
        self.metrics.inc_received_count();
        self.metrics.set_queue_len(self.rx.len());

        if !self.consumer.is_batching() {
            self.invoke(std::slice::from_ref(&record), FlushTrigger::Single)
                .await;
            self.last_flush = Instant::now();
            return;
        }

        self.pending.push(record);
        if self.pending.len() >= self.consumer.batch_max_count() {
            self.flush(FlushTrigger::Count).await;
        }
    }

    async fn on_tick(&mut self) {
        if self.consumer.is_batching() && !self.pending.is_empty() {
            debug!(
                pending = self.pending.len(),
                since_last_flush_ms = self.last_flush.elapsed().as_millis() as u64,
                "Flush timer fired"
            );
            self.flush(FlushTrigger::Timer).await;
        }
    }

    /// Hand the pending batch to the handler and reset the buffer
    async fn flush(&mut self, trigger: FlushTrigger) {
        self.invoke(&self.pending, trigger).await;
        self.pending.clear();
        self.last_flush = Instant::now();
    }

    async fn invoke(&self, records: &[Record], trigger: FlushTrigger) {
        let topic = self.consumer.topic();
        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.consumer.handler().handle(&self.ctx, records))
            .catch_unwind()
            .await;

        self.metrics.record_batch(records.len());
        observability::record_batch_flushed(topic, records.len(), trigger);

        match outcome {
            Ok(Ok(())) => {
                debug!(
                    records = records.len(),
                    trigger = trigger.as_str(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Batch handled"
                );
            }
            Ok(Err(e)) => {
                self.metrics.inc_failure_count();
                observability::record_handler_failure(topic);
                error!(records = records.len(), error = %e, "Handler failed");
            }
            Err(payload) => {
                self.metrics.inc_panic_count();
                observability::record_handler_panic(topic);
                error!(
                    records = records.len(),
                    panic = %panic_message(payload.as_ref()),
                    "Handler panicked, batch discarded"
                );
            }
        }
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
