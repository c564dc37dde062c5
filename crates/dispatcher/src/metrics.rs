//! Topic worker metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single topic worker
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    /// Current queue length
    queue_len: AtomicUsize,
    /// Records received from the hand-off queue
    received_count: AtomicU64,
    /// Handler invocations
    batch_count: AtomicU64,
    /// Records passed to the handler
    handled_count: AtomicU64,
    /// Handler invocations that returned an error
    failure_count: AtomicU64,
    /// Handler invocations that panicked
    panic_count: AtomicU64,
    /// Records the poll loop could not hand off
    dropped_count: AtomicU64,
}

impl WorkerMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn received_count(&self) -> u64 {
        self.received_count.load(Ordering::Relaxed)
    }

    pub fn inc_received_count(&self) {
        self.received_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batch_count(&self) -> u64 {
        self.batch_count.load(Ordering::Relaxed)
    }

    pub fn handled_count(&self) -> u64 {
        self.handled_count.load(Ordering::Relaxed)
    }

    /// Record one handler invocation carrying `records` records
    pub fn record_batch(&self, records: usize) {
        self.batch_count.fetch_add(1, Ordering::Relaxed);
        self.handled_count
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn panic_count(&self) -> u64 {
        self.panic_count.load(Ordering::Relaxed)
    }

    pub fn inc_panic_count(&self) {
        self.panic_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            received_count: self.received_count(),
            batch_count: self.batch_count(),
            handled_count: self.handled_count(),
            failure_count: self.failure_count(),
            panic_count: self.panic_count(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Snapshot of worker metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub received_count: u64,
    pub batch_count: u64,
    pub handled_count: u64,
    pub failure_count: u64,
    pub panic_count: u64,
    pub dropped_count: u64,
}

impl MetricsSnapshot {
    /// Average records per handler invocation
    pub fn mean_batch_size(&self) -> f64 {
        if self.batch_count == 0 {
            0.0
        } else {
            self.handled_count as f64 / self.batch_count as f64
        }
    }
}
