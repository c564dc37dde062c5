//! Run statistics.

use std::time::Duration;

use contracts::BrokerClient;
use dispatcher::{MetricsSnapshot, Service};

/// Statistics from a service run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Demo records published at startup
    pub demo_published: u64,

    /// Generation restarts after a crash
    pub generation_restarts: u64,

    /// Per-topic worker metrics, sorted by topic
    pub workers: Vec<(String, MetricsSnapshot)>,
}

impl RunStats {
    /// Snapshot the live service
    pub fn collect<B: BrokerClient>(
        service: &Service<B>,
        duration: Duration,
        demo_published: u64,
    ) -> Self {
        let mut workers = service.worker_metrics();
        workers.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            duration,
            demo_published,
            generation_restarts: service.generation_restarts(),
            workers,
        }
    }

    pub fn total_handled(&self) -> u64 {
        self.workers.iter().map(|(_, m)| m.handled_count).sum()
    }

    pub fn total_dropped(&self) -> u64 {
        self.workers.iter().map(|(_, m)| m.dropped_count).sum()
    }

    /// Handled records per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.total_handled() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Run Statistics ===\n");

        println!("Overview");
        println!("  Duration: {:.2}s", self.duration.as_secs_f64());
        println!("  Records handled: {}", self.total_handled());
        println!("  Records dropped: {}", self.total_dropped());
        println!("  Throughput: {:.2} rec/s", self.throughput());
        println!("  Generation restarts: {}", self.generation_restarts);
        if self.demo_published > 0 {
            println!("  Demo records published: {}", self.demo_published);
        }

        if !self.workers.is_empty() {
            println!("\nWorkers");
            for (topic, m) in &self.workers {
                println!(
                    "  {}: received={} handled={} batches={} (mean {:.1}) failures={} panics={} queued={}",
                    topic,
                    m.received_count,
                    m.handled_count,
                    m.batch_count,
                    m.mean_batch_size(),
                    m.failure_count,
                    m.panic_count,
                    m.queue_len
                );
            }
        }

        println!();
    }
}
