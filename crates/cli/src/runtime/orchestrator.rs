//! Runtime orchestrator - builds the broker and service, runs until shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use broker::Broker;
use contracts::RuntimeConfig;
use dispatcher::{with_trace_id, Consumer, DispatcherConfig, MessageValue, Service};
use serde_json::json;
use tracing::{info, warn};

use super::RunStats;
use crate::error::CliError;

/// Runtime options
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Loaded and validated configuration
    pub config: RuntimeConfig,

    /// Run timeout (None = until shutdown)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Demo records published per configured topic
    pub demo_records: usize,
}

/// Why the runtime stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Signal,
    Timeout,
    SupervisorExited,
}

/// Main runtime orchestrator
pub struct Runtime {
    options: RuntimeOptions,
}

impl Runtime {
    pub fn new(options: RuntimeOptions) -> Self {
        Self { options }
    }

    /// Run until `shutdown` resolves, the timeout expires or the service stops
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<RunStats> {
        let start_time = Instant::now();
        let config = &self.options.config;

        if let Some(port) = self.options.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let client = Broker::from_config(&config.broker, config.service.auto_commit)
            .map_err(|e| CliError::broker_setup(format!("{:?}", config.broker.kind), e.to_string()))?;
        info!(broker = client.kind(), "Broker client created");

        let service = Service::builder(Arc::new(client))
            .config(DispatcherConfig::from(&config.service))
            .consumers(config.consumers.iter().map(Consumer::from_config))
            .build();

        info!(
            service = %service.name(),
            topics = ?service.registered_topics(),
            "Consumers registered"
        );

        let mut supervisor = service
            .run()
            .ok_or_else(|| CliError::already_running(service.name()))?;

        let demo_published = match self.publish_demo_records(&service).await {
            Ok(count) => count,
            Err(e) => {
                service.shutdown();
                let _ = supervisor.await;
                return Err(e);
            }
        };

        let timeout = self.options.timeout;
        let stop = tokio::select! {
            _ = shutdown => StopReason::Signal,
            _ = async {
                match timeout {
                    Some(duration) => tokio::time::sleep(duration).await,
                    None => std::future::pending::<()>().await,
                }
            } => StopReason::Timeout,
            _ = &mut supervisor => StopReason::SupervisorExited,
        };

        match stop {
            StopReason::Signal => info!("Shutdown signal received"),
            StopReason::Timeout => info!(timeout = ?timeout, "Run timeout reached"),
            StopReason::SupervisorExited => warn!("Service supervisor exited on its own"),
        }

        // Worker metrics are gone once the generation tears its workers down
        let mut stats = RunStats::collect(&service, start_time.elapsed(), demo_published);

        service.shutdown();
        if stop != StopReason::SupervisorExited {
            if let Err(e) = supervisor.await {
                warn!(error = %e, "Service supervisor join failed");
            }
        }

        stats.duration = start_time.elapsed();
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            handled = stats.total_handled(),
            "Service stopped"
        );

        Ok(stats)
    }

    /// Publish demo records through the service producer
    ///
    /// Only the memory broker accepts demo traffic.
    async fn publish_demo_records(&self, service: &Arc<Service<Broker>>) -> Result<u64> {
        let per_topic = self.options.demo_records;
        if per_topic == 0 {
            return Ok(0);
        }
        if service.client().as_memory().is_none() {
            warn!(
                broker = service.client().kind(),
                "Demo records are only published to the memory broker, skipping"
            );
            return Ok(0);
        }

        let producer = service.producer();
        let mut published = 0u64;
        for topic in service.registered_topics() {
            for seq in 0..per_topic {
                let value = MessageValue::structured(&json!({
                    "topic": topic,
                    "seq": seq,
                    "demo": true,
                }))
                .with_context(|| format!("Failed to encode demo record for '{}'", topic))?;

                with_trace_id(
                    format!("demo-{}-{}", topic, seq),
                    producer.publish(&topic, None, value, Vec::new()),
                )
                .await
                .map_err(|e| CliError::demo_publish(&topic, e.to_string()))?;
                published += 1;
            }
        }

        info!(published, per_topic, "Demo records published");
        Ok(published)
    }
}
