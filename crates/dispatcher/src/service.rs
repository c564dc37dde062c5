//! Service - the poll loop that routes records to topic workers
//!
//! A supervisor task runs one *generation* at a time. A generation polls the
//! broker, routes every record to its topic worker and ends on shutdown,
//! client closure, an empty registry or a panic. A panicked generation is
//! torn down and restarted after `restart_backoff`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use contracts::{BrokerClient, Record, ServiceSettings, WorkerLifecycle};
use observability::DropReason;

use crate::consumer::Consumer;
use crate::metrics::MetricsSnapshot;
use crate::producer::Producer;
use crate::registry::{ConsumerRegistry, ConsumerSnapshot, WorkerRegistry};
use crate::worker::{panic_message, WorkerSettings};

/// Service runtime configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Service name (used in logs and metric labels)
    pub name: String,
    /// Settings handed to every topic worker
    pub worker: WorkerSettings,
    /// Delay before restarting a crashed generation
    pub restart_backoff: Duration,
    /// Delay before re-checking an empty registry
    pub idle_backoff: Duration,
    /// When workers are torn down
    pub worker_lifecycle: WorkerLifecycle,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&ServiceSettings::default())
    }
}

impl From<&ServiceSettings> for DispatcherConfig {
    fn from(settings: &ServiceSettings) -> Self {
        Self {
            name: settings.name.clone(),
            worker: WorkerSettings {
                queue_capacity: settings.queue_capacity,
                flush_interval: Duration::from_millis(settings.flush_interval_ms),
                auto_commit: settings.auto_commit,
            },
            restart_backoff: Duration::from_millis(settings.restart_backoff_ms),
            idle_backoff: Duration::from_millis(settings.idle_backoff_ms),
            worker_lifecycle: settings.worker_lifecycle,
        }
    }
}

/// Why a generation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GenerationExit {
    /// Root scope cancelled
    Shutdown,
    /// Broker client reported itself closed
    ClientClosed,
    /// No consumers registered
    Idle,
}

/// Builder for creating a Service
pub struct ServiceBuilder<B: BrokerClient> {
    client: Arc<B>,
    config: DispatcherConfig,
    parent: Option<CancellationToken>,
    consumers: Vec<Consumer>,
}

impl<B: BrokerClient> ServiceBuilder<B> {
    /// Create a new ServiceBuilder
    pub fn new(client: Arc<B>) -> Self {
        Self {
            client,
            config: DispatcherConfig::default(),
            parent: None,
            consumers: Vec::new(),
        }
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Derive the service root scope from `parent`
    pub fn parent(mut self, parent: &CancellationToken) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Consumers registered as soon as the service is built
    pub fn consumers(mut self, consumers: impl IntoIterator<Item = Consumer>) -> Self {
        self.consumers.extend(consumers);
        self
    }

    /// Build the service; it does not poll until `run` is called
    #[instrument(
        name = "service_builder_build",
        skip(self),
        fields(service = %self.config.name, consumers = self.consumers.len())
    )]
    pub fn build(self) -> Arc<Service<B>> {
        let root = match &self.parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let service = Arc::new(Service {
            workers: WorkerRegistry::new(self.config.worker.clone()),
            consumers: ConsumerRegistry::new(),
            client: self.client,
            config: self.config,
            running: AtomicBool::new(false),
            root,
            registered: Notify::new(),
            shutdown_once: Once::new(),
            restarts: AtomicU64::new(0),
        });
        service.register_consumers(self.consumers);
        service
    }
}

/// Topic-partitioned consumer service
pub struct Service<B: BrokerClient> {
    client: Arc<B>,
    config: DispatcherConfig,
    consumers: ConsumerRegistry,
    workers: WorkerRegistry,
    running: AtomicBool,
    root: CancellationToken,
    registered: Notify,
    shutdown_once: Once,
    restarts: AtomicU64,
}

impl<B: BrokerClient> Service<B> {
    /// Create a service with its own root scope
    pub fn new(client: Arc<B>, config: DispatcherConfig) -> Arc<Self> {
        ServiceBuilder::new(client).config(config).build()
    }

    pub fn builder(client: Arc<B>) -> ServiceBuilder<B> {
        ServiceBuilder::new(client)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Register consumers and subscribe their topics
    ///
    /// Blank topics and topics that are already registered are ignored.
    /// Does nothing once the service is shut down.
    pub fn register_consumers(&self, consumers: impl IntoIterator<Item = Consumer>) {
        if self.root.is_cancelled() {
            debug!(service = %self.config.name, "Service stopped, registration ignored");
            return;
        }

        let mut added = 0;
        for consumer in consumers {
            let topic = consumer.topic().to_string();
            if self
                .consumers
                .register(consumer, |t| self.client.subscribe(t))
            {
                added += 1;
                info!(service = %self.config.name, topic = %topic.trim(), "Consumer registered");
            } else {
                debug!(service = %self.config.name, topic = %topic, "Consumer registration ignored");
            }
        }

        if added > 0 {
            self.registered.notify_one();
        }
    }

    /// Remove consumers and pause their broker subscriptions
    ///
    /// Unknown topics are ignored. Workers of removed topics are retired at
    /// the start of the next poll cycle.
    pub fn remove_consumers<I, S>(&self, topics: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for topic in topics {
            let topic = topic.as_ref();
            if self
                .consumers
                .remove(topic, |t| self.client.pause(t))
            {
                info!(service = %self.config.name, topic = %topic.trim(), "Consumer removed");
            }
        }
    }

    /// Start the poll loop
    ///
    /// Returns `None` if the service is already running.
    pub fn run(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(service = %self.config.name, "Service already running");
            return None;
        }
        Some(tokio::spawn(Arc::clone(self).supervise()))
    }

    /// Stop the service
    ///
    /// Cancels every worker, clears the registry and closes the broker
    /// client. Only the first call has any effect.
    pub fn shutdown(&self) {
        self.shutdown_once.call_once(|| {
            info!(service = %self.config.name, "Service shutting down");
            self.root.cancel();
            self.consumers.clear();
            self.client.close();
        });
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Registered topics, sorted
    pub fn registered_topics(&self) -> Vec<String> {
        self.consumers.topics()
    }

    /// Topics with a live worker, sorted
    pub fn active_workers(&self) -> Vec<String> {
        self.workers.topics()
    }

    /// Per-topic worker metrics
    pub fn worker_metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.workers.metrics()
    }

    /// Generations restarted after a panic
    pub fn generation_restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    pub fn client(&self) -> &Arc<B> {
        &self.client
    }

    /// Producer publishing through this service's client
    pub fn producer(&self) -> Producer<B> {
        Producer::new(self.config.name.clone(), Arc::clone(&self.client))
    }

    /// Root scope; cancelled by `shutdown`
    pub fn cancellation(&self) -> &CancellationToken {
        &self.root
    }

    #[instrument(name = "service_supervise", skip(self), fields(service = %self.config.name))]
    async fn supervise(self: Arc<Self>) {
        info!("Service started");

        loop {
            if self.root.is_cancelled() {
                break;
            }

            let outcome = tokio::spawn(Arc::clone(&self).run_generation()).await;
            self.workers.close_all().await;

            let backoff = match outcome {
                Ok(GenerationExit::Shutdown) => break,
                Ok(GenerationExit::ClientClosed) if self.root.is_cancelled() => break,
                Ok(GenerationExit::ClientClosed) => {
                    error!("Broker client closed, service exiting");
                    break;
                }
                Ok(GenerationExit::Idle) => {
                    self.wait_for_consumers().await;
                    continue;
                }
                Err(e) if e.is_panic() => {
                    let payload = e.into_panic();
                    error!(panic = %panic_message(payload.as_ref()), "Generation panicked");
                    self.config.restart_backoff
                }
                Err(e) => {
                    error!(error = %e, "Generation task failed");
                    self.config.restart_backoff
                }
            };

            self.restarts.fetch_add(1, Ordering::Relaxed);
            observability::record_generation_restart(&self.config.name);
            tokio::select! {
                _ = self.root.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
            info!(backoff_ms = backoff.as_millis() as u64, "Service restart");
        }

        self.workers.close_all().await;
        observability::record_worker_count(&self.config.name, 0);
        self.running.store(false, Ordering::Release);
        info!("Service stopped");
    }

    async fn wait_for_consumers(&self) {
        tokio::select! {
            _ = self.root.cancelled() => {}
            _ = self.registered.notified() => debug!("Consumer registered, resuming"),
            _ = tokio::time::sleep(self.config.idle_backoff) => {}
        }
    }

    #[instrument(name = "service_generation", skip(self), fields(service = %self.config.name))]
    async fn run_generation(self: Arc<Self>) -> GenerationExit {
        debug!("Generation started");

        loop {
            if self.root.is_cancelled() {
                return GenerationExit::Shutdown;
            }

            let consumers = self.consumers.snapshot();
            if consumers.is_empty() {
                error!("Consumer topics are empty");
                return GenerationExit::Idle;
            }

            let retired = self.workers.retire_unregistered(&consumers).await;
            if retired > 0 {
                debug!(retired, "Retired workers of removed topics");
            }

            let batch = tokio::select! {
                biased;
                _ = self.root.cancelled() => return GenerationExit::Shutdown,
                batch = self.client.poll_batch(&self.root) => batch,
            };

            if batch.closed {
                return GenerationExit::ClientClosed;
            }

            if !batch.errors.is_empty() {
                for err in &batch.errors {
                    observability::record_poll_error();
                    error!(error = %err, "Poll fetch error");
                }
                if !batch.records.is_empty() {
                    warn!(records = batch.records.len(), "Discarding records of a failed poll");
                }
                continue;
            }

            if batch.is_empty() {
                continue;
            }

            observability::record_records_polled(batch.records.len());
            // Registrations may have changed while polling
            let consumers = self.consumers.snapshot();
            self.dispatch(&consumers, batch.records).await;

            if self.config.worker_lifecycle == WorkerLifecycle::PerPoll {
                self.workers.close_all().await;
            }
            observability::record_worker_count(&self.config.name, self.workers.len());
        }
    }

    async fn dispatch(&self, consumers: &ConsumerSnapshot, records: Vec<Record>) {
        for record in records {
            let Some(consumer) = consumers.get(&record.topic) else {
                observability::record_record_dropped(&record.topic, DropReason::UnknownTopic);
                warn!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    "No consumer for topic, record dropped"
                );
                continue;
            };

            let lane = self.workers.lane(consumer, &self.root).await;
            lane.send(record).await;
        }
    }
}
