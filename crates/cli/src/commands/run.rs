//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use contracts::RuntimeConfig;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::runtime::{Runtime, RuntimeOptions};

/// Execute the `run` command
pub async fn run_service(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut config, args);
    // Overrides can break what the file got right
    config_loader::validate(&config).context("Invalid configuration after CLI overrides")?;

    info!(
        service = %config.service.name,
        broker = ?config.broker.kind,
        consumers = config.consumers.len(),
        lifecycle = ?config.service.worker_lifecycle,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let options = RuntimeOptions {
        config,
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        demo_records: args.demo_records,
    };

    let stats = Runtime::new(options)
        .run(shutdown_signal())
        .await
        .context("Service execution failed")?;

    stats.print_summary();
    info!("Topic dispatch finished");
    Ok(())
}

/// Apply CLI/env overrides on top of the file configuration
fn apply_overrides(config: &mut RuntimeConfig, args: &RunArgs) {
    if let Some(kind) = args.broker {
        info!(broker = ?kind, "Overriding broker backend from CLI");
        config.broker.kind = kind.into();
    }
    if !args.brokers.is_empty() {
        info!(brokers = ?args.brokers, "Overriding seed brokers from CLI");
        config.broker.brokers = args.brokers.clone();
    }
    if let Some(ref client_id) = args.client_id {
        config.broker.client_id = Some(client_id.clone());
    }
    if let Some(ref group) = args.consumer_group {
        info!(group = %group, "Overriding consumer group from CLI");
        config.broker.consumer_group = Some(group.clone());
    }
    if let Some(auto_commit) = args.auto_commit {
        config.service.auto_commit = auto_commit;
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &RuntimeConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Service: {}", config.service.name);
    println!("  Auto commit: {}", config.service.auto_commit);
    println!("  Queue capacity: {}", config.service.queue_capacity);
    println!("  Flush interval: {} ms", config.service.flush_interval_ms);
    println!("  Worker lifecycle: {:?}", config.service.worker_lifecycle);

    println!("\nBroker: {:?}", config.broker.kind);
    if !config.broker.brokers.is_empty() {
        println!("  Brokers: {}", config.broker.brokers.join(","));
    }
    if let Some(ref group) = config.broker.consumer_group {
        println!("  Consumer group: {}", group);
    }

    println!("\nConsumers ({}):", config.consumers.len());
    for consumer in &config.consumers {
        if consumer.batch && consumer.batch_max_count > 1 {
            println!(
                "  - {} (batch of {}, {:?})",
                consumer.topic, consumer.batch_max_count, consumer.handler
            );
        } else {
            println!("  - {} (single, {:?})", consumer.topic, consumer.handler);
        }
    }

    println!();
}
