//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::RuntimeConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Property keys whose values are masked on output
const SECRET_MARKERS: &[&str] = &["password", "secret", "token", "key"];

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    service: ServiceInfo,
    broker: BrokerInfo,
    consumers: Vec<ConsumerInfo>,
}

#[derive(Serialize)]
struct ServiceInfo {
    name: String,
    auto_commit: bool,
    queue_capacity: usize,
    flush_interval_ms: u64,
    restart_backoff_ms: u64,
    idle_backoff_ms: u64,
    worker_lifecycle: String,
}

#[derive(Serialize)]
struct BrokerInfo {
    kind: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    brokers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    consumer_group: Option<String>,
    poll_max_records: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct ConsumerInfo {
    topic: String,
    mode: String,
    handler: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &RuntimeConfig, args: &InfoArgs) -> ConfigInfo {
    let properties = if args.properties {
        config
            .broker
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), mask_property(k, v)))
            .collect()
    } else {
        BTreeMap::new()
    };

    let consumers = config
        .consumers
        .iter()
        .map(|c| ConsumerInfo {
            topic: c.topic.trim().to_string(),
            mode: if c.batch && c.batch_max_count > 1 {
                format!("batch({})", c.batch_max_count)
            } else {
                "single".to_string()
            },
            handler: format!("{:?}", c.handler).to_lowercase(),
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", config.version),
        service: ServiceInfo {
            name: config.service.name.clone(),
            auto_commit: config.service.auto_commit,
            queue_capacity: config.service.queue_capacity,
            flush_interval_ms: config.service.flush_interval_ms,
            restart_backoff_ms: config.service.restart_backoff_ms,
            idle_backoff_ms: config.service.idle_backoff_ms,
            worker_lifecycle: format!("{:?}", config.service.worker_lifecycle),
        },
        broker: BrokerInfo {
            kind: format!("{:?}", config.broker.kind),
            brokers: config.broker.brokers.clone(),
            client_id: config.broker.client_id.clone(),
            consumer_group: config.broker.consumer_group.clone(),
            poll_max_records: config.broker.poll_max_records,
            properties,
        },
        consumers,
    }
}

fn mask_property(key: &str, value: &str) -> String {
    let key = key.to_ascii_lowercase();
    if SECRET_MARKERS.iter().any(|marker| key.contains(marker)) {
        "****".to_string()
    } else {
        value.to_string()
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("=== Topic Dispatch Configuration ===\n");
    println!("Version: {}", info.version);

    let service = &info.service;
    println!("\nService: {}", service.name);
    println!("  Auto commit: {}", service.auto_commit);
    println!("  Queue capacity: {}", service.queue_capacity);
    println!("  Flush interval: {} ms", service.flush_interval_ms);
    println!("  Restart backoff: {} ms", service.restart_backoff_ms);
    println!("  Idle backoff: {} ms", service.idle_backoff_ms);
    println!("  Worker lifecycle: {}", service.worker_lifecycle);

    let broker = &info.broker;
    println!("\nBroker: {}", broker.kind);
    if !broker.brokers.is_empty() {
        println!("  Brokers: {}", broker.brokers.join(","));
    }
    if let Some(ref client_id) = broker.client_id {
        println!("  Client id: {}", client_id);
    }
    if let Some(ref group) = broker.consumer_group {
        println!("  Consumer group: {}", group);
    }
    println!("  Poll max records: {}", broker.poll_max_records);
    if !broker.properties.is_empty() {
        println!("  Properties:");
        for (key, value) in &broker.properties {
            println!("    {} = {}", key, value);
        }
    }

    println!("\nConsumers ({}):", info.consumers.len());
    for consumer in &info.consumers {
        println!("  - {} [{}] handler={}", consumer.topic, consumer.mode, consumer.handler);
    }
}
