//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{BrokerKind, RuntimeConfig, WorkerLifecycle};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    service: String,
    broker: String,
    consumer_count: usize,
    batching_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            let batching_count = config
                .consumers
                .iter()
                .filter(|c| c.batch && c.batch_max_count > 1)
                .count();

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    service: config.service.name.clone(),
                    broker: format!("{:?}", config.broker.kind),
                    consumer_count: config.consumers.len(),
                    batching_count,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &RuntimeConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.consumers.is_empty() {
        warnings.push(
            "No consumers configured - the service idles until consumers are registered"
                .to_string(),
        );
    }

    for consumer in &config.consumers {
        if consumer.batch && consumer.batch_max_count <= 1 {
            warnings.push(format!(
                "Consumer '{}' enables batching with batch_max_count {} - records are delivered one at a time",
                consumer.topic, consumer.batch_max_count
            ));
        }
    }

    if config.service.worker_lifecycle == WorkerLifecycle::PerPoll {
        warnings.push(
            "worker_lifecycle = per_poll - batches never span poll calls and the flush timer rarely fires"
                .to_string(),
        );
    }

    if config.broker.kind == BrokerKind::Kafka && !cfg!(feature = "kafka") {
        warnings.push(
            "broker.kind = kafka but this binary was built without the 'kafka' feature".to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("OK Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Service: {}", summary.service);
            println!("  Broker: {}", summary.broker);
            println!("  Consumers: {}", summary.consumer_count);
            println!("  Batching consumers: {}", summary.batching_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\nWarnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("FAILED Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
