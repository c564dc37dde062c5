//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Topic Dispatch - topic-partitioned consumer runtime
#[derive(Parser, Debug)]
#[command(
    name = "topic-dispatch",
    author,
    version,
    about = "Topic-partitioned dispatch and batching consumer runtime",
    long_about = "Polls a message broker, fans records out to one worker per topic,\n\
                  batches them by count or time, and hands them to the configured\n\
                  handlers with per-topic ordering."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TOPIC_DISPATCH_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TOPIC_DISPATCH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the consumer service
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "dispatch.toml",
        env = "TOPIC_DISPATCH_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the broker backend from configuration
    #[arg(long, value_enum, env = "TOPIC_DISPATCH_BROKER")]
    pub broker: Option<BrokerArg>,

    /// Override seed brokers (comma separated)
    #[arg(long, value_delimiter = ',', env = "KAFKA_BROKERS")]
    pub brokers: Vec<String>,

    /// Override the client id
    #[arg(long, env = "KAFKA_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Override the consumer group
    #[arg(long, env = "KAFKA_CONSUMER_GROUP")]
    pub consumer_group: Option<String>,

    /// Override auto-commit
    #[arg(long, env = "KAFKA_COMMIT")]
    pub auto_commit: Option<bool>,

    /// Run timeout in seconds (0 = until interrupted)
    #[arg(long, default_value = "0", env = "TOPIC_DISPATCH_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Publish this many demo records per configured topic (memory broker only)
    #[arg(long, default_value = "0")]
    pub demo_records: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "TOPIC_DISPATCH_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "dispatch.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "dispatch.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show broker client properties
    #[arg(long)]
    pub properties: bool,
}

/// Broker backend selectable from the command line
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum BrokerArg {
    /// In-process broker
    Memory,
    /// Kafka cluster
    Kafka,
}

impl From<BrokerArg> for contracts::BrokerKind {
    fn from(arg: BrokerArg) -> Self {
        match arg {
            BrokerArg::Memory => Self::Memory,
            BrokerArg::Kafka => Self::Kafka,
        }
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "topic-dispatch",
            "run",
            "--config",
            "svc.toml",
            "--broker",
            "kafka",
            "--brokers",
            "k1:9092,k2:9092",
            "--consumer-group",
            "billing",
            "--auto-commit",
            "false",
            "--timeout",
            "5",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.config, PathBuf::from("svc.toml"));
        assert!(matches!(args.broker, Some(BrokerArg::Kafka)));
        assert_eq!(args.brokers, vec!["k1:9092", "k2:9092"]);
        assert_eq!(args.consumer_group.as_deref(), Some("billing"));
        assert_eq!(args.auto_commit, Some(false));
        assert_eq!(args.timeout, 5);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["topic-dispatch", "-q", "-v", "validate"]);
        assert!(result.is_err());
    }
}
