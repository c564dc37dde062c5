//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, RuntimeConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<RuntimeConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<RuntimeConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<RuntimeConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BrokerKind, HandlerKind, WorkerLifecycle};

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
version = "V1"

[service]
name = "billing"
auto_commit = false
queue_capacity = 64
flush_interval_ms = 250
restart_backoff_ms = 1000
idle_backoff_ms = 500
worker_lifecycle = "per_poll"

[broker]
kind = "kafka"
brokers = ["kafka-1:9092", "kafka-2:9092"]
client_id = "billing-1"
consumer_group = "billing"
poll_max_records = 100

[broker.properties]
"session.timeout.ms" = "6000"

[[consumers]]
topic = "invoices"
batch = true
batch_max_count = 20
handler = "log"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert!(!config.service.auto_commit);
        assert_eq!(config.service.worker_lifecycle, WorkerLifecycle::PerPoll);
        assert_eq!(config.broker.kind, BrokerKind::Kafka);
        assert_eq!(config.broker.brokers.len(), 2);
        assert_eq!(
            config.broker.properties.get("session.timeout.ms").map(String::as_str),
            Some("6000")
        );
        assert_eq!(config.consumers[0].handler, HandlerKind::Log);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "service": { "name": "json-service" },
            "consumers": [{ "topic": "events", "batch": true, "batch_max_count": 10 }]
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        assert_eq!(result.unwrap().consumers[0].batch_max_count, 10);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_parse_unknown_lifecycle() {
        let content = r#"
[service]
worker_lifecycle = "forever"
"#;
        assert!(matches!(
            parse_toml(content),
            Err(ContractError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
