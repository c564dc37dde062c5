//! 配置校验模块
//!
//! 校验规则：
//! - service.name 非空
//! - queue_capacity 在 1..=65536
//! - 各时间间隔 > 0
//! - consumer topic 非空且唯一（按 trim 后比较）
//! - kafka broker 必须配置 brokers 与 consumer_group

use std::collections::HashSet;

use contracts::{BrokerKind, ContractError, RuntimeConfig};

/// Upper bound of the per-topic hand-off queue
pub const MAX_QUEUE_CAPACITY: usize = 65_536;

/// 校验 RuntimeConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &RuntimeConfig) -> Result<(), ContractError> {
    validate_service(config)?;
    validate_broker(config)?;
    validate_consumers(config)?;
    Ok(())
}

/// 校验 service 配置
fn validate_service(config: &RuntimeConfig) -> Result<(), ContractError> {
    let service = &config.service;

    if service.name.trim().is_empty() {
        return Err(ContractError::config_validation(
            "service.name",
            "service name cannot be empty",
        ));
    }

    if !(1..=MAX_QUEUE_CAPACITY).contains(&service.queue_capacity) {
        return Err(ContractError::config_validation(
            "service.queue_capacity",
            format!(
                "queue_capacity must be in 1..={MAX_QUEUE_CAPACITY}, got {}",
                service.queue_capacity
            ),
        ));
    }

    for (field, value) in [
        ("service.flush_interval_ms", service.flush_interval_ms),
        ("service.restart_backoff_ms", service.restart_backoff_ms),
        ("service.idle_backoff_ms", service.idle_backoff_ms),
    ] {
        if value == 0 {
            return Err(ContractError::config_validation(field, "interval must be > 0"));
        }
    }

    Ok(())
}

/// 校验 broker 配置
fn validate_broker(config: &RuntimeConfig) -> Result<(), ContractError> {
    let broker = &config.broker;

    if broker.poll_max_records == 0 {
        return Err(ContractError::config_validation(
            "broker.poll_max_records",
            "poll_max_records must be > 0",
        ));
    }

    if broker.kind == BrokerKind::Kafka {
        if broker.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err(ContractError::config_validation(
                "broker.brokers",
                "kafka broker requires at least one seed broker",
            ));
        }
        if broker
            .consumer_group
            .as_deref()
            .is_none_or(|g| g.trim().is_empty())
        {
            return Err(ContractError::config_validation(
                "broker.consumer_group",
                "kafka broker requires a consumer group",
            ));
        }
    }

    Ok(())
}

/// 校验 consumer 配置
fn validate_consumers(config: &RuntimeConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, consumer) in config.consumers.iter().enumerate() {
        let topic = consumer.topic.trim();
        if topic.is_empty() {
            return Err(ContractError::config_validation(
                format!("consumers[{idx}].topic"),
                "topic cannot be empty",
            ));
        }
        if !seen.insert(topic) {
            return Err(ContractError::config_validation(
                format!("consumers[topic={topic}]"),
                "duplicate topic",
            ));
        }
    }
    Ok(())
}
