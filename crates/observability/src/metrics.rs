//! 分发引擎指标模块
//!
//! 基于 `metrics` facade 记录 poll loop 与 topic worker 的运行指标。
//! 未安装 recorder 时所有调用均为空操作。

use metrics::{counter, gauge, histogram};

/// 批次刷新触发原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// 非批量模式，单条直接投递
    Single,
    /// 达到 batch_max_count
    Count,
    /// 定时器触发
    Timer,
    /// worker 关闭前的最后一次刷新
    Drain,
}

impl FlushTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Count => "count",
            Self::Timer => "timer",
            Self::Drain => "drain",
        }
    }
}

/// 记录被丢弃的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// topic 没有注册 consumer
    UnknownTopic,
    /// worker 已取消，safe send 跳过
    WorkerCancelled,
    /// worker 队列已关闭
    WorkerClosed,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownTopic => "unknown_topic",
            Self::WorkerCancelled => "worker_cancelled",
            Self::WorkerClosed => "worker_closed",
        }
    }
}

/// 记录一次 poll 返回的记录数
pub fn record_records_polled(count: usize) {
    counter!("topic_dispatch_poll_total").increment(1);
    histogram!("topic_dispatch_poll_batch_size").record(count as f64);
}

/// 记录 poll 错误
pub fn record_poll_error() {
    counter!("topic_dispatch_poll_errors_total").increment(1);
}

/// 记录投递到 worker 队列的记录
pub fn record_record_dispatched(topic: &str) {
    counter!(
        "topic_dispatch_records_dispatched_total",
        "topic" => topic.to_string()
    )
    .increment(1);
}

/// 记录被丢弃的记录
pub fn record_record_dropped(topic: &str, reason: DropReason) {
    counter!(
        "topic_dispatch_records_dropped_total",
        "topic" => topic.to_string(),
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// 记录一次 handler 调用 (批次刷新)
pub fn record_batch_flushed(topic: &str, size: usize, trigger: FlushTrigger) {
    counter!(
        "topic_dispatch_batches_flushed_total",
        "topic" => topic.to_string(),
        "trigger" => trigger.as_str()
    )
    .increment(1);
    histogram!(
        "topic_dispatch_batch_size",
        "topic" => topic.to_string()
    )
    .record(size as f64);
}

/// 记录 handler 返回错误
pub fn record_handler_failure(topic: &str) {
    counter!(
        "topic_dispatch_handler_failures_total",
        "topic" => topic.to_string()
    )
    .increment(1);
}

/// 记录 handler panic
pub fn record_handler_panic(topic: &str) {
    counter!(
        "topic_dispatch_handler_panics_total",
        "topic" => topic.to_string()
    )
    .increment(1);
}

/// 记录 generation 重启
pub fn record_generation_restart(service: &str) {
    counter!(
        "topic_dispatch_generation_restarts_total",
        "service" => service.to_string()
    )
    .increment(1);
}

/// 记录当前存活的 worker 数量
pub fn record_worker_count(service: &str, count: usize) {
    gauge!(
        "topic_dispatch_workers_active",
        "service" => service.to_string()
    )
    .set(count as f64);
}
