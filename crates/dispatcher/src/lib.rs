//! # Dispatcher
//!
//! 按 topic 分发与批处理的消费运行时。
//!
//! 负责：
//! - 单一 poll 循环，从 broker 拉取 `Record`
//! - 按 topic 懒创建 worker，通过有界队列移交（唯一的背压点）
//! - 按数量或定时器触发 batch flush，单 topic 内严格有序
//! - handler panic 隔离，generation panic 后自动重启

pub mod consumer;
pub mod error;
pub mod handle;
pub mod handlers;
pub mod handoff;
pub mod metrics;
pub mod producer;
pub mod registry;
pub mod service;
pub mod worker;

#[cfg(test)]
mod testing;

pub use consumer::Consumer;
pub use contracts::{BrokerClient, Record, RecordHandler};
pub use error::DispatcherError;
pub use handle::{TopicWorkerHandle, WorkerLane};
pub use handlers::LogHandler;
pub use handoff::{safe_send, safe_send_with_callback, Delivery};
pub use metrics::{MetricsSnapshot, WorkerMetrics};
pub use producer::{
    current_trace_id, with_trace_id, MessageValue, Producer, PublishCallback, TRACE_HEADER,
};
pub use registry::{ConsumerRegistry, WorkerRegistry};
pub use service::{DispatcherConfig, Service, ServiceBuilder};
pub use worker::{WorkerSettings, WorkerState};
