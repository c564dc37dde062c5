//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Delivery model
//! - A `Record` is the unit of delivery, keyed by its topic
//! - Per-topic order is preserved from `BrokerClient::poll_batch` to `RecordHandler::handle`
//! - No ordering is promised across topics

mod broker;
mod config;
mod error;
mod handler;
mod record;

pub use broker::{BrokerClient, PollBatch};
pub use config::*;
pub use error::*;
pub use handler::{handler_fn, FnHandler, HandlerContext, HandlerResult, RecordHandler};
pub use record::{Record, RecordHeader};

/// Cancellation scope used across the runtime
pub use tokio_util::sync::CancellationToken;
