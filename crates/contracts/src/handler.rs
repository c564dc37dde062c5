//! RecordHandler trait - application-supplied consumer logic
//!
//! Handlers are stored as `Arc<dyn RecordHandler>` in the consumer registry,
//! so the trait stays object safe through `async_trait`.

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{ContractError, Record};

/// Outcome of a single handler invocation
pub type HandlerResult = Result<(), ContractError>;

/// Per-invocation context handed to a handler
#[derive(Debug, Clone)]
pub struct HandlerContext {
    topic: String,
    scope: CancellationToken,
    auto_commit: bool,
}

impl HandlerContext {
    pub fn new(topic: impl Into<String>, scope: CancellationToken, auto_commit: bool) -> Self {
        Self {
            topic: topic.into(),
            scope,
            auto_commit,
        }
    }

    /// Topic the records belong to
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Cancellation scope of the owning worker
    pub fn scope(&self) -> &CancellationToken {
        &self.scope
    }

    /// Whether the broker client commits offsets automatically
    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }
}

/// Consumer handler trait
///
/// Invoked with `1..=batch_max_count` records, strictly sequentially per topic.
/// The slice is only valid for the duration of the call.
#[async_trait]
pub trait RecordHandler: Send + Sync {
    async fn handle(&self, ctx: &HandlerContext, records: &[Record]) -> HandlerResult;
}

/// Adapter turning an async closure into a `RecordHandler`
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a handler
///
/// The closure receives owned copies of the context and records.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(HandlerContext, Vec<Record>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> RecordHandler for FnHandler<F>
where
    F: Fn(HandlerContext, Vec<Record>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, ctx: &HandlerContext, records: &[Record]) -> HandlerResult {
        (self.f)(ctx.clone(), records.to_vec()).await
    }
}
