//! BrokerClient trait - the poll loop's input and the producer's output
//!
//! The broker connection itself lives outside the runtime; this trait is the
//! whole surface the dispatcher relies on.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::{ContractError, Record};

/// Result of a single poll call
#[derive(Debug, Default)]
pub struct PollBatch {
    /// Records in broker order
    pub records: Vec<Record>,
    /// Per-batch fetch errors (transient)
    pub errors: Vec<ContractError>,
    /// The client has been closed; no further batches will arrive
    pub closed: bool,
}

impl PollBatch {
    /// Batch carrying records only
    pub fn records(records: Vec<Record>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    /// Batch carrying fetch errors only
    pub fn errors(errors: Vec<ContractError>) -> Self {
        Self {
            errors,
            ..Default::default()
        }
    }

    /// Terminal batch signalling a closed client
    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.errors.is_empty()
    }
}

/// Broker client trait
///
/// Implementations must be safe to share between the poll loop and producers.
/// `subscribe`, `pause` and `close` are called while registry locks are held
/// and must not block.
pub trait BrokerClient: Send + Sync + 'static {
    /// Wait for the next batch of records
    ///
    /// Returns early with an empty batch when `scope` is cancelled.
    fn poll_batch(&self, scope: &CancellationToken) -> impl Future<Output = PollBatch> + Send;

    /// Start fetching records for `topic`
    fn subscribe(&self, topic: &str);

    /// Stop fetching records for `topic`
    fn pause(&self, topic: &str);

    /// Close the client; subsequent polls report `closed`
    fn close(&self);

    /// Produce a record and wait for the broker acknowledgement
    ///
    /// # Returns
    /// The record as acknowledged (partition/offset assigned)
    fn produce(&self, record: Record)
        -> impl Future<Output = Result<Record, ContractError>> + Send;
}
