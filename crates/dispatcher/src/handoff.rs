//! Bounded hand-off queue between the poll loop and a topic worker
//!
//! The queue is the only backpressure point: a slow handler fills its queue,
//! which stalls `safe_send` in the poll loop, which stalls polling.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::DispatcherError;

/// Lower bound applied to configured capacities
pub const MIN_QUEUE_CAPACITY: usize = 1;

/// Outcome of a safe send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Item accepted by the queue
    Sent,
    /// Scope was already cancelled; nothing was attempted
    Skipped,
    /// Scope was cancelled while waiting for queue space
    Cancelled,
    /// Receiver is gone
    Closed,
}

impl Delivery {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }

    /// Convert a failed delivery into an error
    pub fn into_result(self) -> Result<(), DispatcherError> {
        match self {
            Self::Sent => Ok(()),
            Self::Skipped => Err(DispatcherError::HandoffSkipped),
            Self::Cancelled => Err(DispatcherError::HandoffCancelled),
            Self::Closed => Err(DispatcherError::HandoffClosed),
        }
    }
}

/// Create a bounded hand-off queue
pub fn handoff_queue<T>(capacity: usize) -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(capacity.max(MIN_QUEUE_CAPACITY))
}

/// Send `item` unless `scope` is cancelled
///
/// Never blocks on a dead worker: returns immediately when the scope is
/// already cancelled, and stops waiting for queue space as soon as it is
/// cancelled concurrently.
pub async fn safe_send<T>(scope: &CancellationToken, tx: &mpsc::Sender<T>, item: T) -> Delivery {
    if scope.is_cancelled() {
        return Delivery::Skipped;
    }

    tokio::select! {
        biased;
        _ = scope.cancelled() => Delivery::Cancelled,
        result = tx.send(item) => match result {
            Ok(()) => Delivery::Sent,
            Err(_) => Delivery::Closed,
        },
    }
}

/// `safe_send`, reporting undelivered items to `callback`
///
/// The callback is not invoked on success.
pub async fn safe_send_with_callback<T, F>(
    scope: &CancellationToken,
    tx: &mpsc::Sender<T>,
    item: T,
    callback: F,
) -> Delivery
where
    F: FnOnce(DispatcherError),
{
    let delivery = safe_send(scope, tx, item).await;
    if let Err(e) = delivery.into_result() {
        callback(e);
    }
    delivery
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_safe_send_delivers() {
        let (tx, mut rx) = handoff_queue(1);
        let scope = CancellationToken::new();

        assert_eq!(safe_send(&scope, &tx, 42).await, Delivery::Sent);
        assert_eq!(rx.try_recv().unwrap(), 42);
    }

    #[tokio::test]
    async fn test_safe_send_skips_cancelled_scope() {
        let (tx, mut rx) = handoff_queue(1);
        let scope = CancellationToken::new();
        scope.cancel();

        assert_eq!(safe_send(&scope, &tx, 100).await, Delivery::Skipped);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_safe_send_skip_does_not_block_on_full_queue() {
        let (tx, _rx) = handoff_queue(1);
        let scope = CancellationToken::new();
        assert!(safe_send(&scope, &tx, 1).await.is_sent());

        scope.cancel();
        let delivery = tokio::time::timeout(Duration::from_millis(100), safe_send(&scope, &tx, 2))
            .await
            .expect("safe_send blocked on a cancelled scope");
        assert_eq!(delivery, Delivery::Skipped);
    }

    #[tokio::test]
    async fn test_safe_send_cancelled_while_waiting() {
        let (tx, _rx) = handoff_queue(1);
        let scope = CancellationToken::new();
        assert!(safe_send(&scope, &tx, 1).await.is_sent());

        let canceller = scope.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        assert_eq!(safe_send(&scope, &tx, 2).await, Delivery::Cancelled);
    }

    #[tokio::test]
    async fn test_safe_send_closed_receiver() {
        let (tx, rx) = handoff_queue::<u32>(4);
        drop(rx);
        let scope = CancellationToken::new();

        assert_eq!(safe_send(&scope, &tx, 7).await, Delivery::Closed);
    }

    #[tokio::test]
    async fn test_safe_send_with_callback() {
        let (tx, mut rx) = handoff_queue(1);
        let scope = CancellationToken::new();

        let mut called = false;
        safe_send_with_callback(&scope, &tx, 99, |_| called = true).await;
        assert_eq!(rx.try_recv().unwrap(), 99);
        assert!(!called, "callback should not be called on success");

        scope.cancel();
        let mut error = None;
        safe_send_with_callback(&scope, &tx, 100, |e| error = Some(e)).await;
        assert!(matches!(error, Some(DispatcherError::HandoffSkipped)));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (tx, _rx) = handoff_queue::<u8>(0);
        assert_eq!(tx.max_capacity(), MIN_QUEUE_CAPACITY);
    }
}
