//! In-memory broker
//!
//! 用于测试与演示的进程内 broker，支持注入 poll 错误、记录 produce 的消息，
//! 以及 loopback（produce 的消息重新进入消费队列）。

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{BrokerClient, CancellationToken, ContractError, PollBatch, Record};
use tokio::sync::Notify;
use tracing::{debug, instrument};

/// Default maximum records per poll
pub const DEFAULT_POLL_MAX_RECORDS: usize = 500;

/// MemoryBroker 配置
#[derive(Debug, Clone)]
pub struct MemoryBrokerConfig {
    /// 单次 poll 返回的最大 record 数
    pub poll_max_records: usize,
    /// produce 的 record 是否回流到消费队列
    pub loopback: bool,
}

impl Default for MemoryBrokerConfig {
    fn default() -> Self {
        Self {
            poll_max_records: DEFAULT_POLL_MAX_RECORDS,
            loopback: false,
        }
    }
}

#[derive(Default)]
struct BrokerState {
    /// 待消费的 records（所有 topic，按到达顺序）
    queue: VecDeque<Record>,
    /// 下一次 poll 返回的错误
    errors: Vec<ContractError>,
    subscribed: HashSet<String>,
    paused: HashSet<String>,
    /// 已 produce 的 records
    produced: Vec<Record>,
    /// 每个 topic 的下一个 offset
    next_offsets: HashMap<String, i64>,
}

impl BrokerState {
    fn assign_position(&mut self, record: &mut Record) {
        if record.partition < 0 {
            record.partition = 0;
        }
        let next = self.next_offsets.entry(record.topic.clone()).or_insert(0);
        if record.offset < 0 {
            record.offset = *next;
        }
        *next = (*next).max(record.offset + 1);
    }

    fn is_deliverable(&self, topic: &str) -> bool {
        self.subscribed.contains(topic) && !self.paused.contains(topic)
    }
}

/// In-memory broker
pub struct MemoryBroker {
    config: MemoryBrokerConfig,
    state: Mutex<BrokerState>,
    /// 新 record / 订阅变化 / 关闭 时唤醒 poll
    notify: Notify,
    closed: AtomicBool,
    close_calls: AtomicUsize,
}

impl MemoryBroker {
    /// 创建默认 broker
    pub fn new() -> Self {
        Self::with_config(MemoryBrokerConfig::default())
    }

    /// 使用配置创建 broker
    pub fn with_config(config: MemoryBrokerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BrokerState::default()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// produce 的消息回流到消费队列的 broker
    pub fn loopback() -> Self {
        Self::with_config(MemoryBrokerConfig {
            loopback: true,
            ..MemoryBrokerConfig::default()
        })
    }

    /// 追加一条待消费的 record
    pub fn push(&self, record: Record) {
        self.push_batch([record]);
    }

    /// 按顺序追加多条 record
    pub fn push_batch(&self, records: impl IntoIterator<Item = Record>) {
        {
            let mut state = self.state();
            for mut record in records {
                state.assign_position(&mut record);
                state.queue.push_back(record);
            }
        }
        self.notify.notify_waiters();
    }

    /// 注入错误，下一次 poll 返回
    pub fn inject_error(&self, error: ContractError) {
        self.state().errors.push(error);
        self.notify.notify_waiters();
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.state().subscribed.contains(topic)
    }

    pub fn is_paused(&self, topic: &str) -> bool {
        self.state().paused.contains(topic)
    }

    /// 已订阅的 topics（排序）
    pub fn subscribed_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.state().subscribed.iter().cloned().collect();
        topics.sort();
        topics
    }

    /// 所有已 produce 的 records
    pub fn produced(&self) -> Vec<Record> {
        self.state().produced.clone()
    }

    /// 尚未被消费的 record 数
    pub fn pending_len(&self) -> usize {
        self.state().queue.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// `close` 被调用的次数
    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 取出可投递的 records；没有可返回内容时为 `None`
    fn take_ready(&self) -> Option<PollBatch> {
        let mut state = self.state();

        if !state.errors.is_empty() {
            return Some(PollBatch::errors(std::mem::take(&mut state.errors)));
        }

        let max = self.config.poll_max_records.max(1);
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(state.queue.len());
        while let Some(record) = state.queue.pop_front() {
            if taken.len() < max && state.is_deliverable(&record.topic) {
                taken.push(record);
            } else {
                kept.push_back(record);
            }
        }
        state.queue = kept;

        if taken.is_empty() {
            None
        } else {
            Some(PollBatch::records(taken))
        }
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerClient for MemoryBroker {
    async fn poll_batch(&self, scope: &CancellationToken) -> PollBatch {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking state so a concurrent push is not missed
            notified.as_mut().enable();

            if self.is_closed() {
                return PollBatch::closed();
            }
            if let Some(batch) = self.take_ready() {
                return batch;
            }

            tokio::select! {
                _ = scope.cancelled() => return PollBatch::default(),
                _ = &mut notified => {}
            }
        }
    }

    fn subscribe(&self, topic: &str) {
        {
            let mut state = self.state();
            state.paused.remove(topic);
            state.subscribed.insert(topic.to_string());
        }
        debug!(topic, "Memory broker subscribed");
        self.notify.notify_waiters();
    }

    fn pause(&self, topic: &str) {
        self.state().paused.insert(topic.to_string());
        debug!(topic, "Memory broker paused");
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    #[instrument(name = "memory_broker_produce", skip(self, record), fields(topic = %record.topic))]
    async fn produce(&self, mut record: Record) -> Result<Record, ContractError> {
        if self.is_closed() {
            return Err(ContractError::BrokerClosed);
        }

        {
            let mut state = self.state();
            state.assign_position(&mut record);
            state.produced.push(record.clone());
            if self.config.loopback {
                state.queue.push_back(record.clone());
            }
        }
        if self.config.loopback {
            self.notify.notify_waiters();
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn record(topic: &str, value: &'static str) -> Record {
        Record::new(topic, value)
    }

    fn values(batch: &PollBatch) -> Vec<&[u8]> {
        batch.records.iter().map(|r| &r.value[..]).collect()
    }

    #[tokio::test]
    async fn test_poll_returns_subscribed_topics_only() {
        let broker = MemoryBroker::new();
        broker.subscribe("a");
        broker.push_batch([record("a", "1"), record("b", "x"), record("a", "2")]);

        let batch = broker.poll_batch(&CancellationToken::new()).await;
        assert_eq!(values(&batch), vec![&b"1"[..], &b"2"[..]]);
        assert_eq!(batch.records[0].offset, 0);
        assert_eq!(batch.records[1].offset, 1);
        assert_eq!(broker.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_poll_respects_max_records() {
        let broker = MemoryBroker::with_config(MemoryBrokerConfig {
            poll_max_records: 2,
            loopback: false,
        });
        broker.subscribe("a");
        broker.push_batch([record("a", "1"), record("a", "2"), record("a", "3")]);

        let scope = CancellationToken::new();
        assert_eq!(broker.poll_batch(&scope).await.records.len(), 2);
        assert_eq!(values(&broker.poll_batch(&scope).await), vec![&b"3"[..]]);
    }

    #[tokio::test]
    async fn test_poll_waits_for_push() {
        let broker = Arc::new(MemoryBroker::new());
        broker.subscribe("a");

        let pusher = Arc::clone(&broker);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            pusher.push(record("a", "late"));
        });

        let batch = broker.poll_batch(&CancellationToken::new()).await;
        assert_eq!(values(&batch), vec![&b"late"[..]]);
    }

    #[tokio::test]
    async fn test_poll_returns_empty_on_cancel() {
        let broker = MemoryBroker::new();
        let scope = CancellationToken::new();
        scope.cancel();

        let batch = broker.poll_batch(&scope).await;
        assert!(batch.is_empty());
        assert!(!batch.closed);
    }

    #[tokio::test]
    async fn test_pause_and_resubscribe() {
        let broker = MemoryBroker::new();
        broker.subscribe("a");
        broker.pause("a");
        assert!(broker.is_paused("a"));
        broker.push(record("a", "held"));

        let scope = CancellationToken::new();
        let held = tokio::time::timeout(Duration::from_millis(30), broker.poll_batch(&scope)).await;
        assert!(held.is_err(), "paused topic must not be delivered");

        broker.subscribe("a");
        assert!(!broker.is_paused("a"));
        assert_eq!(values(&broker.poll_batch(&scope).await), vec![&b"held"[..]]);
    }

    #[tokio::test]
    async fn test_injected_errors_and_close() {
        let broker = MemoryBroker::new();
        broker.inject_error(ContractError::fetch("a", 0, "boom"));

        let scope = CancellationToken::new();
        let batch = broker.poll_batch(&scope).await;
        assert_eq!(batch.errors.len(), 1);

        broker.close();
        broker.close();
        assert!(broker.poll_batch(&scope).await.closed);
        assert_eq!(broker.close_count(), 2);
        assert!(matches!(
            broker.produce(record("a", "x")).await,
            Err(ContractError::BrokerClosed)
        ));
    }

    #[tokio::test]
    async fn test_produce_loopback() {
        let broker = MemoryBroker::loopback();
        broker.subscribe("echo");

        let produced = broker.produce(record("echo", "ping")).await.unwrap();
        assert_eq!(produced.partition, 0);
        assert_eq!(produced.offset, 0);
        assert_eq!(broker.produced().len(), 1);

        let batch = broker.poll_batch(&CancellationToken::new()).await;
        assert_eq!(values(&batch), vec![&b"ping"[..]]);
    }
}
