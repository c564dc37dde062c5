//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置 -> 服务装配测试
//! - MemoryBroker -> Service -> handler 的 e2e 测试（无需 Kafka）
//! - producer trace id 透传

#[cfg(test)]
mod support {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{handler_fn, HandlerContext, Record, RecordHandler};

    /// Batches seen by a handler, as string values
    #[derive(Clone, Default)]
    pub struct Seen(Arc<Mutex<Vec<Vec<String>>>>);

    impl Seen {
        pub fn batches(&self) -> Vec<Vec<String>> {
            self.0.lock().unwrap().clone()
        }

        pub fn flat(&self) -> Vec<String> {
            self.batches().into_iter().flatten().collect()
        }

        pub fn count(&self) -> usize {
            self.0.lock().unwrap().iter().map(Vec::len).sum()
        }

        /// Handler recording every batch into this log
        pub fn handler(&self) -> impl RecordHandler + 'static {
            let seen = self.clone();
            handler_fn(move |_ctx: HandlerContext, records: Vec<Record>| {
                let values = records
                    .iter()
                    .map(|r| String::from_utf8_lossy(&r.value).into_owned())
                    .collect();
                seen.0.lock().unwrap().push(values);
                std::future::ready(Ok::<(), contracts::ContractError>(()))
            })
        }
    }

    pub async fn eventually(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    pub fn record(topic: &str, value: &str) -> Record {
        Record::new(topic, value.to_string())
    }
}

#[cfg(test)]
mod config_tests {
    use broker::Broker;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{BrokerKind, WorkerLifecycle};
    use dispatcher::{Consumer, DispatcherConfig, Service};
    use std::sync::Arc;
    use std::time::Duration;

    const CONFIG: &str = r#"
[service]
name = "billing"
queue_capacity = 64
flush_interval_ms = 250
worker_lifecycle = "per_poll"

[broker]
kind = "memory"
poll_max_records = 10

[[consumers]]
topic = "orders"
batch = true
batch_max_count = 3

[[consumers]]
topic = " alerts "
"#;

    #[test]
    fn test_config_to_service_wiring() {
        let config = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        assert_eq!(config.broker.kind, BrokerKind::Memory);

        let dispatcher_config = DispatcherConfig::from(&config.service);
        assert_eq!(dispatcher_config.name, "billing");
        assert_eq!(dispatcher_config.worker.queue_capacity, 64);
        assert_eq!(dispatcher_config.worker.flush_interval, Duration::from_millis(250));
        assert_eq!(dispatcher_config.worker_lifecycle, WorkerLifecycle::PerPoll);

        let client = Broker::from_config(&config.broker, config.service.auto_commit).unwrap();
        let service = Service::builder(Arc::new(client))
            .config(dispatcher_config)
            .consumers(config.consumers.iter().map(Consumer::from_config))
            .build();

        assert_eq!(service.registered_topics(), vec!["alerts", "orders"]);
        let memory = service.client().as_memory().unwrap();
        assert!(memory.is_subscribed("orders"));
        assert!(memory.is_subscribed("alerts"));
    }

    #[test]
    fn test_json_and_toml_agree() {
        let from_toml = ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&from_toml).unwrap();
        let from_json = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();

        assert_eq!(from_json.service.name, from_toml.service.name);
        assert_eq!(from_json.consumers.len(), 2);
        assert_eq!(from_json.consumers[0].batch_max_count, 3);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use broker::MemoryBroker;
    use bytes::Bytes;
    use contracts::{handler_fn, HandlerContext, Record, WorkerLifecycle};
    use dispatcher::{
        with_trace_id, Consumer, DispatcherConfig, MessageValue, Service, WorkerSettings,
        TRACE_HEADER,
    };

    use crate::support::{eventually, record, Seen};

    fn config(flush_ms: u64) -> DispatcherConfig {
        DispatcherConfig {
            name: "e2e".to_string(),
            worker: WorkerSettings {
                flush_interval: Duration::from_millis(flush_ms),
                ..Default::default()
            },
            idle_backoff: Duration::from_millis(20),
            restart_backoff: Duration::from_millis(20),
            ..Default::default()
        }
    }

    /// End-to-end: MemoryBroker -> Service -> batching and passthrough handlers
    ///
    /// 验证：
    /// 1. 批量 consumer 按数量 flush，剩余记录由定时器 flush
    /// 2. 非批量 consumer 每条记录单独调用
    /// 3. 单 topic 内顺序不变
    #[tokio::test]
    async fn test_e2e_count_and_timer_batching() {
        let broker = Arc::new(MemoryBroker::new());
        let orders = Seen::default();
        let alerts = Seen::default();

        let service = Service::builder(Arc::clone(&broker))
            .config(config(50))
            .consumers([
                Consumer::batched("orders", 3, orders.handler()),
                Consumer::single("alerts", alerts.handler()),
            ])
            .build();
        let handle = service.run().unwrap();

        broker.push_batch([
            record("orders", "o1"),
            record("alerts", "a1"),
            record("orders", "o2"),
            record("orders", "o3"),
            record("alerts", "a2"),
            record("orders", "o4"),
        ]);

        eventually(|| orders.count() == 4 && alerts.count() == 2).await;

        assert_eq!(
            orders.batches(),
            vec![vec!["o1", "o2", "o3"], vec!["o4"]]
        );
        assert_eq!(alerts.batches(), vec![vec!["a1"], vec!["a2"]]);

        service.shutdown();
        handle.await.unwrap();
        assert_eq!(broker.close_count(), 1);
    }

    #[tokio::test]
    async fn test_e2e_order_preserved_under_load() {
        let broker = Arc::new(MemoryBroker::new());
        let seen = Seen::default();

        let service = Service::builder(Arc::clone(&broker))
            .config(config(10))
            .consumers([Consumer::batched("events", 7, seen.handler())])
            .build();
        let handle = service.run().unwrap();

        let expected: Vec<String> = (0..200).map(|i| format!("e{i}")).collect();
        broker.push_batch(expected.iter().map(|v| record("events", v)));

        eventually(|| seen.count() == expected.len()).await;
        assert_eq!(seen.flat(), expected);
        assert!(seen.batches().iter().all(|b| !b.is_empty() && b.len() <= 7));

        service.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_e2e_per_poll_lifecycle() {
        let broker = Arc::new(MemoryBroker::new());
        let seen = Seen::default();

        let mut config = config(60_000);
        config.worker_lifecycle = WorkerLifecycle::PerPoll;

        let service = Service::builder(Arc::clone(&broker))
            .config(config)
            .consumers([Consumer::batched("orders", 10, seen.handler())])
            .build();
        let handle = service.run().unwrap();

        broker.push_batch([record("orders", "o1"), record("orders", "o2")]);

        // Flush interval is far away, so only the per-poll drain can deliver
        eventually(|| seen.count() == 2).await;
        assert_eq!(seen.batches(), vec![vec!["o1", "o2"]]);
        eventually(|| service.active_workers().is_empty()).await;

        service.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_e2e_trace_id_roundtrip() {
        let broker = Arc::new(MemoryBroker::loopback());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Record>();

        let service = Service::builder(Arc::clone(&broker))
            .config(config(50))
            .consumers([Consumer::single(
                "audit",
                handler_fn(move |_ctx: HandlerContext, records: Vec<Record>| {
                    let tx = tx.clone();
                    async move {
                        for record in records {
                            let _ = tx.send(record);
                        }
                        Ok(())
                    }
                }),
            )])
            .build();
        let handle = service.run().unwrap();

        let value = MessageValue::structured(&serde_json::json!({ "user": 7 })).unwrap();
        with_trace_id(
            "trace-42",
            service
                .producer()
                .publish("audit", Some(Bytes::from_static(b"k")), value, Vec::new()),
        )
        .await
        .unwrap();

        let delivered = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            delivered.header(TRACE_HEADER).map(|v| &v[..]),
            Some(&b"trace-42"[..])
        );
        assert_eq!(delivered.key.as_deref(), Some(&b"k"[..]));
        let body: serde_json::Value = serde_json::from_slice(&delivered.value).unwrap();
        assert_eq!(body["user"], 7);

        service.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_e2e_panicking_handler_isolated() {
        let broker = Arc::new(MemoryBroker::new());
        let healthy = Seen::default();

        let service = Service::builder(Arc::clone(&broker))
            .config(config(50))
            .consumers([
                Consumer::single(
                    "faulty",
                    handler_fn(|_ctx: HandlerContext, records: Vec<Record>| async move {
                        if records.iter().any(|r| &r.value[..] == b"boom") {
                            panic!("handler exploded");
                        }
                        Ok(())
                    }),
                ),
                Consumer::single("healthy", healthy.handler()),
            ])
            .build();
        let handle = service.run().unwrap();

        broker.push_batch([
            record("faulty", "boom"),
            record("healthy", "h1"),
            record("faulty", "fine"),
            record("healthy", "h2"),
        ]);

        eventually(|| healthy.count() == 2).await;
        eventually(|| {
            service
                .worker_metrics()
                .iter()
                .any(|(topic, m)| topic == "faulty" && m.panic_count == 1 && m.batch_count == 2)
        })
        .await;
        assert_eq!(service.generation_restarts(), 0);

        service.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_e2e_late_registration() {
        let broker = Arc::new(MemoryBroker::new());
        let seen = Seen::default();

        let service = Service::new(Arc::clone(&broker), config(50));
        let handle = service.run().unwrap();

        // Nothing registered yet; the service idles
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(service.registered_topics().is_empty());

        service.register_consumers([Consumer::single("late", seen.handler())]);
        broker.push(record("late", "l1"));

        eventually(|| seen.count() == 1).await;

        service.shutdown();
        handle.await.unwrap();
    }
}
