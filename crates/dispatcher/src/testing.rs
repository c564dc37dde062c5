//! Test doubles shared by the unit tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use contracts::{ContractError, HandlerContext, HandlerResult, Record, RecordHandler};

/// Values seen by a `RecordingHandler`, one entry per call
#[derive(Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<Vec<String>>>>);

impl CallLog {
    pub(crate) fn batches(&self) -> Vec<Vec<String>> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub(crate) fn values(&self) -> Vec<String> {
        self.batches().into_iter().flatten().collect()
    }
}

/// Handler recording every batch
///
/// A record with value `panic` makes the call panic before it is recorded;
/// a record with value `fail` is recorded and the call returns an error.
pub(crate) struct RecordingHandler {
    log: CallLog,
    delay: Duration,
}

impl RecordingHandler {
    pub(crate) fn new() -> Self {
        Self {
            log: CallLog::default(),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn log(&self) -> CallLog {
        self.log.clone()
    }
}

#[async_trait]
impl RecordHandler for RecordingHandler {
    async fn handle(&self, ctx: &HandlerContext, records: &[Record]) -> HandlerResult {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let values: Vec<String> = records
            .iter()
            .map(|r| String::from_utf8_lossy(&r.value).into_owned())
            .collect();
        if values.iter().any(|v| v == "panic") {
            panic!("mock handler panic on {}", ctx.topic());
        }
        let failed = values.iter().any(|v| v == "fail");
        self.log.0.lock().unwrap().push(values);
        if failed {
            return Err(ContractError::handler(ctx.topic(), "mock failure"));
        }
        Ok(())
    }
}

pub(crate) fn record(topic: &str, value: &str) -> Record {
    Record::new(topic, value.to_string())
}
