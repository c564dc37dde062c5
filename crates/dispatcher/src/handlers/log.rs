//! LogHandler - logs record summaries via tracing

use async_trait::async_trait;
use contracts::{HandlerContext, HandlerResult, Record, RecordHandler};
use tracing::{info, instrument};

/// Values longer than this are truncated in logs
const DEFAULT_PREVIEW_LEN: usize = 256;

/// Handler that logs every record for debugging
pub struct LogHandler {
    name: String,
    preview_len: usize,
}

impl LogHandler {
    /// Create a new LogHandler with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            preview_len: DEFAULT_PREVIEW_LEN,
        }
    }

    pub fn with_preview_len(mut self, preview_len: usize) -> Self {
        self.preview_len = preview_len;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn preview(&self, bytes: &[u8]) -> String {
        let text = String::from_utf8_lossy(bytes);
        match text.char_indices().nth(self.preview_len) {
            Some((idx, _)) => format!("{}...", &text[..idx]),
            None => text.into_owned(),
        }
    }

    fn log_record(&self, ctx: &HandlerContext, record: &Record) {
        info!(
            handler = %self.name,
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            key = ?record.key.as_deref().map(|k| self.preview(k)),
            value = %self.preview(&record.value),
            auto_commit = ctx.auto_commit(),
            "Record received"
        );
    }
}

#[async_trait]
impl RecordHandler for LogHandler {
    #[instrument(
        name = "log_handler_handle",
        skip(self, ctx, records),
        fields(handler = %self.name, records = records.len())
    )]
    async fn handle(&self, ctx: &HandlerContext, records: &[Record]) -> HandlerResult {
        for record in records {
            self.log_record(ctx, record);
        }
        Ok(())
    }
}
