//! Request-log sink. The engine awaits `record`, but what happens after — batching,
//! persistence, shipping — is the sink's concern, not the core's.

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success,
    Retry,
    Final,
    ClientAborted,
}

#[derive(Debug, Clone)]
pub struct RequestLogRecord {
    pub trace_id: String,
    pub group_id: String,
    pub sub_group_id: Option<String>,
    pub attempt_index: u32,
    pub outcome: RequestOutcome,
    pub status: Option<u16>,
    pub parsed_error: Option<String>,
    pub masked_key: Option<String>,
    pub elapsed_ms: u64,
}

#[async_trait]
pub trait RequestLogSink: Send + Sync {
    async fn record(&self, record: RequestLogRecord);
}

/// A sink that drops every record; useful for tests and for deployments
/// that run with logging disabled at the collaborator layer.
pub struct NullRequestLogSink;

#[async_trait]
impl RequestLogSink for NullRequestLogSink {
    async fn record(&self, _record: RequestLogRecord) {}
}
