//! `RequestLogSink` that forwards every record into `tracing`, matching the
//! teacher's habit of treating its own event bus as the log of record when
//! no external sink is configured.

use async_trait::async_trait;
use gproxy_provider_core::log::{RequestLogRecord, RequestLogSink, RequestOutcome};

pub struct TracingRequestLogSink;

#[async_trait]
impl RequestLogSink for TracingRequestLogSink {
    async fn record(&self, record: RequestLogRecord) {
        match record.outcome {
            RequestOutcome::Success => tracing::info!(
                trace_id = %record.trace_id,
                group = %record.group_id,
                sub_group = record.sub_group_id.as_deref(),
                attempt = record.attempt_index,
                status = record.status,
                elapsed_ms = record.elapsed_ms,
                masked_key = record.masked_key.as_deref(),
                "request succeeded"
            ),
            RequestOutcome::Retry => tracing::warn!(
                trace_id = %record.trace_id,
                group = %record.group_id,
                sub_group = record.sub_group_id.as_deref(),
                attempt = record.attempt_index,
                status = record.status,
                parsed_error = record.parsed_error.as_deref(),
                elapsed_ms = record.elapsed_ms,
                masked_key = record.masked_key.as_deref(),
                "attempt failed, retrying"
            ),
            RequestOutcome::Final => tracing::error!(
                trace_id = %record.trace_id,
                group = %record.group_id,
                sub_group = record.sub_group_id.as_deref(),
                attempt = record.attempt_index,
                status = record.status,
                parsed_error = record.parsed_error.as_deref(),
                elapsed_ms = record.elapsed_ms,
                masked_key = record.masked_key.as_deref(),
                "request exhausted retries"
            ),
            RequestOutcome::ClientAborted => tracing::info!(
                trace_id = %record.trace_id,
                group = %record.group_id,
                sub_group = record.sub_group_id.as_deref(),
                attempt = record.attempt_index,
                elapsed_ms = record.elapsed_ms,
                "client disconnected before completion"
            ),
        }
    }
}
