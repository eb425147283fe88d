//! HTTP-facing error surfaces built on top of `gproxy_provider_core::ProxyError`.
//!
//! The Lifecycle Engine reasons about the `ProxyError` kind internally;
//! this module is only concerned with turning a final kind into bytes a
//! client can read, in either the Claude error envelope or a plain JSON
//! envelope for the native dialects.

use bytes::Bytes;
use gproxy_protocol::claude;
use gproxy_provider_core::ProxyError;
use http::StatusCode;

/// Builds the Claude-format error body (`{"type":"error","error":{...}}`)
/// for any `ProxyError`, regardless of which dialect the upstream speaks —
/// CC-supported groups and transcoder failures both surface through this.
pub fn claude_error_body(err: &ProxyError) -> Bytes {
    let body = claude::ErrorResponse::new(err.claude_error_type(), err.client_message());
    serde_json::to_vec(&body)
        .map(Bytes::from)
        .unwrap_or_else(|_| Bytes::from_static(br#"{"type":"error","error":{"type":"api_error","message":"internal error"}}"#))
}

/// Plain JSON envelope used when the client spoke a dialect natively
/// (no Claude-format translation to preserve).
pub fn plain_error_body(err: &ProxyError) -> Bytes {
    let body = serde_json::json!({"error": {"message": err.client_message(), "type": err.claude_error_type()}});
    serde_json::to_vec(&body).map(Bytes::from).unwrap_or_default()
}

pub fn status_for(err: &ProxyError) -> StatusCode {
    err.http_status()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_error_body_is_well_formed_json() {
        let err = ProxyError::UpstreamStatus { status: 429, message: "slow down".to_string() };
        let body = claude_error_body(&err);
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["type"], "rate_limit_error");
        assert_eq!(value["error"]["message"], "slow down");
    }

    #[test]
    fn status_for_client_aborted_is_499() {
        assert_eq!(status_for(&ProxyError::ClientAborted).as_u16(), 499);
    }
}
