//! Upstream dispatch: turns a fully-built outbound request into either a
//! bounded, fully-buffered response body or a channel of body chunks for
//! streaming responses.
//!
//! Grounded on the teacher's `upstream_client` module: one process-wide
//! `wreq::Client`, per-chunk idle timeout while streaming via
//! `tokio::time::timeout` racing `bytes_stream().next()`, and transport
//! errors classified before they reach the retry loop.

use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use gproxy_provider_core::ProxyError;
use http::{HeaderMap, Method, StatusCode};
use tokio::sync::mpsc;

pub use gproxy_provider_impl::client::shared_client;

/// How long a streaming response may go without producing a chunk before
/// the gateway gives up on it. Not the same as the overall request timeout,
/// which bounds time-to-first-byte instead.
const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

pub enum UpstreamBody {
    Buffered(Bytes),
    Stream(mpsc::Receiver<Bytes>),
}

pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: UpstreamBody,
}

/// Sends one outbound request. `want_stream` only applies to a successful
/// (2xx) response — error responses are always fully buffered so the
/// caller can parse and log them.
pub async fn send(
    client: &wreq::Client,
    method: Method,
    url: &str,
    headers: HeaderMap,
    body: Bytes,
    timeout: Duration,
    want_stream: bool,
    max_buffered_bytes: usize,
) -> Result<UpstreamResponse, ProxyError> {
    let mut request = client.request(method, url).timeout(timeout);
    for (name, value) in headers.iter() {
        request = request.header(name, value);
    }

    let response = request
        .body(body)
        .send()
        .await
        .map_err(|err| ProxyError::UpstreamTransport(err.to_string()))?;

    let status = response.status();
    let headers = response.headers().clone();

    if !status.is_success() || !want_stream {
        let body = read_bounded(response, max_buffered_bytes).await?;
        return Ok(UpstreamResponse { status, headers, body: UpstreamBody::Buffered(body) });
    }

    let (tx, rx) = mpsc::channel::<Bytes>(16);
    tokio::spawn(async move {
        let mut stream = response.bytes_stream();
        loop {
            let next = match tokio::time::timeout(STREAM_IDLE_TIMEOUT, stream.next()).await {
                Ok(next) => next,
                Err(_) => break,
            };
            let Some(item) = next else { break };
            let Ok(chunk) = item else { break };
            if tx.send(chunk).await.is_err() {
                break;
            }
        }
    });

    Ok(UpstreamResponse { status, headers, body: UpstreamBody::Stream(rx) })
}

/// Drains a bounded number of bytes from a fully-buffered body, used for
/// a response body the caller already knows it must parse or forward
/// whole. Streaming bodies are handled frame-by-frame by the caller instead.
pub fn cap_buffered(body: Bytes, max_bytes: usize) -> Result<Bytes, ProxyError> {
    if body.len() > max_bytes {
        return Err(ProxyError::BodyTooLarge);
    }
    Ok(body)
}

/// Reads a full response body chunk-by-chunk, rejecting as soon as the
/// running total would cross `max_bytes` instead of materializing an
/// oversized body first. `wreq` decompresses transparently at the
/// transport layer (brotli/gzip/deflate/zstd), so this bound already
/// covers the decompressed size — there is no separate decode step to cap.
async fn read_bounded(response: wreq::Response, max_bytes: usize) -> Result<Bytes, ProxyError> {
    let mut stream = response.bytes_stream();
    let mut buf = bytes::BytesMut::new();
    while let Some(item) = stream.next().await {
        let chunk = item.map_err(|err| ProxyError::UpstreamTransport(err.to_string()))?;
        if buf.len() + chunk.len() > max_bytes {
            return Err(ProxyError::BodyTooLarge);
        }
        buf.extend_from_slice(&chunk);
    }
    cap_buffered(buf.freeze(), max_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_buffered_rejects_oversized_body() {
        let body = Bytes::from(vec![0u8; 10]);
        assert!(matches!(cap_buffered(body, 5), Err(ProxyError::BodyTooLarge)));
    }

    #[test]
    fn cap_buffered_accepts_body_within_bound() {
        let body = Bytes::from(vec![0u8; 5]);
        assert!(cap_buffered(body, 10).is_ok());
    }
}
