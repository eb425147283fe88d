use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use futures_util::StreamExt;
use gproxy_core::{EngineBody, EngineRequest, EngineResponse, ProxyEngine};
use tokio::sync::watch;
use tokio_stream::wrappers::ReceiverStream;

const SSE_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const SSE_HEARTBEAT_FRAME: &[u8] = b": keep-alive\n\n";

pub fn proxy_router(engine: Arc<ProxyEngine>) -> Router {
    Router::new()
        .route("/proxy/{group_name}/{*rest}", any(proxy_handler))
        .with_state(engine)
}

async fn proxy_handler(
    State(engine): State<Arc<ProxyEngine>>,
    Path((group_name, rest)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let trace_id = uuid::Uuid::now_v7().to_string();
    let rest_path = format!("/{rest}");
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let req = EngineRequest {
        group_name,
        rest_path,
        method,
        headers,
        body,
        query,
        trace_id,
        cancel: cancel_rx,
        cancel_tx,
    };

    to_axum_response(engine.handle_proxy(req).await)
}

fn to_axum_response(resp: EngineResponse) -> Response {
    let sse_stream = has_sse_content_type(&resp.headers) && matches!(&resp.body, EngineBody::Stream(_));

    let mut builder = Response::builder().status(resp.status);
    if let Some(out_headers) = builder.headers_mut() {
        for (name, value) in resp.headers.iter() {
            if is_hop_by_hop_or_framing_header(name.as_str()) {
                continue;
            }
            out_headers.append(name.clone(), value.clone());
        }
        if sse_stream {
            out_headers
                .entry(header::CACHE_CONTROL)
                .or_insert(HeaderValue::from_static("no-cache"));
            if let Ok(name) = HeaderName::from_bytes(b"x-accel-buffering") {
                out_headers.entry(name).or_insert(HeaderValue::from_static("no"));
            }
        }
    }

    let body = match resp.body {
        EngineBody::Buffered(bytes) => Body::from(bytes),
        EngineBody::Stream(rx) => {
            let rx = if sse_stream { wrap_sse_stream_with_heartbeat(rx) } else { rx };
            let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
            Body::from_stream(stream)
        }
    };

    builder
        .body(body)
        .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, "response_build_failed").into_response())
}

fn has_sse_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("text/event-stream"))
}

fn wrap_sse_stream_with_heartbeat(
    mut upstream_rx: tokio::sync::mpsc::Receiver<bytes::Bytes>,
) -> tokio::sync::mpsc::Receiver<bytes::Bytes> {
    let (tx, rx) = tokio::sync::mpsc::channel::<bytes::Bytes>(32);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SSE_HEARTBEAT_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                maybe_chunk = upstream_rx.recv() => {
                    let Some(chunk) = maybe_chunk else { break };
                    if tx.send(chunk).await.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if tx.send(bytes::Bytes::from_static(SSE_HEARTBEAT_FRAME)).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

fn is_hop_by_hop_or_framing_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("content-length")
        || name.eq_ignore_ascii_case("transfer-encoding")
        || name.eq_ignore_ascii_case("connection")
        || name.eq_ignore_ascii_case("keep-alive")
        || name.eq_ignore_ascii_case("proxy-authenticate")
        || name.eq_ignore_ascii_case("proxy-authorization")
        || name.eq_ignore_ascii_case("te")
        || name.eq_ignore_ascii_case("trailer")
        || name.eq_ignore_ascii_case("upgrade")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_hop_by_hop_headers() {
        assert!(is_hop_by_hop_or_framing_header("Content-Length"));
        assert!(is_hop_by_hop_or_framing_header("Transfer-Encoding"));
        assert!(!is_hop_by_hop_or_framing_header("content-type"));
    }

    #[test]
    fn detects_sse_content_type_case_insensitively() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("Text/Event-Stream; charset=utf-8"));
        assert!(has_sse_content_type(&headers));
    }
}
