use std::sync::{Arc, OnceLock};
use std::time::Duration;

use gproxy_provider_core::ProxyError;
use wreq::Proxy;

struct SharedClient {
    proxy: Option<String>,
    client: Arc<wreq::Client>,
}

static SHARED_CLIENT: OnceLock<SharedClient> = OnceLock::new();

/// Lazily builds (or returns) the process-wide `wreq::Client`. A single
/// proxy configuration is supported for the process lifetime; a later call
/// with a different proxy is a configuration error, not a per-request one.
pub fn shared_client(proxy: Option<&str>) -> Result<Arc<wreq::Client>, ProxyError> {
    let proxy_owned = proxy.map(str::to_string);
    if let Some(shared) = SHARED_CLIENT.get() {
        if shared.proxy != proxy_owned {
            return Err(ProxyError::Internal(
                "proxy mismatch: only a single global proxy is supported".to_string(),
            ));
        }
        return Ok(shared.client.clone());
    }

    let mut builder = wreq::Client::builder();
    if let Some(proxy_url) = proxy {
        let proxy = Proxy::all(proxy_url).map_err(|err| ProxyError::Internal(err.to_string()))?;
        builder = builder.proxy(proxy);
    }

    let client = builder.build().map_err(|err| ProxyError::Internal(err.to_string()))?;
    let shared = SharedClient {
        proxy: proxy_owned,
        client: Arc::new(client),
    };
    let _ = SHARED_CLIENT.set(shared);
    Ok(SHARED_CLIENT.get().expect("shared client must be set").client.clone())
}

/// One dispatched upstream call's raw result, before any dialect-specific
/// decoding.
pub struct UpstreamResponse {
    pub status: http::StatusCode,
    pub headers: http::HeaderMap,
    pub body: wreq::Body,
}

/// Sends a request built by a `ChannelHandler` and returns the raw
/// response. Streaming bodies are handed back unread; callers needing a
/// bounded, fully-buffered body read it themselves via
/// `gproxy_common::bound`.
pub async fn dispatch(
    client: &wreq::Client,
    method: http::Method,
    url: &str,
    headers: http::HeaderMap,
    body: bytes::Bytes,
    timeout: Duration,
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

    Ok(UpstreamResponse {
        status: response.status(),
        headers: response.headers().clone(),
        body: response.into_body(),
    })
}
