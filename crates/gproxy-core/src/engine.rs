//! The Lifecycle Engine entrypoint: `ProxyEngine::handle_proxy`. Resolves
//! the group, runs the Policy Pipeline, and dispatches into the standard
//! or aggregate attempt loop, then routes the successful response through
//! the models-enhancer, a CC transcoder, or the function-call middleware
//! before it reaches the client.

use std::sync::Arc;

use bytes::Bytes;
use gproxy_common::GlobalConfig;
use gproxy_protocol::claude::{self, StreamEvent};
use gproxy_protocol::openai_chat as oa;
use gproxy_provider_core::group::{ChannelKind, Group, GroupKind};
use gproxy_provider_core::{GroupManager, KeyProvider, ProxyError, RequestLogSink, RetryContext, SubGroupManager, ToolNameShortMap, TriggerSignal};
use gproxy_provider_impl::ChannelRegistry;
use gproxy_transform::middleware;
use gproxy_transform::models_enhancer;
use http::{HeaderMap, Method, StatusCode};
use tokio::sync::{mpsc, watch};

use crate::cc;
use crate::headers;
use crate::policy;
use crate::retry_loop::{self, Cancellation, PreparedRequest};
use crate::upstream::{self, UpstreamBody};

pub struct ProxyEngine {
    pub groups: Arc<dyn GroupManager>,
    pub keys: Arc<dyn KeyProvider>,
    pub sub_groups: Arc<dyn SubGroupManager>,
    pub log_sink: Arc<dyn RequestLogSink>,
    pub channels: ChannelRegistry,
    pub client: Arc<wreq::Client>,
    pub global: GlobalConfig,
}

pub struct EngineRequest {
    pub group_name: String,
    /// Path after `/proxy/{group_name}/`, leading slash included.
    pub rest_path: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Raw query string of the inbound request, if any, with Claude-specific
    /// params stripped later when a CC path rewrite happens.
    pub query: Option<String>,
    pub trace_id: String,
    pub cancel: Cancellation,
    /// Flipped to `true` once the client connection is observed gone, so a
    /// mid-stream disconnect can be logged and the upstream body closed.
    pub cancel_tx: watch::Sender<bool>,
}

pub enum EngineBody {
    Buffered(Bytes),
    Stream(mpsc::Receiver<Bytes>),
}

pub struct EngineResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: EngineBody,
}

impl EngineResponse {
    fn json(status: StatusCode, body: Bytes) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_TYPE, http::HeaderValue::from_static("application/json"));
        Self { status, headers, body: EngineBody::Buffered(body) }
    }

    fn error(err: &ProxyError) -> Self {
        Self::json(crate::error::status_for(err), crate::error::claude_error_body(err))
    }
}

impl ProxyEngine {
    pub async fn record_log(
        &self,
        trace_id: &str,
        group_id: &str,
        sub_group_id: Option<String>,
        attempt: u32,
        outcome: gproxy_provider_core::log::RequestOutcome,
        status: Option<u16>,
        parsed_error: Option<String>,
        key: Option<&gproxy_provider_core::ApiKey>,
        started: std::time::Instant,
    ) {
        let masked_key = key.map(|k| gproxy_common::mask_key(&k.secret));
        log_attempt(
            &self.log_sink,
            trace_id,
            group_id,
            sub_group_id,
            attempt,
            outcome,
            status,
            parsed_error,
            masked_key,
            started.elapsed().as_millis() as u64,
        )
        .await;
    }

    pub async fn handle_proxy(&self, mut req: EngineRequest) -> EngineResponse {
        let Some(group) = self.groups.resolve(&req.group_name) else {
            return EngineResponse::error(&ProxyError::UpstreamNotFound);
        };
        if !group.enabled {
            return EngineResponse::error(&ProxyError::UpstreamNotFound);
        }

        if req.body.len() > self.global.max_upstream_response_body_bytes {
            return EngineResponse::error(&ProxyError::BodyTooLarge);
        }

        // Policy steps 1-2: parameter overrides, then model-alias rewrite.
        let (body, policy_ctx) = policy::pre_dispatch(&req.body, &group);
        req.body = body;
        let _ = policy_ctx.original_model;

        // Policy step 3: Claude `/count_tokens` never reaches upstream.
        if let Some(result) = policy::count_tokens_short_circuit(&req.body, &req.rest_path) {
            return match result {
                Ok(body) => EngineResponse::json(StatusCode::OK, body),
                Err(err) => EngineResponse::error(&err),
            };
        }

        match group.kind {
            GroupKind::Standard => self.handle_standard(group, req).await,
            GroupKind::Aggregate => self.handle_aggregate(group, req).await,
        }
    }

    async fn handle_standard(&self, group: Arc<Group>, mut req: EngineRequest) -> EngineResponse {
        let Some(channel) = self.channels.get(group.channel) else {
            return EngineResponse::error(&ProxyError::Internal("no channel handler configured".to_string()));
        };

        let is_cc = group.channel != ChannelKind::Anthropic && looks_like_claude_messages_path(&req.rest_path);

        let (mut upstream_path, mut upstream_body, names, want_stream, claude_request) = if is_cc {
            let claude_request = match cc::parse_claude_request(&req.body) {
                Ok(request) => request,
                Err(err) => return EngineResponse::error(&err),
            };
            let names = cc::names_for(&claude_request);
            let body = match cc::build_upstream_body(group.channel, &claude_request, &group, &names) {
                Ok(body) => body,
                Err(err) => return EngineResponse::error(&err),
            };
            let stream = claude_request.stream.unwrap_or(false);
            let path = native_path_for(group.channel, &claude_request.model, stream);
            (path, body, names, stream, Some(claude_request))
        } else {
            let stream = channel.is_stream_request(&req.body);
            (req.rest_path.clone(), req.body.clone(), ToolNameShortMap::default(), stream, None)
        };

        upstream_body = channel.apply_model_redirect(&upstream_body, &group);

        // Policy step 5: prompt-based function-call injection.
        let (upstream_body, trigger) = policy::maybe_inject_function_call_prompt(upstream_body, &group, &upstream_path);
        let _ = &mut upstream_path;

        let outbound_query =
            if is_cc { req.query.as_deref().and_then(strip_claude_query_params) } else { req.query.clone() };

        let prepared = PreparedRequest {
            method: channel.method_for(&upstream_path),
            path: with_query(&upstream_path, outbound_query.as_deref()),
            headers: req.headers.clone(),
            body: upstream_body.clone(),
            want_stream,
        };

        let dispatch_result = retry_loop::execute_standard(self, &group, &channel, prepared, &req.trace_id, &mut req.cancel).await;

        let upstream_response = match dispatch_result {
            Ok(response) => response,
            Err(err) => return EngineResponse::error(&err),
        };

        self.route_success(&group, &upstream_path, upstream_response, names, trigger, claude_request, want_stream, &req.trace_id, req.cancel_tx.clone())
            .await
    }

    /// `executeRequestWithAggregateRetry`'s request-building side: re-runs
    /// CC-support (path rewrite, and for a Claude-origin request the
    /// transcoder) against whichever member `Group` the outer loop is
    /// currently attempting, per spec.md §4.1. `claude_request_base` is
    /// parsed once from the client's bytes (channel-independent); each
    /// member then decides for itself whether it needs a transcode.
    async fn handle_aggregate(&self, group: Arc<Group>, mut req: EngineRequest) -> EngineResponse {
        let claude_request_base = if looks_like_claude_messages_path(&req.rest_path) {
            match cc::parse_claude_request(&req.body) {
                Ok(request) => Some(request),
                Err(err) => return EngineResponse::error(&err),
            }
        } else {
            None
        };
        let names = claude_request_base.as_ref().map(cc::names_for).unwrap_or_default();

        let trace_id = req.trace_id.clone();
        let cancel_tx = req.cancel_tx.clone();
        let query = req.query.clone();
        let original_path = req.rest_path.clone();
        let original_body = req.body.clone();
        let headers = std::mem::take(&mut req.headers);

        let build = move |member: &Group| -> Result<(PreparedRequest, AggregateAttemptMeta), ProxyError> {
            let Some(channel) = self.channels.get(member.channel) else {
                return Err(ProxyError::Internal(format!("no channel handler for sub-group {}", member.id)));
            };

            let is_cc = member.channel != ChannelKind::Anthropic && claude_request_base.is_some();
            let (path, body, want_stream, claude_request) = if is_cc {
                let claude_request = claude_request_base.clone().expect("checked is_some above");
                let body = cc::build_upstream_body(member.channel, &claude_request, member, &names)?;
                let stream = claude_request.stream.unwrap_or(false);
                let path = native_path_for(member.channel, &claude_request.model, stream);
                (path, body, stream, Some(claude_request))
            } else {
                let stream = channel.is_stream_request(&original_body);
                (original_path.clone(), original_body.clone(), stream, None)
            };

            let body = channel.apply_model_redirect(&body, member);
            let (body, trigger) = policy::maybe_inject_function_call_prompt(body, member, &path);

            let outbound_query = if is_cc { query.as_deref().and_then(strip_claude_query_params) } else { query.clone() };

            let prepared = PreparedRequest {
                method: channel.method_for(&path),
                path: with_query(&path, outbound_query.as_deref()),
                headers: headers.clone(),
                body,
                want_stream,
            };
            let meta = AggregateAttemptMeta { path, names: names.clone(), trigger, claude_request, want_stream };
            Ok((prepared, meta))
        };

        let mut retry_ctx = RetryContext::new(req.body.clone(), req.rest_path.clone());
        let dispatch_result =
            retry_loop::execute_aggregate(self, &group, build, &mut retry_ctx, &req.trace_id, &mut req.cancel).await;

        let (upstream_response, member, meta) = match dispatch_result {
            Ok(result) => result,
            Err(err) => return EngineResponse::error(&err),
        };

        self.route_success(&member, &meta.path, upstream_response, meta.names, meta.trigger, meta.claude_request, meta.want_stream, &trace_id, cancel_tx)
            .await
    }

    async fn route_success(
        &self,
        group: &gproxy_provider_core::group::Group,
        path: &str,
        response: upstream::UpstreamResponse,
        names: gproxy_provider_core::ToolNameShortMap,
        trigger: Option<TriggerSignal>,
        claude_request: Option<claude::CreateMessageRequest>,
        want_stream: bool,
        trace_id: &str,
        cancel_tx: watch::Sender<bool>,
    ) -> EngineResponse {
        let mut response_headers = response.headers;
        headers::strip_stale_response_headers(&mut response_headers);

        if models_enhancer::is_models_path(path) {
            let body = match response.body {
                UpstreamBody::Buffered(body) => body,
                UpstreamBody::Stream(_) => return EngineResponse::error(&ProxyError::Internal("models endpoint returned a stream".to_string())),
            };
            let enhanced = models_enhancer::enhance(&body, &group.model_mapping.0).map(Bytes::from).unwrap_or(body);
            return EngineResponse::json(StatusCode::OK, enhanced);
        }

        if claude_request.is_none() {
            // Native dialect request/response: forward bytes, applying the
            // function-call middleware in place when it was engaged.
            return self.forward_native(group, response, trigger, want_stream, trace_id, cancel_tx).await;
        }

        match response.body {
            UpstreamBody::Buffered(body) => {
                let body = if trigger.is_some() && group.channel == ChannelKind::OpenAI {
                    match serde_json::from_slice::<oa::ChatCompletionResponse>(&body) {
                        Ok(mut parsed) => {
                            middleware::apply_unary_response(&mut parsed, trigger.as_ref().map(TriggerSignal::as_str));
                            serde_json::to_vec(&parsed).map(Bytes::from).unwrap_or(body)
                        }
                        Err(_) => body,
                    }
                } else {
                    body
                };
                match cc::unary_response_to_claude(group.channel, &body, &names) {
                    Ok(claude_body) => EngineResponse::json(StatusCode::OK, claude_body),
                    Err(err) => EngineResponse::error(&err),
                }
            }
            UpstreamBody::Stream(rx) => {
                self.stream_cc_response(group.channel, rx, names, trigger, response_headers, group.id.clone(), trace_id.to_string(), cancel_tx)
                    .await
            }
        }
    }

    async fn forward_native(
        &self,
        group: &gproxy_provider_core::group::Group,
        response: upstream::UpstreamResponse,
        trigger: Option<TriggerSignal>,
        _want_stream: bool,
        trace_id: &str,
        cancel_tx: watch::Sender<bool>,
    ) -> EngineResponse {
        let mut response_headers = response.headers;
        headers::strip_stale_response_headers(&mut response_headers);

        match response.body {
            UpstreamBody::Buffered(body) => {
                let body = if trigger.is_some() && group.channel == ChannelKind::OpenAI {
                    match serde_json::from_slice::<oa::ChatCompletionResponse>(&body) {
                        Ok(mut parsed) => {
                            middleware::apply_unary_response(&mut parsed, trigger.as_ref().map(TriggerSignal::as_str));
                            serde_json::to_vec(&parsed).map(Bytes::from).unwrap_or(body)
                        }
                        Err(_) => body,
                    }
                } else {
                    body
                };
                EngineResponse { status: StatusCode::OK, headers: response_headers, body: EngineBody::Buffered(body) }
            }
            UpstreamBody::Stream(mut rx) => {
                let (tx, out_rx) = mpsc::channel::<Bytes>(16);
                let log_sink = self.log_sink.clone();
                let group_id = group.id.clone();
                let trace_id = trace_id.to_string();
                let started = std::time::Instant::now();
                tokio::spawn(async move {
                    let mut filter = middleware::FunctionCallStreamFilter::new(trigger);
                    let mut sse = gproxy_protocol::sse::SseParser::new();
                    while let Some(chunk) = rx.recv().await {
                        for event in sse.push_bytes(&chunk) {
                            if event.data == "[DONE]" {
                                if let Some(final_chunk) = filter.finish("chatcmpl", "unknown") {
                                    let frame = format!("data: {}\n\n", serde_json::to_string(&final_chunk).unwrap_or_default());
                                    if tx.send(Bytes::from(frame)).await.is_err() {
                                        log_client_abort(&log_sink, &cancel_tx, &trace_id, &group_id, started).await;
                                        return;
                                    }
                                }
                                if tx.send(Bytes::from_static(b"data: [DONE]\n\n")).await.is_err() {
                                    log_client_abort(&log_sink, &cancel_tx, &trace_id, &group_id, started).await;
                                    return;
                                }
                                continue;
                            }
                            let Ok(parsed) = serde_json::from_str::<oa::ChatCompletionChunk>(&event.data) else {
                                continue;
                            };
                            if let Some(filtered) = filter.on_chunk(parsed) {
                                let frame = format!("data: {}\n\n", serde_json::to_string(&filtered).unwrap_or_default());
                                if tx.send(Bytes::from(frame)).await.is_err() {
                                    log_client_abort(&log_sink, &cancel_tx, &trace_id, &group_id, started).await;
                                    return;
                                }
                            }
                        }
                    }
                });
                EngineResponse { status: StatusCode::OK, headers: response_headers, body: EngineBody::Stream(out_rx) }
            }
        }
    }

    async fn stream_cc_response(
        &self,
        channel: ChannelKind,
        mut rx: mpsc::Receiver<Bytes>,
        names: gproxy_provider_core::ToolNameShortMap,
        trigger: Option<TriggerSignal>,
        mut response_headers: HeaderMap,
        group_id: String,
        trace_id: String,
        cancel_tx: watch::Sender<bool>,
    ) -> EngineResponse {
        response_headers.insert(http::header::CONTENT_TYPE, http::HeaderValue::from_static("text/event-stream"));
        let (tx, out_rx) = mpsc::channel::<Bytes>(16);
        let message_id = format!("msg_{}", random_suffix());
        let log_sink = self.log_sink.clone();
        let started = std::time::Instant::now();

        tokio::spawn(async move {
            if channel == ChannelKind::Gemini {
                let mut body = Vec::new();
                while let Some(chunk) = rx.recv().await {
                    body.extend_from_slice(&chunk);
                }
                if let Ok(events) = cc::gemini_replay(message_id, "gemini", names, &body) {
                    if !emit_sse(&tx, events).await {
                        log_client_abort(&log_sink, &cancel_tx, &trace_id, &group_id, started).await;
                    }
                }
                return;
            }

            let Some(mut transcoder) = cc::StreamTranscoder::new(channel, message_id, "unknown", names) else {
                return;
            };
            let mut fc_filter = trigger.clone().map(middleware::FunctionCallStreamFilter::new);
            let mut sse = gproxy_protocol::sse::SseParser::new();
            while let Some(chunk) = rx.recv().await {
                for event in sse.push_bytes(&chunk) {
                    if event.data == "[DONE]" {
                        if !flush_cc_stream(&tx, &mut transcoder, &mut fc_filter).await {
                            log_client_abort(&log_sink, &cancel_tx, &trace_id, &group_id, started).await;
                        }
                        return;
                    }
                    if let (StreamTranscoderKind::OpenAi, Some(filter)) = (transcoder_kind(&transcoder), fc_filter.as_mut()) {
                        let Ok(raw_chunk) = serde_json::from_str::<oa::ChatCompletionChunk>(&event.data) else { continue };
                        if let Some(filtered) = filter.on_chunk(raw_chunk) {
                            let events = transcoder.on_sse_data(&serde_json::to_string(&filtered).unwrap_or_default());
                            if !emit_sse(&tx, events).await {
                                log_client_abort(&log_sink, &cancel_tx, &trace_id, &group_id, started).await;
                                return;
                            }
                        }
                        continue;
                    }
                    let events = transcoder.on_sse_data(&event.data);
                    if !emit_sse(&tx, events).await {
                        log_client_abort(&log_sink, &cancel_tx, &trace_id, &group_id, started).await;
                        return;
                    }
                }
            }
            // Reader EOF without a typed terminal event (Codex's
            // `response.completed`/`response.done` never arrived, or the
            // upstream dropped before sending `[DONE]`): synthesize the
            // terminal sequence so the client still gets matching
            // `message_delta`/`message_stop`. A no-op if `finish` already
            // ran above.
            if !flush_cc_stream(&tx, &mut transcoder, &mut fc_filter).await {
                log_client_abort(&log_sink, &cancel_tx, &trace_id, &group_id, started).await;
            }
        });

        EngineResponse { status: StatusCode::OK, headers: response_headers, body: EngineBody::Stream(out_rx) }
    }
}

/// Builds and records one `RequestLogRecord`. Pulled out of
/// `ProxyEngine::record_log` so the streaming relay tasks (which only hold
/// an `Arc<dyn RequestLogSink>`, not a `&ProxyEngine`, once spawned) can log
/// through the same path.
#[allow(clippy::too_many_arguments)]
async fn log_attempt(
    log_sink: &Arc<dyn RequestLogSink>,
    trace_id: &str,
    group_id: &str,
    sub_group_id: Option<String>,
    attempt: u32,
    outcome: gproxy_provider_core::log::RequestOutcome,
    status: Option<u16>,
    parsed_error: Option<String>,
    masked_key: Option<String>,
    elapsed_ms: u64,
) {
    let record = gproxy_provider_core::RequestLogRecord {
        trace_id: trace_id.to_string(),
        group_id: group_id.to_string(),
        sub_group_id,
        attempt_index: attempt,
        outcome,
        status,
        parsed_error,
        masked_key,
        elapsed_ms,
    };
    tracing::info!(
        trace_id = %record.trace_id,
        group = %record.group_id,
        attempt = record.attempt_index,
        status = record.status,
        elapsed_ms = record.elapsed_ms,
        "proxy attempt"
    );
    log_sink.record(record).await;
}

enum StreamTranscoderKind {
    OpenAi,
    Other,
}

fn transcoder_kind(t: &cc::StreamTranscoder) -> StreamTranscoderKind {
    match t {
        cc::StreamTranscoder::OpenAi(_) => StreamTranscoderKind::OpenAi,
        cc::StreamTranscoder::Codex(_) => StreamTranscoderKind::Other,
    }
}

/// Flushes any function-call middleware still sitting on buffered XML
/// (it has its own terminal chunk, fed back through the transcoder like any
/// other OpenAI chunk) and then runs the transcoder's own idempotent
/// terminal sequence. Called once per stream, on whichever terminal
/// condition is reached first (`[DONE]` or reader EOF). Returns `false` if
/// the client is gone (the outbound channel's receiver was dropped).
async fn flush_cc_stream(
    tx: &mpsc::Sender<Bytes>,
    transcoder: &mut cc::StreamTranscoder,
    fc_filter: &mut Option<middleware::FunctionCallStreamFilter>,
) -> bool {
    if let (StreamTranscoderKind::OpenAi, Some(filter)) = (transcoder_kind(transcoder), fc_filter.as_mut()) {
        if let Some(final_chunk) = filter.finish("chatcmpl", "unknown") {
            let events = transcoder.on_sse_data(&serde_json::to_string(&final_chunk).unwrap_or_default());
            if !emit_sse(tx, events).await {
                return false;
            }
        }
    }
    emit_sse(tx, transcoder.finish()).await
}

/// Sends a batch of SSE events; returns `false` as soon as the outbound
/// channel's receiver is gone, which is the only signal this proxy gets
/// that the client disconnected mid-stream.
async fn emit_sse(tx: &mpsc::Sender<Bytes>, events: Vec<StreamEvent>) -> bool {
    for event in events {
        let name = sse_event_name(&event);
        let data = serde_json::to_string(&event).unwrap_or_default();
        let frame = format!("event: {name}\ndata: {data}\n\n");
        if tx.send(Bytes::from(frame)).await.is_err() {
            return false;
        }
    }
    true
}

/// Records the client-disconnect-mid-stream scenario: flips the request's
/// cancellation signal (otherwise never sent) and logs a 499 outcome. The
/// upstream body closes on its own once this task drops its `rx` — the
/// reader task in `upstream::send` then fails its own `tx.send` and exits.
async fn log_client_abort(
    log_sink: &Arc<dyn RequestLogSink>,
    cancel_tx: &watch::Sender<bool>,
    trace_id: &str,
    group_id: &str,
    started: std::time::Instant,
) {
    let _ = cancel_tx.send(true);
    log_attempt(
        log_sink,
        trace_id,
        group_id,
        None,
        0,
        gproxy_provider_core::log::RequestOutcome::ClientAborted,
        Some(499),
        None,
        None,
        started.elapsed().as_millis() as u64,
    )
    .await;
}

fn sse_event_name(event: &StreamEvent) -> &'static str {
    match event {
        StreamEvent::MessageStart { .. } => "message_start",
        StreamEvent::ContentBlockStart { .. } => "content_block_start",
        StreamEvent::ContentBlockDelta { .. } => "content_block_delta",
        StreamEvent::ContentBlockStop { .. } => "content_block_stop",
        StreamEvent::MessageDelta { .. } => "message_delta",
        StreamEvent::MessageStop => "message_stop",
        StreamEvent::Ping => "ping",
    }
}

fn random_suffix() -> String {
    use rand::Rng;
    use rand::distr::Alphanumeric;
    rand::rng().sample_iter(&Alphanumeric).take(12).map(char::from).collect()
}

/// Detects a Claude-format request: a `claude/` path segment, or a
/// trailing `/v1/messages` suffix (with or without the streaming variant).
fn looks_like_claude_messages_path(path: &str) -> bool {
    let trimmed = path.trim_start_matches('/');
    trimmed.starts_with("claude/") || trimmed.ends_with("v1/messages") || trimmed.contains("v1/messages?")
}

/// Query parameters that only make sense against the gateway's own Claude
/// surface and must not leak to a rewritten native-dialect upstream path.
const CLAUDE_QUERY_PARAMS: &[&str] = &["beta"];

/// Strips `CLAUDE_QUERY_PARAMS` from a raw query string, leaving every other
/// parameter (API keys aside, which never travel via query string here)
/// untouched. Returns `None` if nothing is left to forward, or if the query
/// string fails to parse as `application/x-www-form-urlencoded` pairs.
fn strip_claude_query_params(query: &str) -> Option<String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
    let filtered: Vec<(String, String)> =
        pairs.into_iter().filter(|(k, _)| !CLAUDE_QUERY_PARAMS.contains(&k.as_str())).collect();
    if filtered.is_empty() {
        return None;
    }
    serde_urlencoded::to_string(&filtered).ok()
}

fn with_query(path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{path}?{q}"),
        _ => path.to_string(),
    }
}

fn native_path_for(channel: ChannelKind, model: &str, stream: bool) -> String {
    match channel {
        ChannelKind::OpenAI => "/chat/completions".to_string(),
        ChannelKind::Codex => "/responses".to_string(),
        ChannelKind::Gemini => {
            let method = if stream { "streamGenerateContent" } else { "generateContent" };
            format!("/v1beta/models/{model}:{method}")
        }
        ChannelKind::Anthropic => "/v1/messages".to_string(),
    }
}

/// Per-attempt routing metadata returned alongside a successful aggregate
/// dispatch, since each sub-group switch may re-run CC-support differently
/// (§4.1): the path/tool-name map/trigger/parsed-Claude-request that
/// `route_success` needs all belong to whichever member actually served
/// the response, not to the aggregate group itself.
struct AggregateAttemptMeta {
    path: String,
    names: ToolNameShortMap,
    trigger: Option<TriggerSignal>,
    claude_request: Option<claude::CreateMessageRequest>,
    want_stream: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_claude_query_params_drops_beta_keeps_everything_else() {
        let out = strip_claude_query_params("beta=true&model=gpt-4&foo=bar");
        let out = out.unwrap();
        assert!(!out.contains("beta"));
        assert!(out.contains("model=gpt-4"));
        assert!(out.contains("foo=bar"));
    }

    #[test]
    fn strip_claude_query_params_returns_none_when_nothing_left() {
        assert_eq!(strip_claude_query_params("beta=true"), None);
    }

    #[test]
    fn with_query_appends_only_when_present() {
        assert_eq!(with_query("/v1/messages", None), "/v1/messages");
        assert_eq!(with_query("/v1/messages", Some("")), "/v1/messages");
        assert_eq!(with_query("/v1/messages", Some("model=x")), "/v1/messages?model=x");
    }

    #[test]
    fn detects_claude_messages_path_variants() {
        assert!(looks_like_claude_messages_path("/claude/v1/messages"));
        assert!(looks_like_claude_messages_path("/v1/messages"));
        assert!(looks_like_claude_messages_path("/v1/messages?stream=true"));
        assert!(!looks_like_claude_messages_path("/chat/completions"));
    }
}
