//! The two attempt loops of the Lifecycle Engine: `execute_standard` for
//! standard groups and `execute_aggregate` for aggregate groups, grounded
//! directly on the contract described for `executeRequestWithRetry` /
//! `executeRequestWithAggregateRetry`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use gproxy_provider_core::group::Group;
use gproxy_provider_core::log::RequestOutcome;
use gproxy_provider_core::{ChannelHandler, ParsedUpstreamError, ProxyError, RetryContext};
use http::{HeaderMap, Method};
use tokio::sync::watch;

use crate::engine::ProxyEngine;
use crate::{headers, upstream};

/// A watch channel the router flips to `true` when it detects the client
/// connection is gone. A receiver that never changes behaves as "client
/// always connected" — the degenerate but valid case for a caller with no
/// disconnect detection wired up yet.
pub type Cancellation = watch::Receiver<bool>;

pub fn never_cancelled() -> Cancellation {
    watch::channel(false).1
}

async fn wait_for_cancel(rx: &mut Cancellation) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender dropped: there is no disconnect signal coming, park forever.
            std::future::pending::<()>().await;
        }
    }
}

/// One fully-built outbound request, ready to be sent to whichever
/// upstream the attempt loop picks.
pub struct PreparedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub want_stream: bool,
}

async fn read_error_preview(body: upstream::UpstreamBody) -> String {
    match body {
        upstream::UpstreamBody::Buffered(bytes) => {
            let cap = bytes.len().min(64 * 1024);
            String::from_utf8_lossy(&bytes[..cap]).into_owned()
        }
        upstream::UpstreamBody::Stream(_) => String::new(),
    }
}

enum AttemptOutcome {
    Success(upstream::UpstreamResponse),
    Failed(ProxyError, ParsedUpstreamError),
    Aborted,
}

/// Picks a key, builds headers, and sends one attempt. Never retries
/// itself — the caller loop decides what to do with the outcome.
async fn dispatch_one(
    engine: &ProxyEngine,
    group: &Group,
    channel: &Arc<dyn ChannelHandler>,
    request: &PreparedRequest,
    cancel: &mut Cancellation,
) -> (Option<gproxy_provider_core::ApiKey>, AttemptOutcome) {
    let key = match engine.keys.select(&group.id).await {
        Ok(key) => key,
        Err(_) => return (None, AttemptOutcome::Failed(ProxyError::NoKeysAvailable, ParsedUpstreamError::new(0, "no keys available"))),
    };

    let selected = match channel.select_upstream(group) {
        Ok(selected) => selected,
        Err(err) => {
            return (
                Some(key),
                AttemptOutcome::Failed(ProxyError::Internal(err.to_string()), ParsedUpstreamError::new(0, err.to_string())),
            );
        }
    };

    let url = format!("{}{}", selected.upstream.base_url.trim_end_matches('/'), request.path);
    let mut headers_out = request.headers.clone();
    headers::strip_client_auth(&mut headers_out);
    headers::strip_anonymization_headers(&mut headers_out, &engine.global.anonymization_headers);
    channel.inject_auth(&mut headers_out, &key.secret);
    headers::apply_header_rules(&mut headers_out, &group.header_rules);

    let timeout = Duration::from_secs(group.effective.request_timeout_seconds.max(1));
    let send_fut = upstream::send(
        &engine.client,
        request.method.clone(),
        &url,
        headers_out,
        request.body.clone(),
        timeout,
        request.want_stream,
        engine.global.max_upstream_response_body_bytes,
    );
    tokio::pin!(send_fut);

    let result = tokio::select! {
        biased;
        _ = wait_for_cancel(cancel) => {
            return (Some(key), AttemptOutcome::Aborted);
        }
        result = &mut send_fut => result,
    };

    match result {
        Ok(response) if response.status.is_success() => (Some(key), AttemptOutcome::Success(response)),
        Ok(response) => {
            let status = response.status.as_u16();
            let preview = read_error_preview(response.body).await;
            let parsed = ParsedUpstreamError { status, message: preview.clone(), raw: Some(preview) };
            let proxy_err = if status == 404 {
                ProxyError::UpstreamNotFound
            } else {
                ProxyError::UpstreamStatus { status, message: parsed.message.clone() }
            };
            (Some(key), AttemptOutcome::Failed(proxy_err, parsed))
        }
        Err(err) => {
            let parsed = ParsedUpstreamError::new(0, err.to_string());
            (Some(key), AttemptOutcome::Failed(err, parsed))
        }
    }
}

/// `executeRequestWithRetry`: attempts `0..=MaxRetries` against a single
/// group's own upstream pool.
pub async fn execute_standard(
    engine: &ProxyEngine,
    group: &Group,
    channel: &Arc<dyn ChannelHandler>,
    request: PreparedRequest,
    trace_id: &str,
    cancel: &mut Cancellation,
) -> Result<upstream::UpstreamResponse, ProxyError> {
    let max_retries = group.config.max_retries().unwrap_or(group.effective.max_retries);
    let mut attempt = 0u32;
    loop {
        let started = Instant::now();
        let (key, outcome) = dispatch_one(engine, group, channel, &request, cancel).await;

        match outcome {
            AttemptOutcome::Aborted => {
                engine
                    .record_log(trace_id, &group.id, None, attempt, RequestOutcome::ClientAborted, None, None, key.as_ref(), started)
                    .await;
                return Err(ProxyError::ClientAborted);
            }
            AttemptOutcome::Success(response) => {
                if let Some(key) = &key {
                    engine.keys.update_status(key, &group.id, true, None).await;
                }
                engine
                    .record_log(trace_id, &group.id, None, attempt, RequestOutcome::Success, Some(response.status.as_u16()), None, key.as_ref(), started)
                    .await;
                return Ok(response);
            }
            AttemptOutcome::Failed(proxy_err, parsed) => {
                if let Some(key) = &key {
                    engine.keys.update_status(key, &group.id, false, Some(&parsed)).await;
                }
                let retry = proxy_err.retriable() && attempt < max_retries;
                engine
                    .record_log(
                        trace_id,
                        &group.id,
                        None,
                        attempt,
                        if retry { RequestOutcome::Retry } else { RequestOutcome::Final },
                        Some(parsed.status),
                        Some(parsed.message.clone()),
                        key.as_ref(),
                        started,
                    )
                    .await;
                if retry {
                    attempt += 1;
                    continue;
                }
                return Err(proxy_err);
            }
        }
    }
}

/// `executeRequestWithAggregateRetry`: an outer loop switching sub-groups
/// and an inner loop retrying keys within the currently selected one. Each
/// sub-group id names a full `Group` of its own (own channel, upstreams,
/// and keys) — the aggregate group only holds the ordered, weighted list
/// of member ids.
///
/// `build_request` is handed the freshly-resolved member `Group` on every
/// attempt (not just once) so that CC-support — path rewrite and, for a
/// Claude-origin request, the transcoder — re-runs against that member's
/// own channel kind and config each time the outer loop switches sub-groups,
/// per spec.md §4.1 ("Path is restored to originalPath before each dispatch
/// to let each sub-group's CC-support re-run").
pub async fn execute_aggregate<M>(
    engine: &ProxyEngine,
    group: &Group,
    build_request: impl Fn(&Group) -> Result<(PreparedRequest, M), ProxyError>,
    retry_ctx: &mut RetryContext,
    trace_id: &str,
    cancel: &mut Cancellation,
) -> Result<(upstream::UpstreamResponse, Arc<Group>, M), ProxyError> {
    if retry_ctx.count_available(group) == 0 {
        return Err(ProxyError::UpstreamNotFound);
    }

    let outer_max = RetryContext::outer_max_switches(group);

    loop {
        let Some(pick) = engine.sub_groups.select_with_retry(group, &retry_ctx.excluded_sub_groups) else {
            return Err(ProxyError::NoKeysAvailable);
        };
        let sub_group_id = pick.sub_group.id.clone();
        let Some(member) = engine.groups.resolve(&sub_group_id) else {
            retry_ctx.exclude_unless_last(group, &sub_group_id);
            retry_ctx.reset_if_exhausted(group);
            retry_ctx.attempt_count += 1;
            if retry_ctx.attempt_count >= outer_max {
                return Err(ProxyError::UpstreamNotFound);
            }
            continue;
        };
        let Some(channel) = engine.channels.get(member.channel) else {
            return Err(ProxyError::Internal(format!("no channel handler for sub-group {sub_group_id}")));
        };
        let inner_max = member.config.max_retries().unwrap_or(member.effective.max_retries);

        loop {
            let (request, meta) = match build_request(&member) {
                Ok(pair) => pair,
                Err(err) => return Err(err),
            };
            let started = Instant::now();
            let (key, outcome) = dispatch_one(engine, &member, &channel, &request, cancel).await;

            match outcome {
                AttemptOutcome::Aborted => {
                    engine
                        .record_log(trace_id, &group.id, Some(sub_group_id.clone()), retry_ctx.attempt_count, RequestOutcome::ClientAborted, None, None, key.as_ref(), started)
                        .await;
                    return Err(ProxyError::ClientAborted);
                }
                AttemptOutcome::Success(response) => {
                    if let Some(key) = &key {
                        engine.keys.update_status(key, &sub_group_id, true, None).await;
                    }
                    engine
                        .record_log(
                            trace_id,
                            &group.id,
                            Some(sub_group_id.clone()),
                            retry_ctx.attempt_count,
                            RequestOutcome::Success,
                            Some(response.status.as_u16()),
                            None,
                            key.as_ref(),
                            started,
                        )
                        .await;
                    return Ok((response, member, meta));
                }
                AttemptOutcome::Failed(proxy_err, parsed) => {
                    if let Some(key) = &key {
                        engine.keys.update_status(key, &sub_group_id, false, Some(&parsed)).await;
                    }
                    let key_budget_left = retry_ctx.key_retries_used(&sub_group_id) < inner_max;
                    let retry_inner = proxy_err.retriable() && key_budget_left;
                    engine
                        .record_log(
                            trace_id,
                            &group.id,
                            Some(sub_group_id.clone()),
                            retry_ctx.attempt_count,
                            if retry_inner { RequestOutcome::Retry } else { RequestOutcome::Final },
                            Some(parsed.status),
                            Some(parsed.message.clone()),
                            key.as_ref(),
                            started,
                        )
                        .await;

                    if retry_inner {
                        retry_ctx.record_key_retry(&sub_group_id);
                        continue;
                    }

                    // Inner budget exhausted for this sub-group: try switching.
                    if retry_ctx.attempt_count >= outer_max {
                        return Err(proxy_err);
                    }
                    retry_ctx.exclude_unless_last(group, &sub_group_id);
                    retry_ctx.reset_if_exhausted(group);
                    retry_ctx.attempt_count += 1;
                    break;
                }
            }
        }
    }
}
