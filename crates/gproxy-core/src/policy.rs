//! Lifecycle-level wiring of the Policy Pipeline's steps. Steps 1
//! (parameter overrides) and 2 (model-alias rewrite) are pure
//! `gproxy-transform` functions reused directly; this module supplies the
//! remaining steps that need a `Group`'s channel/config or a request path
//! to decide whether they apply at all.

use bytes::Bytes;
use gproxy_protocol::claude;
use gproxy_provider_core::group::{ChannelKind, Group};
use gproxy_provider_core::{ProxyError, TriggerSignal};
use gproxy_transform::count_tokens;
use gproxy_transform::middleware;
pub use gproxy_transform::policy::PolicyContext;

/// Steps 1-2: parameter overrides then model-alias rewrite.
pub fn pre_dispatch(body: &[u8], group: &Group) -> (Bytes, PolicyContext) {
    let (body, ctx) = gproxy_transform::policy::run_param_and_alias_steps(body, group);
    (Bytes::from(body), ctx)
}

/// Step 3: Claude `/count_tokens` never reaches an upstream.
pub fn count_tokens_short_circuit(body: &[u8], path: &str) -> Option<Result<Bytes, ProxyError>> {
    if !path.ends_with("/count_tokens") {
        return None;
    }
    let request: claude::CountTokensRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(err) => return Some(Err(ProxyError::BadRequest(err.to_string()))),
    };
    let response = count_tokens::count_tokens(&request);
    Some(serde_json::to_vec(&response).map(Bytes::from).map_err(|err| ProxyError::Internal(err.to_string())))
}

/// Step 5: prompt-based function-calling injection. Runs on the final
/// OpenAI-Chat-shaped outbound body — whether it arrived there natively or
/// via CC conversion — so it must run after request-side CC conversion,
/// not before.
pub fn maybe_inject_function_call_prompt(body: Bytes, group: &Group, path: &str) -> (Bytes, Option<TriggerSignal>) {
    if group.channel != ChannelKind::OpenAI || !group.config.force_function_call() || !path.ends_with("/chat/completions") {
        return (body, None);
    }

    let Ok(mut json) = serde_json::from_slice::<serde_json::Value>(&body) else {
        return (body, None);
    };
    let has_tools = json.get("tools").and_then(|t| t.as_array()).map(|a| !a.is_empty()).unwrap_or(false);
    if !has_tools {
        return (body, None);
    }

    let trigger = TriggerSignal::generate();
    middleware::apply_request(&mut json, &trigger);
    let rewritten = serde_json::to_vec(&json).map(Bytes::from).unwrap_or(body);
    (rewritten, Some(trigger))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gproxy_provider_core::group::{EffectiveConfig, GroupKind};
    use std::collections::BTreeMap;

    fn group_with(channel: ChannelKind, force: bool) -> Group {
        let mut config = BTreeMap::new();
        config.insert("force_function_call".to_string(), serde_json::json!(force));
        Group {
            id: "g".to_string(),
            display_name: "g".to_string(),
            channel,
            kind: GroupKind::Standard,
            upstreams: vec![],
            enabled: true,
            effective: EffectiveConfig::default(),
            config: gproxy_provider_core::group::Config(config),
            model_mapping: Default::default(),
            header_rules: vec![],
            sub_groups: None,
        }
    }

    #[test]
    fn count_tokens_short_circuit_only_fires_on_matching_path() {
        assert!(count_tokens_short_circuit(b"{}", "/v1/messages").is_none());
        let result = count_tokens_short_circuit(br#"{"model":"m","messages":[]}"#, "/v1/count_tokens");
        assert!(result.is_some());
    }

    #[test]
    fn function_call_injection_requires_force_flag_and_tools() {
        let group = group_with(ChannelKind::OpenAI, false);
        let body = Bytes::from_static(br#"{"model":"m","messages":[],"tools":[{"type":"function","function":{"name":"x"}}]}"#);
        let (unchanged, trigger) = maybe_inject_function_call_prompt(body.clone(), &group, "/v1/chat/completions");
        assert!(trigger.is_none());
        assert_eq!(unchanged, body);

        let group = group_with(ChannelKind::OpenAI, true);
        let (rewritten, trigger) = maybe_inject_function_call_prompt(body, &group, "/v1/chat/completions");
        assert!(trigger.is_some());
        let value: serde_json::Value = serde_json::from_slice(&rewritten).unwrap();
        assert!(value.get("tools").is_none());
    }
}
