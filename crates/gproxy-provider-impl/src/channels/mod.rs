//! One `ChannelHandler` implementation per `ChannelKind`: weighted upstream
//! selection, provider-specific auth injection, and model redirection.
//! Each handler is pure — no network IO, no shared state beyond what the
//! registry hands it at construction.

mod anthropic;
mod codex;
mod gemini;
mod openai;

pub use anthropic::AnthropicChannelHandler;
pub use codex::CodexChannelHandler;
pub use gemini::GeminiChannelHandler;
pub use openai::OpenAiChannelHandler;

use gproxy_provider_core::{ChannelError, Group, SelectedUpstream};
use rand::Rng;

/// Weighted pick among `group.upstreams`, shared by every channel since
/// the selection rule itself doesn't vary by dialect.
pub(crate) fn select_weighted(group: &Group) -> Result<SelectedUpstream, ChannelError> {
    let total_weight: u64 = group.upstreams.iter().map(|u| u.weight as u64).sum();
    if group.upstreams.is_empty() || total_weight == 0 {
        return Err(ChannelError::NoUpstream);
    }

    let mut pick = rand::rng().random_range(0..total_weight);
    for upstream in &group.upstreams {
        let weight = upstream.weight as u64;
        if pick < weight {
            return Ok(SelectedUpstream {
                upstream: upstream.clone(),
            });
        }
        pick -= weight;
    }
    // Floating point never gets here for integer weights; fall back to the
    // last upstream rather than panic.
    Ok(SelectedUpstream {
        upstream: group.upstreams.last().unwrap().clone(),
    })
}

/// Rewrites the JSON body's top-level `model` field through a group's
/// model mapping, leaving the body untouched (and unparsed) if it isn't a
/// JSON object or carries no mapped alias.
pub(crate) fn redirect_model_field(body: &bytes::Bytes, group: &Group) -> bytes::Bytes {
    if group.model_mapping.is_empty() {
        return body.clone();
    }
    let Ok(mut value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return body.clone();
    };
    let Some(model) = value.get("model").and_then(serde_json::Value::as_str) else {
        return body.clone();
    };
    let Some(real) = group.model_mapping.resolve(model) else {
        return body.clone();
    };
    value["model"] = serde_json::Value::String(real.to_string());
    serde_json::to_vec(&value).map(bytes::Bytes::from).unwrap_or_else(|_| body.clone())
}

pub(crate) fn extract_model_field(body: &bytes::Bytes) -> Option<String> {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()?
        .get("model")?
        .as_str()
        .map(str::to_string)
}

pub(crate) fn body_requests_stream(body: &bytes::Bytes) -> bool {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("stream").and_then(serde_json::Value::as_bool).or(Some(false)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gproxy_provider_core::group::{ChannelKind, Config, EffectiveConfig, GroupKind, ModelMapping, Upstream};

    fn group_with_upstreams(upstreams: Vec<Upstream>) -> Group {
        Group {
            id: "g".into(),
            display_name: "g".into(),
            channel: ChannelKind::OpenAI,
            kind: GroupKind::Standard,
            upstreams,
            enabled: true,
            effective: EffectiveConfig::default(),
            config: Config::default(),
            model_mapping: ModelMapping::default(),
            header_rules: Vec::new(),
            sub_groups: None,
        }
    }

    #[test]
    fn weighted_select_rejects_empty_upstreams() {
        let group = group_with_upstreams(Vec::new());
        assert!(matches!(select_weighted(&group), Err(ChannelError::NoUpstream)));
    }

    #[test]
    fn weighted_select_picks_among_configured_upstreams() {
        let group = group_with_upstreams(vec![
            Upstream { base_url: "https://a".into(), weight: 1 },
            Upstream { base_url: "https://b".into(), weight: 1 },
        ]);
        for _ in 0..20 {
            let picked = select_weighted(&group).unwrap();
            assert!(picked.upstream.base_url == "https://a" || picked.upstream.base_url == "https://b");
        }
    }

    #[test]
    fn extract_model_field_reads_json_model() {
        let body = bytes::Bytes::from_static(br#"{"model":"gpt-4o"}"#);
        assert_eq!(extract_model_field(&body).as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn body_requests_stream_reads_json_stream_flag() {
        let body = bytes::Bytes::from_static(br#"{"stream":true}"#);
        assert!(body_requests_stream(&body));
        let body = bytes::Bytes::from_static(br#"{"stream":false}"#);
        assert!(!body_requests_stream(&body));
    }
}
