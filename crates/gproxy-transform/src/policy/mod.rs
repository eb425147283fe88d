//! Policy pipeline: an ordered sequence of byte-in/byte-out
//! steps run before a request is dispatched upstream. Each step either
//! transforms the body or, on a step-specific failure, passes the
//! original bytes through unchanged rather than aborting the request —
//! only `count_tokens` short-circuits the pipeline outright.

pub mod model_alias;
pub mod param_overrides;

use gproxy_provider_core::Group;

/// Side-channel accumulated while running the pipeline, consumed by
/// request logging and by later pipeline steps that need to know what
/// earlier steps decided.
#[derive(Debug, Clone, Default)]
pub struct PolicyContext {
    pub original_model: Option<String>,
}

/// Runs the parameter-override and model-alias-rewrite steps (§4.2 steps
/// 1–2) in order. Steps 3–5 (count-tokens short-circuit, CC request
/// conversion, function-call prompt injection) are orchestrated by the
/// caller since they depend on routing decisions outside this crate's
/// pure-transform scope.
pub fn run_param_and_alias_steps(body: &[u8], group: &Group) -> (Vec<u8>, PolicyContext) {
    let overridden = param_overrides::apply(body, &group.config);
    let mut ctx = PolicyContext::default();
    let rewritten = model_alias::apply(&overridden, &group.model_mapping, &mut ctx);
    (rewritten, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gproxy_provider_core::group::{
        ChannelKind, Config, EffectiveConfig, GroupKind, ModelMapping,
    };

    fn test_group(config: Config, mapping: ModelMapping) -> Group {
        Group {
            id: "g".into(),
            display_name: "g".into(),
            channel: ChannelKind::OpenAI,
            kind: GroupKind::Standard,
            upstreams: vec![],
            enabled: true,
            effective: EffectiveConfig::default(),
            config,
            model_mapping: mapping,
            header_rules: vec![],
            sub_groups: None,
        }
    }

    #[test]
    fn pipeline_runs_both_steps_in_order() {
        let mut raw = std::collections::BTreeMap::new();
        raw.insert(
            "param_overrides".to_string(),
            serde_json::json!({"temperature": 0.0}),
        );
        let group = test_group(
            Config(raw),
            ModelMapping(vec![("claude-3-haiku".to_string(), "claude-3-5-haiku".to_string())]),
        );
        let body = br#"{"model":"claude-3-haiku","temperature":0.9}"#;
        let (out, ctx) = run_param_and_alias_steps(body, &group);
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["temperature"], 0.0);
        assert_eq!(value["model"], "claude-3-5-haiku");
        assert_eq!(ctx.original_model.as_deref(), Some("claude-3-haiku"));
    }
}
