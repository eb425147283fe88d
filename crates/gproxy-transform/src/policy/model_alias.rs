//! Step 2: model-alias rewrite. Substitutes the
//! request's `model` field with its mapped real name when it matches a
//! configured alias, recording the original name in the policy context
//! for logging. A missing or empty `model` field is a no-op.

use gproxy_provider_core::group::ModelMapping;
use serde_json::Value;

use super::PolicyContext;

/// Rewrites `model` using the group's `ModelMapping`.
pub fn apply(body: &[u8], mapping: &ModelMapping, ctx: &mut PolicyContext) -> Vec<u8> {
    let Ok(mut value) = serde_json::from_slice::<Value>(body) else {
        return body.to_vec();
    };
    let Value::Object(map) = &mut value else {
        return body.to_vec();
    };

    let Some(Value::String(model)) = map.get("model") else {
        return body.to_vec();
    };
    if model.is_empty() {
        return body.to_vec();
    }

    if let Some(real) = mapping.resolve(model) {
        ctx.original_model = Some(model.clone());
        map.insert("model".to_string(), Value::String(real.to_string()));
        return serde_json::to_vec(&value).unwrap_or_else(|_| body.to_vec());
    }

    body.to_vec()
}
