//! Models-endpoint enhancer: when a group has a non-empty
//! `ModelMapping` and the upstream request path ends in `/models`, the
//! enhancer injects one synthetic entry per alias into the upstream's own
//! model list rather than forwarding it byte-for-byte.
//!
//! Supports both list shapes in the wild: OpenAI's `{"data": [{"id":...}]}`
//! and Gemini's `{"models": [{"name":...}]}`. Anything else is left
//! untouched — the caller falls back to byte-forwarding on `None`.

use serde_json::{json, Value};

/// `alias -> real model id`, as carried on `Group::model_mapping`.
pub type ModelMapping<'a> = &'a [(String, String)];

/// Rewrites an upstream model-list response body to include one synthetic
/// entry per configured alias. Returns `None` when the body isn't a
/// recognized model-list shape, signalling the caller to byte-forward the
/// original response unmodified.
pub fn enhance(body: &[u8], mapping: ModelMapping<'_>) -> Option<Vec<u8>> {
    if mapping.is_empty() {
        return None;
    }
    let mut value: Value = serde_json::from_slice(body).ok()?;

    if let Some(data) = value.get("data").and_then(Value::as_array) {
        let existing: std::collections::HashSet<String> = data
            .iter()
            .filter_map(|entry| entry.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        let mut data = data.clone();
        for (alias, _real) in mapping {
            if !existing.contains(alias) {
                data.push(json!({
                    "id": alias,
                    "object": "model",
                    "owned_by": "gproxy",
                }));
            }
        }
        value["data"] = Value::Array(data);
        return serde_json::to_vec(&value).ok();
    }

    if let Some(models) = value.get("models").and_then(Value::as_array) {
        let existing: std::collections::HashSet<String> = models
            .iter()
            .filter_map(|entry| entry.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        let mut models = models.clone();
        for (alias, _real) in mapping {
            if !existing.contains(alias) {
                models.push(json!({
                    "name": alias,
                    "displayName": alias,
                }));
            }
        }
        value["models"] = Value::Array(models);
        return serde_json::to_vec(&value).ok();
    }

    None
}

/// True when `path` (already stripped of query string) is a models-listing
/// endpoint, trailing slash tolerated.
pub fn is_models_path(path: &str) -> bool {
    let trimmed = path.trim_end_matches('/');
    trimmed.ends_with("/models")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> Vec<(String, String)> {
        vec![("fast".to_string(), "gpt-4o-mini".to_string())]
    }

    #[test]
    fn adds_alias_once_to_openai_shape() {
        let body = br#"{"object":"list","data":[{"id":"gpt-4o"}]}"#;
        let out = enhance(body, &mapping()).expect("recognized shape");
        let value: Value = serde_json::from_slice(&out).unwrap();
        let ids: Vec<&str> = value["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["gpt-4o", "fast"]);
    }

    #[test]
    fn does_not_duplicate_existing_alias() {
        let body = br#"{"data":[{"id":"gpt-4o"},{"id":"fast"}]}"#;
        let out = enhance(body, &mapping()).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["data"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn adds_alias_to_gemini_shape() {
        let body = br#"{"models":[{"name":"gemini-pro"}]}"#;
        let out = enhance(body, &mapping()).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["models"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn unrecognized_shape_returns_none() {
        let body = br#"{"ok":true}"#;
        assert!(enhance(body, &mapping()).is_none());
    }

    #[test]
    fn empty_mapping_is_a_no_op() {
        let body = br#"{"data":[{"id":"gpt-4o"}]}"#;
        assert!(enhance(body, &[]).is_none());
    }

    #[test]
    fn trailing_slash_tolerated() {
        assert!(is_models_path("/v1/models/"));
        assert!(is_models_path("/v1/models"));
        assert!(!is_models_path("/v1/chat/completions"));
    }
}
