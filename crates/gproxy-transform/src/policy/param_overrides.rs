//! Step 1: parameter overrides. Shallow-merges the
//! group's `param_overrides` config object into the top-level request
//! JSON; parse failure passes the original bytes through unchanged.

use gproxy_provider_core::Config;
use serde_json::Value;

pub fn apply(body: &[u8], config: &Config) -> Vec<u8> {
    let Some(overrides) = config.param_overrides() else {
        return body.to_vec();
    };
    if overrides.is_empty() {
        return body.to_vec();
    }

    let Ok(mut value) = serde_json::from_slice::<Value>(body) else {
        return body.to_vec();
    };
    let Value::Object(map) = &mut value else {
        return body.to_vec();
    };

    for (key, override_value) in overrides {
        map.insert(key.clone(), override_value.clone());
    }

    serde_json::to_vec(&value).unwrap_or_else(|_| body.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn config_with_overrides(json: serde_json::Value) -> Config {
        let mut raw = BTreeMap::new();
        raw.insert("param_overrides".to_string(), json);
        Config(raw)
    }

    #[test]
    fn merges_override_keys_shallowly() {
        let config = config_with_overrides(serde_json::json!({"temperature": 0.0, "top_p": 1.0}));
        let body = br#"{"model":"m","temperature":0.9}"#;
        let out = apply(body, &config);
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["temperature"], 0.0);
        assert_eq!(value["top_p"], 1.0);
        assert_eq!(value["model"], "m");
    }

    #[test]
    fn invalid_json_passes_through() {
        let config = config_with_overrides(serde_json::json!({"temperature": 0.0}));
        let body = b"not json";
        assert_eq!(apply(body, &config), body);
    }

    #[test]
    fn no_overrides_is_a_no_op() {
        let config = Config::default();
        let body = br#"{"model":"m"}"#;
        assert_eq!(apply(body, &config), body.to_vec());
    }
}
