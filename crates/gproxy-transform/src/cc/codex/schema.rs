//! Tool-schema normalization for Codex: ensure
//! `type:"object"` and `properties:{}`, strip `$schema`.

use gproxy_protocol::JsonObject;
use serde_json::Value;

pub fn normalize(schema: &JsonObject) -> JsonObject {
    let mut out = schema.clone();
    out.remove("$schema");
    out.entry("type".to_string())
        .or_insert_with(|| Value::String("object".to_string()));
    out.entry("properties".to_string())
        .or_insert_with(|| Value::Object(Default::default()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_schema_key_and_fills_required_fields() {
        let mut schema = serde_json::Map::new();
        schema.insert("$schema".to_string(), json!("http://json-schema.org/draft-07/schema#"));
        let out = normalize(&schema);
        assert!(out.get("$schema").is_none());
        assert_eq!(out.get("type"), Some(&json!("object")));
        assert_eq!(out.get("properties"), Some(&json!({})));
    }

    #[test]
    fn existing_type_and_properties_are_preserved() {
        let mut schema = serde_json::Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), json!({"q": {"type": "string"}}));
        let out = normalize(&schema);
        assert_eq!(out.get("properties").unwrap()["q"]["type"], "string");
    }
}
