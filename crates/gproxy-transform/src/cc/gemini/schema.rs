//! Gemini tool-schema normalization: mandatory, not best-effort.
//! JSON-schema `type` strings are uppercased, `anyOf` collapses to its
//! first non-null alternative with an `"Accepts: A | B | …"` annotation,
//! unsupported fields are deleted with their constraint folded into
//! `description`, and empty objects get a synthetic `_` property because
//! Gemini rejects `{"type":"OBJECT","properties":{}}`.

use gproxy_protocol::JsonObject;
use serde_json::Value;

const LENGTH_COUNT_KEYS: [&str; 4] = ["minLength", "maxLength", "minItems", "maxItems"];

pub fn normalize(schema: &JsonObject) -> JsonObject {
    let mut out = schema.clone();
    normalize_object(&mut out);
    out
}

fn normalize_object(obj: &mut JsonObject) {
    if let Some(Value::Array(alternatives)) = obj.remove("anyOf") {
        collapse_any_of(obj, alternatives);
    }

    if let Some(Value::String(ty)) = obj.get("type").cloned() {
        obj.insert("type".to_string(), Value::String(uppercase_type(&ty)));
    }

    strip_unsupported_and_describe(obj);

    if let Some(Value::Object(properties)) = obj.get_mut("properties") {
        for value in properties.values_mut() {
            if let Value::Object(prop) = value {
                normalize_object(prop);
            }
        }
    }
    if let Some(Value::Object(items)) = obj.get_mut("items") {
        normalize_object(items);
    }

    let is_object_type = obj.get("type").and_then(Value::as_str) == Some("OBJECT");
    let properties_empty = match obj.get("properties") {
        Some(Value::Object(m)) => m.is_empty(),
        None => true,
        _ => false,
    };
    if is_object_type && properties_empty {
        let mut synthetic = serde_json::Map::new();
        synthetic.insert("_".to_string(), serde_json::json!({"type": "BOOLEAN"}));
        obj.insert("properties".to_string(), Value::Object(synthetic));
    }
}

fn uppercase_type(ty: &str) -> String {
    ty.to_ascii_uppercase()
}

/// Collapses an `anyOf` array: the first non-null alternative's fields are
/// merged into `obj`, any null alternative sets `nullable: true`, and every
/// alternative's type contributes one label to the `"Accepts: …"` note.
fn collapse_any_of(obj: &mut JsonObject, alternatives: Vec<Value>) {
    let mut nullable = false;
    let mut labels = Vec::new();
    let mut chosen: Option<JsonObject> = None;

    for alt in alternatives {
        let Value::Object(alt_obj) = alt else { continue };
        if alt_obj.get("type").and_then(Value::as_str) == Some("null") {
            nullable = true;
            continue;
        }
        labels.push(alt_obj.get("type").and_then(Value::as_str).unwrap_or("value").to_string());
        if chosen.is_none() {
            chosen = Some(alt_obj);
        }
    }

    if let Some(chosen) = chosen {
        for (key, value) in chosen {
            if key != "description" {
                obj.insert(key, value);
            }
        }
    }
    if nullable {
        obj.insert("nullable".to_string(), Value::Bool(true));
    }
    if !labels.is_empty() {
        append_description(obj, &format!("Accepts: {}", labels.join(" | ")));
    }
}

fn strip_unsupported_and_describe(obj: &mut JsonObject) {
    obj.remove("$schema");
    obj.remove("additionalProperties");

    let mut notes = Vec::new();
    for key in LENGTH_COUNT_KEYS {
        if let Some(value) = obj.remove(key) {
            notes.push(format!("{key}: {value}"));
        }
    }
    if !notes.is_empty() {
        append_description(obj, &notes.join(", "));
    }
}

fn append_description(obj: &mut JsonObject, note: &str) {
    match obj.get_mut("description") {
        Some(Value::String(existing)) => {
            existing.push(' ');
            existing.push_str(note);
        }
        _ => {
            obj.insert("description".to_string(), Value::String(note.to_string()));
        }
    }
}
