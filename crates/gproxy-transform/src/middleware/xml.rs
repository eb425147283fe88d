//! The XML tool-call parser.
//!
//! Models that were prompted with the trigger-signal protocol (see
//! [`super::prompt`]) reply with plain text containing an XML block. This
//! module turns that text back into a list of `(name, arguments)` pairs,
//! tolerating the handful of shapes real models drift into: nested
//! `<invocation>`/`<invoke>` wrappers, a `<tool>`/`<tool_name>` + `<args>`
//! shape, and bare top-level `<tool_call name="...">` blocks.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value as JsonValue};

const RESERVED_PARAM_TAGS: &[&str] = &["name", "parameters", "invocation", "invoke", "tool", "args"];

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToolCall {
    pub name: String,
    pub arguments: JsonValue,
}

static THINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());
static FUNCTION_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<function_call>(.*?)</function_call>").unwrap());
static TOP_LEVEL_TOOL_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<tool_call\s+name="([^"]*)"\s*>(.*?)</tool_call>"#).unwrap());
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<name>(.*?)</name>").unwrap());
static TOOL_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tool_name>(.*?)</tool_name>").unwrap());
static PARAMETERS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<parameters>(.*?)</parameters>").unwrap());
static ARGS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<args>(.*?)</args>").unwrap());
static MCP_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<parameter\s+name="([^"]+)"[^>]*>(.*?)</parameter>"#).unwrap());
static GENERIC_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<([a-zA-Z_][\w\-]*)>(.*?)</\1>").unwrap());
static UNCLOSED_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<([a-zA-Z_][\w\-]*)>([^<]*)").unwrap());
static HYBRID_JSON_XML_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)"([a-zA-Z_][\w\-]*)"\s*:\s*"([^"]*?)</\1>"#).unwrap());
static SPECIAL_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[｜|][^｜|>]+[｜|]>").unwrap());

/// Parses a full (or fully-accumulated) assistant reply into tool calls.
/// `trigger`, if given, anchors the start of the XML block and is
/// otherwise stripped as an orphan if it recurs.
pub fn parse_function_calls_xml(raw: &str, trigger: Option<&str>) -> Vec<ParsedToolCall> {
    let without_think = THINK_RE.replace_all(raw, "");

    let anchor = trigger
        .and_then(|t| without_think.find(t).map(|i| i + t.len()))
        .or_else(|| without_think.find("<function_calls>"));
    let Some(start) = anchor else {
        return Vec::new();
    };
    let mut text = without_think[start..].to_string();

    if let Some(t) = trigger {
        text = text.replace(t, "");
    }

    if let Some(open_idx) = text.find("<function_calls>") {
        if let Some(close_rel) = text[open_idx..].find("</function_calls>") {
            let close_idx = open_idx + close_rel + "</function_calls>".len();
            text.truncate(close_idx);
        }
    }

    extract_invocations(&text)
        .into_iter()
        .map(|(name, params_block)| ParsedToolCall {
            name,
            arguments: extract_parameters(&params_block),
        })
        .collect()
}

/// One `(tool_name, raw_parameters_block)` per `<function_call>` (or
/// top-level `<tool_call>`) found in `text`.
fn extract_invocations(text: &str) -> Vec<(String, String)> {
    let blocks: Vec<&str> = FUNCTION_CALL_RE
        .captures_iter(text)
        .map(|c| c.get(1).unwrap().as_str())
        .collect();

    if !blocks.is_empty() {
        return blocks
            .into_iter()
            .filter_map(|block| {
                let inner = unwrap_container(block);
                let name = extract_name(&inner)?;
                let params = extract_params_block(&inner).unwrap_or_else(|| inner.clone());
                Some((name, params))
            })
            .collect();
    }

    TOP_LEVEL_TOOL_CALL_RE
        .captures_iter(text)
        .map(|c| {
            let name = c.get(1).unwrap().as_str().to_string();
            let inner = c.get(2).unwrap().as_str();
            let params = extract_params_block(inner).unwrap_or_else(|| inner.to_string());
            (name, params)
        })
        .collect()
}

/// Strips an outer `<invocation>`/`<invoke>`/`<tool>` wrapper, returning
/// its inner content; returns the input unchanged if no such wrapper is
/// present (the `<tool_name>` + `<args>` shape can appear unwrapped).
fn unwrap_container(block: &str) -> String {
    for tag in ["invocation", "invoke", "tool"] {
        if let Some(inner) = extract_tag(block, tag) {
            return inner;
        }
    }
    block.to_string()
}

fn extract_tag(s: &str, tag: &str) -> Option<String> {
    let re = Regex::new(&format!(r"(?s)<{tag}(?:\s[^>]*)?>(.*?)</{tag}>")).ok()?;
    re.captures(s).map(|c| c.get(1).unwrap().as_str().to_string())
}

fn extract_name(s: &str) -> Option<String> {
    NAME_RE
        .captures(s)
        .or_else(|| TOOL_NAME_RE.captures(s))
        .map(|c| c.get(1).unwrap().as_str().trim().to_string())
        .filter(|n| !n.is_empty())
}

fn extract_params_block(s: &str) -> Option<String> {
    PARAMETERS_RE
        .captures(s)
        .or_else(|| ARGS_RE.captures(s))
        .map(|c| c.get(1).unwrap().as_str().to_string())
}

/// Parameter extraction precedence: full-content JSON,
/// then MCP-style `<parameter name="k">`, then generic `<k>v</k>` pairs,
/// then an unclosed-tag fallback, then a hybrid JSON/XML salvage.
fn extract_parameters(block: &str) -> JsonValue {
    let trimmed = block.trim();

    if let Ok(value) = serde_json::from_str::<JsonValue>(trimmed) {
        return match value {
            JsonValue::Object(_) => sanitize_value(value),
            other => sanitize_value(JsonValue::Object(Map::from_iter([(
                "value".to_string(),
                other,
            )]))),
        };
    }

    let mcp_matches: Vec<_> = MCP_PARAM_RE.captures_iter(block).collect();
    if !mcp_matches.is_empty() {
        let mut map = Map::new();
        for cap in mcp_matches {
            map.insert(cap[1].to_string(), reparse_value(&cap[2]));
        }
        return JsonValue::Object(map);
    }

    let generic_matches: Vec<_> = GENERIC_TAG_RE
        .captures_iter(block)
        .filter(|c| !RESERVED_PARAM_TAGS.contains(&c[1].to_lowercase().as_str()))
        .collect();
    if !generic_matches.is_empty() {
        let mut map = Map::new();
        for cap in generic_matches {
            map.insert(cap[1].to_string(), reparse_value(&cap[2]));
        }
        return JsonValue::Object(map);
    }

    if let Some(cap) = UNCLOSED_TAG_RE.captures(block) {
        if !RESERVED_PARAM_TAGS.contains(&cap[1].to_lowercase().as_str()) {
            let mut map = Map::new();
            map.insert(cap[1].to_string(), reparse_value(&cap[2]));
            return JsonValue::Object(map);
        }
    }

    if let Some(cap) = HYBRID_JSON_XML_RE.captures(block) {
        let mut map = Map::new();
        map.insert(
            cap[1].to_string(),
            JsonValue::String(strip_special_tokens(&cap[2])),
        );
        return JsonValue::Object(map);
    }

    JsonValue::Object(Map::new())
}

fn reparse_value(raw: &str) -> JsonValue {
    let trimmed = raw.trim();
    let value = serde_json::from_str::<JsonValue>(trimmed)
        .unwrap_or_else(|_| JsonValue::String(trimmed.to_string()));
    sanitize_value(value)
}

/// Recursively strips model-specific special tokens
/// from every string reachable through maps and arrays.
fn sanitize_value(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::String(s) => JsonValue::String(strip_special_tokens(&s)),
        JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(sanitize_value).collect()),
        JsonValue::Object(map) => {
            JsonValue::Object(map.into_iter().map(|(k, v)| (k, sanitize_value(v))).collect())
        }
        other => other,
    }
}

fn strip_special_tokens(s: &str) -> String {
    let mut current = s.to_string();
    loop {
        let next = SPECIAL_TOKEN_RE.replace_all(&current, "").to_string();
        if next == current {
            return current;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_invocation_shape() {
        let text = "<Function_ABC_Start/><function_calls><function_call><invocation><name>lookup</name><parameters><q>x</q></parameters></invocation></function_call></function_calls>";
        let calls = parse_function_calls_xml(text, Some("<Function_ABC_Start/>"));
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "lookup");
        assert_eq!(calls[0].arguments, serde_json::json!({"q": "x"}));
    }

    #[test]
    fn parses_tool_name_args_shape() {
        let text = "<function_calls><function_call><tool><tool_name>search</tool_name><args>{\"query\":\"rust\"}</args></tool></function_call></function_calls>";
        let calls = parse_function_calls_xml(text, None);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search");
        assert_eq!(calls[0].arguments, serde_json::json!({"query": "rust"}));
    }

    #[test]
    fn parses_top_level_tool_call_blocks() {
        let text = r#"<function_calls><tool_call name="ping"><host>example.com</host></tool_call></function_calls>"#;
        let calls = parse_function_calls_xml(text, None);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "ping");
        assert_eq!(calls[0].arguments, serde_json::json!({"host": "example.com"}));
    }

    #[test]
    fn multiple_function_calls_are_all_extracted() {
        let text = "<function_calls>\
<function_call><invocation><name>a</name><parameters><x>1</x></parameters></invocation></function_call>\
<function_call><invocation><name>b</name><parameters><y>2</y></parameters></invocation></function_call>\
</function_calls>";
        let calls = parse_function_calls_xml(text, None);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "a");
        assert_eq!(calls[1].name, "b");
    }

    #[test]
    fn strips_think_blocks_before_anchoring() {
        let text = "<think>let me plan</think><function_calls><function_call><invocation><name>a</name><parameters><x>1</x></parameters></invocation></function_call></function_calls>";
        let calls = parse_function_calls_xml(text, None);
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn no_xml_present_yields_no_calls() {
        assert!(parse_function_calls_xml("just some text", None).is_empty());
    }

    #[test]
    fn special_tokens_are_stripped_recursively() {
        let text = "<function_calls><function_call><invocation><name>a</name><parameters><x><|special_token|>hi</x></parameters></invocation></function_call></function_calls>";
        let calls = parse_function_calls_xml(text, None);
        assert_eq!(calls[0].arguments, serde_json::json!({"x": "hi"}));
    }

    #[test]
    fn trailing_duplicate_closers_are_truncated() {
        let text = "<function_calls><function_call><invocation><name>a</name><parameters><x>1</x></parameters></invocation></function_call></function_calls></function_calls>trailing junk";
        let calls = parse_function_calls_xml(text, None);
        assert_eq!(calls.len(), 1);
    }
}
