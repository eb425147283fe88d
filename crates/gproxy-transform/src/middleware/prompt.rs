//! Request-side half of the function-call middleware. Runs only for OpenAI-channel groups with
//! `force_function_call=true` at the chat-completions endpoint, and only
//! when the client declared `tools`.

use gproxy_provider_core::TriggerSignal;
use serde_json::{Map, Value as JsonValue};

/// One client-declared tool, reduced to what the prompt needs to describe
/// it: name, description, and a parameter-name(type) summary sorted
/// deterministically.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<(String, String)>,
}

/// Below this, `max_tokens` is dropped entirely rather than left in place,
/// to avoid mid-XML truncation.
const MIN_MAX_TOKENS: u64 = 500;

/// Builds the system-message text mandating the trigger-signal + XML
/// protocol.
pub fn build_tool_prompt(tools: &[ToolSpec], trigger: &TriggerSignal) -> String {
    let mut sorted: Vec<&ToolSpec> = tools.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut out = String::from(
        "You have access to the following tools. To call one, you MUST NOT use any \
         native tool-calling mechanism; instead, reply with exactly the trigger token \
         below immediately followed by an XML block describing the call(s).\n\nTools:\n",
    );
    for tool in sorted {
        out.push_str(&format!("- {}: {}\n", tool.name, tool.description));
        let mut params = tool.parameters.clone();
        params.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, ty) in params {
            out.push_str(&format!("  - {name}({ty})\n"));
        }
    }
    out.push_str(&format!(
        "\nWhen you need to call one or more tools, output exactly this token first:\n{}\n\n",
        trigger.as_str()
    ));
    out.push_str(
        "Then, immediately after, output this XML (no other text inside it):\n\
         <function_calls><function_call><invocation><name>TOOL_NAME</name>\
         <parameters><PARAM_NAME>value</PARAM_NAME></parameters></invocation>\
         </function_call></function_calls>\n\n\
         Multiple <function_call> and <invocation> siblings are permitted when you need \
         to call more than one tool. Do not emit the trigger token or the XML block unless \
         you are actually calling a tool.",
    );
    out
}

/// Rewrites a request body (already parsed as JSON) to strip native
/// `tools`/`tool_choice` and inject the prompt-based protocol in their
/// place. No-op if `tools` is absent or empty.
pub fn apply_request(body: &mut JsonValue, trigger: &TriggerSignal) {
    let JsonValue::Object(map) = body else {
        return;
    };

    let Some(JsonValue::Array(tool_defs)) = map.get("tools") else {
        return;
    };
    if tool_defs.is_empty() {
        return;
    }
    let tools = tool_specs_from_body(tool_defs);
    map.remove("tools");
    map.remove("tool_choice");

    if let Some(JsonValue::Number(max_tokens)) = map.get("max_tokens") {
        if max_tokens.as_u64().is_some_and(|v| v < MIN_MAX_TOKENS) {
            map.remove("max_tokens");
        }
    }

    let has_prior_tool_activity = map
        .get("messages")
        .and_then(JsonValue::as_array)
        .is_some_and(|messages| {
            messages.iter().any(|m| {
                matches!(
                    m.get("role").and_then(JsonValue::as_str),
                    Some("tool") | Some("function")
                )
            })
        });

    if has_prior_tool_activity {
        if let Some(JsonValue::Array(messages)) = map.get_mut("messages") {
            rewrite_tool_history_as_narrative(messages);
        }
    }

    let prompt = build_tool_prompt(&tools, trigger);
    let system_message = serde_json::json!({"role": "system", "content": prompt});
    match map.get_mut("messages") {
        Some(JsonValue::Array(messages)) => messages.insert(0, system_message),
        _ => {
            map.insert("messages".to_string(), JsonValue::Array(vec![system_message]));
        }
    }

    if has_prior_tool_activity {
        append_continuation_directive(map);
    }
}

fn tool_specs_from_body(tool_defs: &[JsonValue]) -> Vec<ToolSpec> {
    tool_defs
        .iter()
        .filter_map(|def| {
            let function = def.get("function")?;
            let name = function.get("name")?.as_str()?.to_string();
            let description = function
                .get("description")
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string();
            let parameters = function
                .get("parameters")
                .and_then(JsonValue::as_object)
                .and_then(|p| p.get("properties"))
                .and_then(JsonValue::as_object)
                .map(params_with_type_summary)
                .unwrap_or_default();
            Some(ToolSpec {
                name,
                description,
                parameters,
            })
        })
        .collect()
}

fn params_with_type_summary(properties: &Map<String, JsonValue>) -> Vec<(String, String)> {
    properties
        .iter()
        .map(|(name, schema)| {
            let ty = schema
                .get("type")
                .and_then(JsonValue::as_str)
                .unwrap_or("string")
                .to_string();
            (name.clone(), ty)
        })
        .collect()
}

/// Folds prior `role:"tool"`/`role:"function"` messages into a synthetic
/// XML-text narrative so a non-native model can "see" earlier tool
/// activity it didn't natively emit.
fn rewrite_tool_history_as_narrative(messages: &mut Vec<JsonValue>) {
    let mut rewritten = Vec::with_capacity(messages.len());
    for message in messages.drain(..) {
        let role = message.get("role").and_then(JsonValue::as_str);
        match role {
            Some("tool") | Some("function") => {
                let name = message
                    .get("name")
                    .or_else(|| message.get("tool_call_id"))
                    .and_then(JsonValue::as_str)
                    .unwrap_or("tool");
                let content = message
                    .get("content")
                    .and_then(JsonValue::as_str)
                    .unwrap_or_default();
                rewritten.push(serde_json::json!({
                    "role": "user",
                    "content": format!(
                        "[Prior tool activity] <function_results><result name=\"{name}\">{content}</result></function_results>"
                    ),
                }));
            }
            _ => rewritten.push(message),
        }
    }
    *messages = rewritten;
}

fn append_continuation_directive(map: &mut Map<String, JsonValue>) {
    let directive = "\n\nContinue the conversation using the tool results above. If you need \
        to call another tool, use the trigger token and XML protocol described earlier; \
        otherwise respond normally.";
    if let Some(JsonValue::Array(messages)) = map.get_mut("messages") {
        if let Some(last_user) = messages.iter_mut().rev().find(|m| {
            matches!(m.get("role").and_then(JsonValue::as_str), Some("user"))
        }) {
            if let Some(JsonValue::String(content)) = last_user.get_mut("content") {
                content.push_str(directive);
                return;
            }
        }
        messages.push(serde_json::json!({"role": "user", "content": directive.trim_start()}));
    }
}
