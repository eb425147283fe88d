//! Codex response -> Claude response, unary.

use gproxy_protocol::claude;
use gproxy_protocol::codex as cx;
use gproxy_provider_core::ToolNameShortMap;

use crate::toolargs;

/// Codex's own `call_id` is `"call_" + <claude tool_use id>` when the call
/// originated from a client tool_use. When Codex originates the call itself, stripping
/// the same prefix gives a stable id a later `tool_result` can reference.
pub(super) fn tool_use_id_from_call_id(call_id: &str) -> String {
    call_id
        .strip_prefix("call_")
        .map(str::to_string)
        .unwrap_or_else(|| call_id.to_string())
}

pub fn convert(response: cx::ResponseObject, names: &ToolNameShortMap) -> claude::CreateMessageResponse {
    let mut content = Vec::new();
    let mut any_tool_use = false;

    for item in response.output {
        match item.item_type.as_str() {
            "message" => {
                for part in item.content.into_iter().flatten() {
                    let text = match part {
                        cx::MessageContentPart::OutputText { text } => text,
                        cx::MessageContentPart::InputText { text } => text,
                    };
                    if !text.is_empty() {
                        content.push(claude::ContentBlock::Text { text });
                    }
                }
            }
            "function_call" => {
                any_tool_use = true;
                let call_id = item.call_id.clone().unwrap_or_default();
                let name = names.restore(item.name.as_deref().unwrap_or_default());
                let mut input: serde_json::Value = item
                    .arguments
                    .as_deref()
                    .and_then(|a| serde_json::from_str(a).ok())
                    .unwrap_or(serde_json::Value::Object(Default::default()));
                toolargs::apply_by_tool_name(&name, &mut input);
                content.push(claude::ContentBlock::ToolUse {
                    id: tool_use_id_from_call_id(&call_id),
                    name,
                    input,
                });
            }
            _ => {
                tracing::debug!(item_type = %item.item_type, "unrecognized codex output item type");
            }
        }
    }

    let stop_reason = if any_tool_use {
        claude::StopReason::ToolUse
    } else {
        claude::StopReason::EndTurn
    };

    let mut message = claude::CreateMessageResponse::new(response.id, response.model);
    message.content = content;
    message.stop_reason = Some(stop_reason);
    message.usage = claude::Usage {
        input_tokens: response.usage.input_tokens,
        output_tokens: response.usage.output_tokens,
        cache_creation_input_tokens: None,
        cache_read_input_tokens: None,
    };
    message
}
