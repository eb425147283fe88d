//! Claude request -> Codex `CreateResponseRequest`.

use gproxy_protocol::claude;
use gproxy_protocol::codex as cx;
use gproxy_provider_core::group::CodexInstructionsMode;
use gproxy_provider_core::ToolNameShortMap;

use super::{instructions, reasoning, schema};
use crate::toolargs;

pub struct CodexRequestOptions<'a> {
    pub instructions_mode: CodexInstructionsMode,
    pub custom_instructions: Option<&'a str>,
    pub thinking_model_override: Option<&'a str>,
    pub parallel_tool_calls_override: Option<bool>,
}

pub fn convert(
    request: &claude::CreateMessageRequest,
    names: &ToolNameShortMap,
    options: &CodexRequestOptions<'_>,
) -> cx::CreateResponseRequest {
    let mut input = Vec::new();

    if let Some(system) = &request.system {
        let text = system.clone().into_text();
        if !text.is_empty() {
            input.push(cx::InputItem::Message {
                role: cx::Role::User,
                content: vec![cx::MessageContentPart::InputText {
                    text: format!("[System Instructions]\n{text}\n[End System Instructions]"),
                }],
            });
        }
    }

    let last_user_index = request
        .messages
        .iter()
        .rposition(|m| matches!(m.role, claude::Role::User));

    for (index, message) in request.messages.iter().enumerate() {
        let hint = if Some(index) == last_user_index {
            request
                .thinking
                .as_ref()
                .filter(|t| t.mode == claude::ThinkingMode::Enabled)
                .map(|t| reasoning::budget_hint(t.budget_tokens.unwrap_or(0)))
        } else {
            None
        };
        input.extend(convert_message(message, names, hint));
    }

    let tools = request.tools.as_ref().map(|tools| {
        tools
            .iter()
            .map(|tool| cx::FunctionTool {
                tool_type: "function".to_string(),
                name: names.shorten(&tool.name),
                description: tool.description.clone(),
                parameters: schema::normalize(&tool.input_schema),
            })
            .collect::<Vec<_>>()
    });

    let thinking_enabled = request
        .thinking
        .as_ref()
        .map(|t| t.mode == claude::ThinkingMode::Enabled)
        .unwrap_or(false);

    let model = if thinking_enabled {
        options
            .thinking_model_override
            .filter(|m| *m != request.model)
            .unwrap_or(&request.model)
            .to_string()
    } else {
        request.model.clone()
    };

    let reasoning = if thinking_enabled {
        Some(cx::Reasoning {
            effort: reasoning::effort_for_budget(request.thinking.as_ref().and_then(|t| t.budget_tokens)),
            summary: "auto".to_string(),
        })
    } else {
        None
    };

    cx::CreateResponseRequest {
        model,
        input,
        instructions: instructions::select(options.instructions_mode, options.custom_instructions),
        tools,
        parallel_tool_calls: request.tools.as_ref().map(|_| options.parallel_tool_calls_override.unwrap_or(true)),
        reasoning,
        store: if thinking_enabled { Some(false) } else { None },
        include: if thinking_enabled {
            Some(vec!["reasoning.encrypted_content".to_string()])
        } else {
            None
        },
        stream: request.stream,
        temperature: request.temperature,
        top_p: request.top_p,
    }
}

fn convert_message(message: &claude::Message, names: &ToolNameShortMap, trailing_hint: Option<String>) -> Vec<cx::InputItem> {
    let role = match message.role {
        claude::Role::User => cx::Role::User,
        claude::Role::Assistant => cx::Role::Assistant,
    };

    let mut out = Vec::new();
    let mut text_parts = Vec::new();

    for block in message.content.clone().blocks() {
        match block {
            claude::ContentBlock::Text { text } => text_parts.push(text),
            claude::ContentBlock::Thinking { .. } => {}
            claude::ContentBlock::ToolUse { id, name, mut input } => {
                if !text_parts.is_empty() {
                    out.push(text_item(role, std::mem::take(&mut text_parts).join("\n\n")));
                }
                toolargs::apply_by_tool_name(&name, &mut input);
                out.push(cx::InputItem::FunctionCall {
                    id: format!("fc_{id}"),
                    call_id: format!("call_{id}"),
                    name: names.shorten(&name),
                    arguments: input.to_string(),
                });
            }
            claude::ContentBlock::ToolResult {
                tool_use_id,
                content,
                    ..
            } => {
                if !text_parts.is_empty() {
                    out.push(text_item(role, std::mem::take(&mut text_parts).join("\n\n")));
                }
                let output = content.map(claude::ToolResultContent::into_text).unwrap_or_default();
                out.push(cx::InputItem::FunctionCallOutput {
                    call_id: format!("call_{tool_use_id}"),
                    output,
                });
            }
        }
    }

    if !text_parts.is_empty() || out.is_empty() {
        let mut text = text_parts.join("\n\n");
        if let Some(hint) = trailing_hint {
            text.push_str(&hint);
        }
        out.push(text_item(role, text));
    }

    out
}

fn text_item(role: cx::Role, text: String) -> cx::InputItem {
    let part = match role {
        cx::Role::Assistant => cx::MessageContentPart::OutputText { text },
        _ => cx::MessageContentPart::InputText { text },
    };
    cx::InputItem::Message {
        role,
        content: vec![part],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claude::{ContentBlock, Message, MessageContent, Role, ThinkingConfig, ThinkingMode};

    fn options() -> CodexRequestOptions<'static> {
        CodexRequestOptions {
            instructions_mode: CodexInstructionsMode::Auto,
            custom_instructions: None,
            thinking_model_override: None,
            parallel_tool_calls_override: None,
        }
    }

    fn basic_request() -> claude::CreateMessageRequest {
        claude::CreateMessageRequest {
            model: "claude-3-5-sonnet".to_string(),
            messages: vec![Message {
                role: Role::User,
                content: MessageContent::Text("hello".to_string()),
            }],
            max_tokens: 1024,
            system: Some(claude::SystemPrompt::Text("be nice".to_string())),
            tools: None,
            tool_choice: None,
            thinking: None,
            stream: None,
            temperature: None,
            top_p: None,
            stop_sequences: None,
        }
    }

    #[test]
    fn instructions_is_never_empty() {
        let names = ToolNameShortMap::default();
        let converted = convert(&basic_request(), &names, &options());
        assert!(!converted.instructions.is_empty());
    }

    #[test]
    fn system_prompt_is_wrapped_not_merged_into_instructions() {
        let names = ToolNameShortMap::default();
        let converted = convert(&basic_request(), &names, &options());
        let cx::InputItem::Message { content, .. } = &converted.input[0] else {
            panic!("expected message item");
        };
        let cx::MessageContentPart::InputText { text } = &content[0] else {
            panic!("expected input_text part");
        };
        assert!(text.starts_with("[System Instructions]"));
        assert!(text.contains("be nice"));
    }

    #[test]
    fn max_output_tokens_is_never_set() {
        // CreateResponseRequest has no max_output_tokens field; this test
        // documents that omission is structural, not conditional.
        let names = ToolNameShortMap::default();
        let converted = convert(&basic_request(), &names, &options());
        let serialized = serde_json::to_string(&converted).unwrap();
        assert!(!serialized.contains("max_output_tokens"));
    }

    #[test]
    fn non_thinking_request_sends_no_reasoning_fields() {
        let names = ToolNameShortMap::default();
        let converted = convert(&basic_request(), &names, &options());
        assert!(converted.reasoning.is_none());
        assert!(converted.store.is_none());
        assert!(converted.include.is_none());
    }

    #[test]
    fn thinking_request_sets_reasoning_and_hint() {
        let mut request = basic_request();
        request.thinking = Some(ThinkingConfig {
            mode: ThinkingMode::Enabled,
            budget_tokens: Some(20_000),
        });
        let names = ToolNameShortMap::default();
        let converted = convert(&request, &names, &options());
        assert!(converted.reasoning.is_some());
        assert_eq!(converted.reasoning.unwrap().effort, cx::ReasoningEffort::High);
        assert_eq!(converted.store, Some(false));

        let last = converted.input.last().unwrap();
        let cx::InputItem::Message { content, .. } = last else {
            panic!("expected message item");
        };
        let cx::MessageContentPart::InputText { text } = &content[0] else {
            panic!("expected input_text");
        };
        assert!(text.contains("Reasoning budget"));
    }

    #[test]
    fn tool_use_becomes_function_call_item_with_fc_and_call_ids() {
        let mut request = basic_request();
        request.messages.push(Message {
            role: Role::Assistant,
            content: MessageContent::Blocks(vec![ContentBlock::ToolUse {
                id: "abc".to_string(),
                name: "lookup".to_string(),
                input: serde_json::json!({}),
            }]),
        });
        let names = ToolNameShortMap::build(["lookup"]);
        let converted = convert(&request, &names, &options());
        let found = converted.input.iter().find_map(|item| match item {
            cx::InputItem::FunctionCall { id, call_id, .. } => Some((id.clone(), call_id.clone())),
            _ => None,
        });
        assert_eq!(found, Some(("fc_abc".to_string(), "call_abc".to_string())));
    }
}
