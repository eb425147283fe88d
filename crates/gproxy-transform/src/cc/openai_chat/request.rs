//! Claude request -> OpenAI-Chat request.

use gproxy_protocol::claude;
use gproxy_protocol::openai_chat as oa;
use gproxy_provider_core::ToolNameShortMap;

/// Converts a Claude `CreateMessageRequest` into an OpenAI
/// `ChatCompletionRequest`. `names` is built from the request's own
/// `tools[]` by the caller and carried alongside the converted request so
/// the response side can restore original names.
pub fn convert(request: &claude::CreateMessageRequest, names: &ToolNameShortMap) -> oa::ChatCompletionRequest {
    let mut messages = Vec::new();

    if let Some(system) = &request.system {
        messages.push(oa::Message::system(system.clone().into_text()));
    }

    for message in &request.messages {
        messages.extend(convert_message(message, names));
    }

    let tools = request.tools.as_ref().map(|tools| {
        tools
            .iter()
            .map(|tool| oa::ToolDefinition {
                tool_type: "function".to_string(),
                function: oa::FunctionObject {
                    name: names.shorten(&tool.name),
                    description: tool.description.clone(),
                    parameters: tool.input_schema.clone(),
                },
            })
            .collect()
    });

    let tool_choice = request.tool_choice.as_ref().map(|choice| match choice {
        claude::ToolChoice::Auto => oa::ToolChoice::Mode("auto".to_string()),
        claude::ToolChoice::Any => oa::ToolChoice::Mode("required".to_string()),
        claude::ToolChoice::None => oa::ToolChoice::Mode("none".to_string()),
        claude::ToolChoice::Tool { name } => oa::ToolChoice::Named {
            choice_type: "function".to_string(),
            function: oa::ToolChoiceFunction {
                name: names.shorten(name),
            },
        },
    });

    oa::ChatCompletionRequest {
        model: request.model.clone(),
        messages,
        max_tokens: Some(request.max_tokens),
        tools,
        tool_choice,
        parallel_tool_calls: None,
        stream: request.stream,
        temperature: request.temperature,
        top_p: request.top_p,
        stop: request
            .stop_sequences
            .as_ref()
            .map(|s| serde_json::to_value(s).unwrap_or(serde_json::Value::Null)),
        extra: Default::default(),
    }
}

fn convert_message(message: &claude::Message, names: &ToolNameShortMap) -> Vec<oa::Message> {
    let role = match message.role {
        claude::Role::User => oa::Role::User,
        claude::Role::Assistant => oa::Role::Assistant,
    };

    let blocks = message.content.clone().blocks();
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();
    let mut tool_results = Vec::new();

    for block in blocks {
        match block {
            claude::ContentBlock::Text { text } => text_parts.push(text),
            claude::ContentBlock::Thinking { .. } => {
                // Thinking has no OpenAI-Chat input equivalent; elided by contract.
            }
            claude::ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(oa::ToolCall {
                    id,
                    call_type: "function".to_string(),
                    function: oa::ToolCallFunction {
                        name: names.shorten(&name),
                        arguments: input.to_string(),
                    },
                });
            }
            claude::ContentBlock::ToolResult {
                tool_use_id,
                content,
                    ..
            } => {
                let text = content.map(claude::ToolResultContent::into_text).unwrap_or_default();
                tool_results.push(oa::Message {
                    role: oa::Role::Tool,
                    content: Some(text),
                    tool_calls: None,
                    tool_call_id: Some(tool_use_id),
                    name: None,
                });
            }
        }
    }

    let mut out = Vec::new();
    if !tool_results.is_empty() {
        // A Claude user turn carrying only tool_results has nothing else
        // to say; if it also had text, emit the text as its own turn.
        if !text_parts.is_empty() {
            out.push(oa::Message {
                role,
                content: Some(text_parts.join("\n\n")),
                tool_calls: None,
                tool_call_id: None,
                name: None,
            });
        }
        out.extend(tool_results);
        return out;
    }

    let content = if text_parts.is_empty() {
        None
    } else {
        Some(text_parts.join("\n\n"))
    };
    out.push(oa::Message {
        role,
        content,
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        tool_call_id: None,
        name: None,
    });
    out
}
