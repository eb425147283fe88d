//! Claude request -> Gemini `GenerateContentRequest`.

use gproxy_protocol::claude;
use gproxy_protocol::gemini as g;
use gproxy_provider_core::ToolNameShortMap;

use super::schema;

pub fn convert(request: &claude::CreateMessageRequest, names: &ToolNameShortMap) -> g::GenerateContentRequest {
    let system_instruction = request.system.as_ref().map(|system| g::Content {
        role: None,
        parts: vec![g::Part {
            text: Some(system.clone().into_text()),
                ..Default::default()
        }],
    });

    // Claude's `tool_result` only carries the originating `tool_use_id`;
    // Gemini's function-response part needs the function *name*. Recover it
    // from the matching `tool_use` block seen earlier in the conversation.
    let mut call_names = std::collections::HashMap::new();
    for message in &request.messages {
        for block in message.content.clone().blocks() {
            if let claude::ContentBlock::ToolUse { id, name, .. } = block {
                call_names.insert(id, name);
            }
        }
    }

    let contents = request
        .messages
        .iter()
        .flat_map(|message| convert_message(message, names, &call_names))
        .collect();

    let tools = request.tools.as_ref().map(|tools| {
        vec![g::Tool {
            function_declarations: tools
                .iter()
                .map(|tool| g::FunctionDeclaration {
                    name: names.shorten(&tool.name),
                    description: tool.description.clone(),
                    parameters: schema::normalize(&tool.input_schema),
                })
                .collect(),
        }]
    });

    let tool_config = request.tool_choice.as_ref().map(|choice| match choice {
        claude::ToolChoice::Auto => g::ToolConfig {
            function_calling_config: g::FunctionCallingConfig {
                mode: g::FunctionCallingMode::Auto,
                allowed_function_names: None,
            },
        },
        claude::ToolChoice::Any => g::ToolConfig {
            function_calling_config: g::FunctionCallingConfig {
                mode: g::FunctionCallingMode::Any,
                allowed_function_names: None,
            },
        },
        claude::ToolChoice::None => g::ToolConfig {
            function_calling_config: g::FunctionCallingConfig {
                mode: g::FunctionCallingMode::None,
                allowed_function_names: None,
            },
        },
        claude::ToolChoice::Tool { name } => g::ToolConfig {
            function_calling_config: g::FunctionCallingConfig {
                mode: g::FunctionCallingMode::Any,
                allowed_function_names: Some(vec![names.shorten(name)]),
            },
        },
    });

    let thinking_config = request.thinking.as_ref().and_then(|thinking| {
        (thinking.mode == claude::ThinkingMode::Enabled).then(|| g::ThinkingConfig {
            thinking_budget: thinking.budget_tokens,
            include_thoughts: Some(true),
        })
    });

    let generation_config = if request.max_tokens > 0
        || request.temperature.is_some()
        || request.top_p.is_some()
        || thinking_config.is_some()
    {
        Some(g::GenerationConfig {
            max_output_tokens: Some(request.max_tokens),
            temperature: request.temperature,
            top_p: request.top_p,
            thinking_config,
        })
    } else {
        None
    };

    g::GenerateContentRequest {
        contents,
        system_instruction,
        tools,
        tool_config,
        generation_config,
    }
}

fn convert_message(
    message: &claude::Message,
    names: &ToolNameShortMap,
    call_names: &std::collections::HashMap<String, String>,
) -> Vec<g::Content> {
    let role = match message.role {
        claude::Role::User => g::Role::User,
        claude::Role::Assistant => g::Role::Model,
    };

    let mut parts = Vec::new();
    let mut function_response_parts = Vec::new();

    for block in message.content.clone().blocks() {
        match block {
            claude::ContentBlock::Text { text } => {
                if !text.is_empty() {
                    parts.push(g::Part {
                        text: Some(text),
                            ..Default::default()
                    });
                }
            }
            claude::ContentBlock::Thinking { .. } => {
                // Gemini has no input representation for prior thinking;
                // elided per the same rule as the other non-Claude targets.
            }
            claude::ContentBlock::ToolUse { name, input, .. } => {
                let args = input.as_object().cloned().unwrap_or_default();
                parts.push(g::Part {
                    function_call: Some(g::FunctionCall {
                        name: names.shorten(&name),
                        args,
                    }),
                        ..Default::default()
                });
            }
            claude::ContentBlock::ToolResult {
                tool_use_id,
                content,
                    ..
            } => {
                let text = content.map(claude::ToolResultContent::into_text).unwrap_or_default();
                let mut response = serde_json::Map::new();
                response.insert("result".to_string(), serde_json::Value::String(text));
                let name = call_names
                    .get(&tool_use_id)
                    .map(|n| names.shorten(n))
                    .unwrap_or(tool_use_id);
                function_response_parts.push(g::Part {
                    function_response: Some(g::FunctionResponse { name, response }),
                        ..Default::default()
                });
            }
        }
    }

    let mut out = Vec::new();
    if !parts.is_empty() {
        out.push(g::Content { role: Some(role), parts });
    }
    if !function_response_parts.is_empty() {
        out.push(g::Content {
            role: Some(g::Role::Function),
            parts: function_response_parts,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use claude::{ContentBlock, Message, MessageContent, Role};

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
    fn system_prompt_becomes_system_instruction() {
        let names = ToolNameShortMap::default();
        let converted = convert(&basic_request(), &names);
        assert_eq!(
            converted.system_instruction.unwrap().parts[0].text.as_deref(),
            Some("be nice")
        );
    }

    #[test]
    fn tool_with_name_choice_maps_to_any_mode() {
        let mut request = basic_request();
        request.tool_choice = Some(claude::ToolChoice::Tool { name: "lookup".to_string() });
        let names = ToolNameShortMap::build(["lookup"]);
        let converted = convert(&request, &names);
        let config = converted.tool_config.unwrap().function_calling_config;
        assert_eq!(config.mode, g::FunctionCallingMode::Any);
        assert_eq!(config.allowed_function_names, Some(vec!["lookup".to_string()]));
    }

    #[test]
    fn tool_result_becomes_function_role_content() {
        let mut request = basic_request();
        request.messages.push(Message {
            role: Role::User,
            content: MessageContent::Blocks(vec![ContentBlock::ToolResult {
                tool_use_id: "lookup".to_string(),
                content: Some(claude::ToolResultContent::Text("42".to_string())),
                is_error: None,
            }]),
        });
        let names = ToolNameShortMap::default();
        let converted = convert(&request, &names);
        let function_content = converted
            .contents
            .iter()
            .find(|c| c.role == Some(g::Role::Function))
            .unwrap();
        assert_eq!(function_content.parts[0].function_response.as_ref().unwrap().name, "lookup");
    }

    #[test]
    fn empty_tool_schema_gets_synthetic_property() {
        let mut request = basic_request();
        request.tools = Some(vec![claude::Tool {
            name: "ping".to_string(),
            description: None,
            input_schema: serde_json::from_value(serde_json::json!({"type": "object", "properties": {}})).unwrap(),
        }]);
        let names = ToolNameShortMap::build(["ping"]);
        let converted = convert(&request, &names);
        let declaration = &converted.tools.unwrap()[0].function_declarations[0];
        assert!(declaration.parameters.get("properties").unwrap()["_"].is_object());
    }
}
