//! OpenAI-Chat response -> Claude response, unary.

use gproxy_protocol::claude;
use gproxy_protocol::openai_chat as oa;
use gproxy_provider_core::ToolNameShortMap;

fn stop_reason(reason: Option<oa::FinishReason>) -> Option<claude::StopReason> {
    reason.map(|r| match r {
        oa::FinishReason::ToolCalls => claude::StopReason::ToolUse,
        oa::FinishReason::Stop => claude::StopReason::EndTurn,
        oa::FinishReason::Length => claude::StopReason::MaxTokens,
        oa::FinishReason::ContentFilter => claude::StopReason::EndTurn,
    })
}

pub fn convert(response: oa::ChatCompletionResponse, names: &ToolNameShortMap) -> claude::CreateMessageResponse {
    let choice = response.choices.into_iter().next();
    let mut content = Vec::new();

    if let Some(choice) = &choice {
        if let Some(text) = &choice.message.content {
            if !text.is_empty() {
                content.push(claude::ContentBlock::Text { text: text.clone() });
            }
        }
        if let Some(tool_calls) = &choice.message.tool_calls {
            for call in tool_calls {
                let input = serde_json::from_str(&call.function.arguments)
                    .unwrap_or(serde_json::Value::Object(Default::default()));
                content.push(claude::ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: names.restore(&call.function.name),
                    input,
                });
            }
        }
    }

    let usage = response
        .usage
        .map(|u| claude::Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            cache_creation_input_tokens: None,
            cache_read_input_tokens: None,
        })
        .unwrap_or_default();

    let mut message = claude::CreateMessageResponse::new(response.id, response.model);
    message.content = content;
    message.stop_reason = choice.and_then(|c| stop_reason(c.finish_reason));
    message.usage = usage;
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with(content: Option<&str>, tool_calls: Option<Vec<oa::ToolCall>>, finish: oa::FinishReason) -> oa::ChatCompletionResponse {
        oa::ChatCompletionResponse {
            id: "chatcmpl-1".to_string(),
            model: "gpt-4o".to_string(),
            choices: vec![oa::Choice {
                index: 0,
                message: oa::Message {
                    role: oa::Role::Assistant,
                    content: content.map(str::to_string),
                    tool_calls,
                    tool_call_id: None,
                    name: None,
                },
                finish_reason: Some(finish),
            }],
            usage: Some(oa::Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        }
    }

    #[test]
    fn tool_calls_finish_reason_maps_to_tool_use() {
        let names = ToolNameShortMap::default();
        let response = response_with(
            None,
            Some(vec![oa::ToolCall {
                id: "call_1".to_string(),
                call_type: "function".to_string(),
                function: oa::ToolCallFunction {
                    name: "lookup".to_string(),
                    arguments: "{\"q\":1}".to_string(),
                },
            }]),
            oa::FinishReason::ToolCalls,
        );
        let converted = convert(response, &names);
        assert_eq!(converted.stop_reason, Some(claude::StopReason::ToolUse));
        assert!(matches!(converted.content[0], claude::ContentBlock::ToolUse { .. }));
    }

    #[test]
    fn malformed_tool_arguments_fall_back_to_empty_object() {
        let names = ToolNameShortMap::default();
        let response = response_with(
            None,
            Some(vec![oa::ToolCall {
                id: "call_1".to_string(),
                call_type: "function".to_string(),
                function: oa::ToolCallFunction {
                    name: "lookup".to_string(),
                    arguments: "not json".to_string(),
                },
            }]),
            oa::FinishReason::ToolCalls,
        );
        let converted = convert(response, &names);
        match &converted.content[0] {
            claude::ContentBlock::ToolUse { input, .. } => {
                assert_eq!(*input, serde_json::Value::Object(Default::default()));
            }
            _ => panic!("expected tool_use block"),
        }
    }

    #[test]
    fn stop_and_length_finish_reasons_map_correctly() {
        let names = ToolNameShortMap::default();
        let stop = convert(response_with(Some("hi"), None, oa::FinishReason::Stop), &names);
        assert_eq!(stop.stop_reason, Some(claude::StopReason::EndTurn));
        let length = convert(response_with(Some("hi"), None, oa::FinishReason::Length), &names);
        assert_eq!(length.stop_reason, Some(claude::StopReason::MaxTokens));
    }
}
