//! Unary half of the function-call middleware. Applies the same XML
//! parser [`stream`](super::stream) drives per-chunk to a complete,
//! non-streamed response in one pass.

use gproxy_protocol::openai_chat::{ChatCompletionResponse, FinishReason, ToolCall, ToolCallFunction};
use rand::Rng;
use rand::distr::Alphanumeric;

use super::diagnostic::looks_like_unparsed_tool_intent;
use super::xml::parse_function_calls_xml;

/// Rewrites every choice whose message content contains a parseable
/// function-call block: the XML is stripped out of `content`,
/// `message.tool_calls` is populated, and `finish_reason` becomes
/// `tool_calls`. Choices with no parseable block are left untouched.
pub fn apply_unary_response(response: &mut ChatCompletionResponse, trigger: Option<&str>) {
    for choice in &mut response.choices {
        let Some(content) = choice.message.content.as_deref() else {
            continue;
        };
        let calls = parse_function_calls_xml(content, trigger);
        if calls.is_empty() {
            if looks_like_unparsed_tool_intent(content) {
                tracing::debug!(
                    event = "function_call_intent_unparsed",
                    "assistant message suggested a tool call but no XML was found"
                );
            }
            continue;
        }

        let run_id = random_suffix();
        let tool_calls: Vec<ToolCall> = calls
            .into_iter()
            .enumerate()
            .map(|(i, call)| ToolCall {
                id: format!("call_{run_id}_{i}"),
                call_type: "function".to_string(),
                function: ToolCallFunction {
                    name: call.name,
                    arguments: call.arguments.to_string(),
                },
            })
            .collect();

        choice.message.content = None;
        choice.message.tool_calls = Some(tool_calls);
        choice.finish_reason = Some(FinishReason::ToolCalls);
    }
}

fn random_suffix() -> String {
    rand::rng().sample_iter(&Alphanumeric).take(8).map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gproxy_protocol::openai_chat::{Choice, Message, Role};

    fn response_with(content: &str) -> ChatCompletionResponse {
        ChatCompletionResponse {
            id: "r".into(),
            model: "m".into(),
            choices: vec![Choice {
                index: 0,
                message: Message {
                    role: Role::Assistant,
                    content: Some(content.to_string()),
                    tool_calls: None,
                    tool_call_id: None,
                    name: None,
                },
                finish_reason: Some(FinishReason::Stop),
            }],
            usage: None,
        }
    }

    #[test]
    fn rewrites_content_into_tool_calls() {
        let mut response = response_with(
            "<function_calls><function_call><invocation><name>lookup</name><parameters><q>x</q></parameters></invocation></function_call></function_calls>",
        );
        apply_unary_response(&mut response, None);
        let choice = &response.choices[0];
        assert!(choice.message.content.is_none());
        let tool_calls = choice.message.tool_calls.as_ref().unwrap();
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].function.name, "lookup");
        assert_eq!(choice.finish_reason, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn plain_text_response_is_untouched() {
        let mut response = response_with("just a normal answer");
        apply_unary_response(&mut response, None);
        let choice = &response.choices[0];
        assert_eq!(choice.message.content.as_deref(), Some("just a normal answer"));
        assert!(choice.message.tool_calls.is_none());
        assert_eq!(choice.finish_reason, Some(FinishReason::Stop));
    }
}
