//! Gemini `GenerateContentResponse` -> Claude response, unary.

use gproxy_protocol::claude;
use gproxy_protocol::gemini as g;
use gproxy_provider_core::ToolNameShortMap;

use crate::toolargs;

/// Gemini has no call-id concept; synthesize one from the candidate's part
/// position so a later `tool_result` has something stable to reference.
fn synthetic_call_id(part_index: usize) -> String {
    format!("call_{part_index}")
}

pub fn convert(response: g::GenerateContentResponse, names: &ToolNameShortMap) -> claude::CreateMessageResponse {
    let candidate = response.candidates.into_iter().next();
    let mut content = Vec::new();
    let mut any_tool_use = false;
    let mut finish_reason = None;

    if let Some(candidate) = candidate {
        finish_reason = candidate.finish_reason;
        // Consecutive `thought: true` text parts fold into a single Claude
        // thinking block; consecutive plain text parts likewise fold into
        // one text block, matching how Gemini actually chunks a turn.
        let mut thinking_buf = String::new();
        let mut text_buf = String::new();

        let flush_thinking = |buf: &mut String, out: &mut Vec<claude::ContentBlock>| {
            if !buf.is_empty() {
                out.push(claude::ContentBlock::Thinking {
                    thinking: std::mem::take(buf),
                    signature: None,
                });
            }
        };
        let flush_text = |buf: &mut String, out: &mut Vec<claude::ContentBlock>| {
            if !buf.is_empty() {
                out.push(claude::ContentBlock::Text { text: std::mem::take(buf) });
            }
        };

        for (index, part) in candidate.content.parts.into_iter().enumerate() {
            if let Some(call) = part.function_call {
                flush_thinking(&mut thinking_buf, &mut content);
                flush_text(&mut text_buf, &mut content);
                any_tool_use = true;
                let name = names.restore(&call.name);
                let mut input = serde_json::Value::Object(call.args);
                toolargs::apply_by_tool_name(&name, &mut input);
                content.push(claude::ContentBlock::ToolUse {
                    id: synthetic_call_id(index),
                    name,
                    input,
                });
                continue;
            }

            let Some(text) = part.text else { continue };
            if text.is_empty() {
                continue;
            }
            if part.thought == Some(true) {
                flush_text(&mut text_buf, &mut content);
                thinking_buf.push_str(&text);
            } else {
                flush_thinking(&mut thinking_buf, &mut content);
                text_buf.push_str(&text);
            }
        }
        flush_thinking(&mut thinking_buf, &mut content);
        flush_text(&mut text_buf, &mut content);
    }

    let stop_reason = if any_tool_use {
        claude::StopReason::ToolUse
    } else {
        match finish_reason {
            Some(g::FinishReason::MaxTokens) => claude::StopReason::MaxTokens,
            _ => claude::StopReason::EndTurn,
        }
    };

    let mut message = claude::CreateMessageResponse::new(String::new(), String::new());
    message.content = content;
    message.stop_reason = Some(stop_reason);
    message.usage = claude::Usage {
        input_tokens: response.usage_metadata.prompt_token_count,
        output_tokens: response.usage_metadata.candidates_token_count,
        cache_creation_input_tokens: None,
        cache_read_input_tokens: None,
    };
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with(parts: Vec<g::Part>, finish_reason: Option<g::FinishReason>) -> g::GenerateContentResponse {
        g::GenerateContentResponse {
            candidates: vec![g::Candidate {
                content: g::Content { role: Some(g::Role::Model), parts },
                finish_reason,
            }],
            usage_metadata: g::UsageMetadata {
                prompt_token_count: 10,
                candidates_token_count: 5,
                total_token_count: 15,
            },
        }
    }

    #[test]
    fn consecutive_thought_parts_merge_into_one_thinking_block() {
        let names = ToolNameShortMap::default();
        let response = response_with(
            vec![
                g::Part { text: Some("step one. ".to_string()), thought: Some(true), ..Default::default() },
                g::Part { text: Some("step two.".to_string()), thought: Some(true), ..Default::default() },
                g::Part { text: Some("answer".to_string()), thought: None, ..Default::default() },
            ],
            Some(g::FinishReason::Stop),
        );
        let converted = convert(response, &names);
        assert_eq!(converted.content.len(), 2);
        match &converted.content[0] {
            claude::ContentBlock::Thinking { thinking, .. } => {
                assert_eq!(thinking, "step one. step two.");
            }
            _ => panic!("expected thinking block"),
        }
        match &converted.content[1] {
            claude::ContentBlock::Text { text } => assert_eq!(text, "answer"),
            _ => panic!("expected text block"),
        }
    }

    #[test]
    fn function_call_restores_name_and_gets_synthetic_id() {
        let long = "read_file_with_a_very_long_name_exceeding_the_sixty_four_character_tool_name_limit_here";
        let names = ToolNameShortMap::build([long]);
        let mut args = serde_json::Map::new();
        args.insert("q".to_string(), serde_json::json!(1));
        let response = response_with(
            vec![g::Part {
                function_call: Some(g::FunctionCall { name: names.shorten(long), args }),
                ..Default::default()
            }],
            None,
        );
        let converted = convert(response, &names);
        match &converted.content[0] {
            claude::ContentBlock::ToolUse { id, name, .. } => {
                assert_eq!(id, "call_0");
                assert_eq!(name, long);
            }
            _ => panic!("expected tool_use block"),
        }
        assert_eq!(converted.stop_reason, Some(claude::StopReason::ToolUse));
    }

    #[test]
    fn max_tokens_finish_reason_is_propagated_when_no_tool_use() {
        let names = ToolNameShortMap::default();
        let response = response_with(
            vec![g::Part { text: Some("cut off".to_string()), ..Default::default() }],
            Some(g::FinishReason::MaxTokens),
        );
        let converted = convert(response, &names);
        assert_eq!(converted.stop_reason, Some(claude::StopReason::MaxTokens));
    }
}
