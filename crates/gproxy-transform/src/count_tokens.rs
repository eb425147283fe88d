//! `/v1/messages/count_tokens` short-circuit: the gateway answers this endpoint itself
//! instead of forwarding to an upstream, using a cheap heuristic estimator
//! rather than a real tokenizer.

use gproxy_protocol::claude::{ContentBlock, CountTokensRequest, CountTokensResponse, ToolResultContent};

/// Characters per token used by the heuristic estimator. Matches no
/// specific tokenizer; it is deliberately conservative (slightly
/// over-counts) so downstream `max_tokens` budgeting stays on the safe
/// side.
const CHARS_PER_TOKEN: f64 = 3.8;

fn estimate_text(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }
    ((text.chars().count() as f64 / CHARS_PER_TOKEN).ceil() as u32).max(1)
}

fn estimate_block(block: &ContentBlock) -> u32 {
    match block {
        ContentBlock::Text { text } => estimate_text(text),
        ContentBlock::Thinking { thinking, .. } => estimate_text(thinking),
        ContentBlock::ToolUse { name, input, .. } => {
            estimate_text(name) + estimate_text(&input.to_string())
        }
        ContentBlock::ToolResult { content, .. } => match content {
            Some(ToolResultContent::Text(t)) => estimate_text(t),
            Some(ToolResultContent::Blocks(blocks)) => {
                blocks.iter().map(estimate_block).sum()
            }
            None => 0,
        },
    }
}

/// Estimates `input_tokens` for a count-tokens request: system prompt +
/// every message's content blocks + tool definitions (name, description,
/// and a serialized approximation of the schema).
pub fn count_tokens(request: &CountTokensRequest) -> CountTokensResponse {
    let mut total = 0u32;

    if let Some(system) = &request.system {
        total += estimate_text(&system.clone().into_text());
    }

    for message in &request.messages {
        for block in message.content.clone().blocks() {
            total += estimate_block(&block);
        }
        // Per-message role/formatting overhead, mirroring real tokenizers'
        // fixed per-turn cost.
        total += 3;
    }

    if let Some(tools) = &request.tools {
        for tool in tools {
            total += estimate_text(&tool.name);
            if let Some(description) = &tool.description {
                total += estimate_text(description);
            }
            total += estimate_text(&serde_json::to_string(&tool.input_schema).unwrap_or_default());
        }
    }

    CountTokensResponse {
        input_tokens: total,
    }
}
