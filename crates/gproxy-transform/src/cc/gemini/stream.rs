//! Gemini response -> Claude SSE, for clients that asked Gemini to stream.
//!
//! Gemini's `:streamGenerateContent` still returns one JSON document
//! (no server-sent chunking the gateway can forward incrementally), so
//! this transcoder reads the whole body to EOF and then replays
//! `candidates[0].content.parts` through the shared block-state machine
//! at a coarser granularity than the other dialects: one
//! `content_block_start` + a single `content_block_delta` + one
//! `content_block_stop` per part, rather than per-token deltas.

use gproxy_protocol::claude::{StreamEvent, Usage};
use gproxy_protocol::gemini as g;
use gproxy_provider_core::ToolNameShortMap;

use crate::stream_state::BlockStateMachine;
use crate::toolargs;

pub struct GeminiStreamTranscoder {
    state: BlockStateMachine,
    names: ToolNameShortMap,
}

impl GeminiStreamTranscoder {
    pub fn new(message_id: impl Into<String>, model: impl Into<String>, names: ToolNameShortMap) -> Self {
        Self {
            state: BlockStateMachine::new(message_id, model),
            names,
        }
    }

    /// Consumes the single decoded response document and emits the full
    /// event sequence in one call; there is no further `finish()` step
    /// because Gemini never delivers this incrementally.
    pub fn replay(&mut self, response: g::GenerateContentResponse) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        out.extend(self.state.message_start());

        let mut any_tool_use = false;
        if let Some(candidate) = response.candidates.into_iter().next() {
            for (index, part) in candidate.content.parts.into_iter().enumerate() {
                if let Some(call) = part.function_call {
                    any_tool_use = true;
                    let name = self.names.restore(&call.name);
                    let mut input = serde_json::Value::Object(call.args);
                    toolargs::apply_by_tool_name(&name, &mut input);
                    out.extend(self.state.open_tool_use(format!("call_{index}"), name));
                    out.extend(self.state.tool_input_delta(input.to_string()));
                    continue;
                }

                let Some(text) = part.text else { continue };
                if text.is_empty() {
                    continue;
                }
                if part.thought == Some(true) {
                    out.extend(self.state.thinking_delta(text));
                } else {
                    out.extend(self.state.text_delta(text));
                }
            }
        }
        let _ = any_tool_use; // stop reason is derived inside finish() from any_tool_emitted

        let usage = Usage {
            input_tokens: response.usage_metadata.prompt_token_count,
            output_tokens: response.usage_metadata.candidates_token_count,
            cache_creation_input_tokens: None,
            cache_read_input_tokens: None,
        };
        out.extend(self.state.finish(usage));
        out
    }
}
