//! OpenAI-Chat SSE -> Claude SSE. Drives the shared [`crate::stream_state`] machine so
//! block-pairing holds regardless of how OpenAI interleaves its deltas.

use gproxy_protocol::claude::{StreamEvent, Usage};
use gproxy_protocol::openai_chat as oa;
use gproxy_provider_core::ToolNameShortMap;

use crate::stream_state::BlockStateMachine;

pub struct OpenAiChatStreamTranscoder {
    state: BlockStateMachine,
    names: ToolNameShortMap,
    // OpenAI `tool_calls[].index` values already opened as Claude blocks;
    // the name arrives on the first delta, argument fragments follow.
    open_tool_calls: std::collections::HashSet<u32>,
    usage: Usage,
}

impl OpenAiChatStreamTranscoder {
    pub fn new(message_id: impl Into<String>, model: impl Into<String>, names: ToolNameShortMap) -> Self {
        Self {
            state: BlockStateMachine::new(message_id, model),
            names,
            open_tool_calls: std::collections::HashSet::new(),
            usage: Usage::default(),
        }
    }

    /// Processes one parsed `data:` line's JSON payload (the caller strips
    /// the `data: ` prefix and checks for the literal `[DONE]` sentinel
    /// before calling this).
    pub fn on_chunk(&mut self, chunk: oa::ChatCompletionChunk) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        out.extend(self.state.message_start());

        if let Some(usage) = chunk.usage {
            self.usage.input_tokens = usage.prompt_tokens;
            self.usage.output_tokens = usage.completion_tokens;
        }

        for choice in chunk.choices {
            if let Some(text) = choice.delta.content {
                if !text.is_empty() {
                    out.extend(self.state.text_delta(text));
                }
            }
            if let Some(tool_calls) = choice.delta.tool_calls {
                for call in tool_calls {
                    out.extend(self.on_tool_call_delta(call));
                }
            }
        }
        out
    }

    fn on_tool_call_delta(&mut self, call: oa::DeltaToolCall) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        let is_new = !self.open_tool_calls.contains(&call.index);
        if is_new {
            let id = call.id.clone().unwrap_or_else(|| format!("call_{}", call.index));
            let name = call
                .function
                .as_ref()
                .and_then(|f| f.name.clone())
                .unwrap_or_default();
            out.extend(self.state.open_tool_use(id, self.names.restore(&name)));
            self.open_tool_calls.insert(call.index);
        }
        if let Some(function) = call.function {
            if let Some(arguments) = function.arguments {
                if !arguments.is_empty() {
                    out.extend(self.state.tool_input_delta(arguments));
                }
            }
        }
        out
    }

    /// Terminal sequence, idempotent. Called on `[DONE]` or reader EOF.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        self.state.finish(self.usage)
    }
}
