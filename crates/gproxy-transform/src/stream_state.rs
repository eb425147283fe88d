//! Block-state discipline shared by every streaming transcoder.
//!
//! Claude's SSE contract requires strict pairing: every
//! `content_block_start(i)` is followed by zero or more
//! `content_block_delta(i)` and exactly one `content_block_stop(i)`, and
//! `i` is strictly monotonic across the message. Rather than sprinkle
//! `if open_block ==...` checks across each transcoder's event handler,
//! the open/close transitions live here as a small table-driven state
//! machine; callers describe *what* block they want open, this module
//! decides *whether* a close/open pair is actually needed.

use gproxy_protocol::claude::{
    ContentBlockStart, ContentDelta, CreateMessageResponse, MessageDeltaPayload, StopReason,
    StreamEvent, Usage,
};

/// Claude stream events as (event, content) pairs ready for SSE encoding.
pub type EmittedEvent = StreamEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenBlock {
    None,
    Text,
    Thinking,
    Tool,
}

/// Owns the per-stream state described in the documented contract ("Stream-state"): the
/// monotonic content-block index, the currently-open block type,
/// accumulating buffers, and the `final_sent` latch that makes terminal
/// events idempotent.
pub struct BlockStateMachine {
    next_index: u32,
    open: OpenBlock,
    open_index: u32,
    message_started: bool,
    final_sent: bool,
    any_tool_emitted: bool,
    message_id: String,
    model: String,
}

impl BlockStateMachine {
    pub fn new(message_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            next_index: 0,
            open: OpenBlock::None,
            open_index: 0,
            message_started: false,
            final_sent: false,
            any_tool_emitted: false,
            message_id: message_id.into(),
            model: model.into(),
        }
    }

    pub fn final_sent(&self) -> bool {
        self.final_sent
    }

    /// `message_start` exactly once at the beginning of the stream.
    pub fn message_start(&mut self) -> Option<EmittedEvent> {
        if self.message_started {
            return None;
        }
        self.message_started = true;
        Some(StreamEvent::MessageStart {
            message: CreateMessageResponse::new(self.message_id.clone(), self.model.clone()),
        })
    }

    fn close_open(&mut self, out: &mut Vec<EmittedEvent>) {
        if self.open != OpenBlock::None {
            out.push(StreamEvent::ContentBlockStop {
                index: self.open_index,
            });
            self.open = OpenBlock::None;
        }
    }

    fn open_new(&mut self, kind: OpenBlock, start: ContentBlockStart, out: &mut Vec<EmittedEvent>) {
        self.close_open(out);
        let index = self.next_index;
        self.next_index += 1;
        self.open = kind;
        self.open_index = index;
        if kind == OpenBlock::Tool {
            self.any_tool_emitted = true;
        }
        out.push(StreamEvent::ContentBlockStart {
            index,
            content_block: start,
        });
    }

    /// Ensure a text block is open, opening one (closing whatever was open
    /// before) if necessary, then append the delta.
    pub fn text_delta(&mut self, text: String) -> Vec<EmittedEvent> {
        let mut out = Vec::new();
        if self.open != OpenBlock::Text {
            self.open_new(
                OpenBlock::Text,
                ContentBlockStart::Text {
                    text: String::new(),
                },
                &mut out,
            );
        }
        out.push(StreamEvent::ContentBlockDelta {
            index: self.open_index,
            delta: ContentDelta::TextDelta { text },
        });
        out
    }

    pub fn thinking_delta(&mut self, thinking: String) -> Vec<EmittedEvent> {
        let mut out = Vec::new();
        if self.open != OpenBlock::Thinking {
            self.open_new(
                OpenBlock::Thinking,
                ContentBlockStart::Thinking {
                    thinking: String::new(),
                },
                &mut out,
            );
        }
        out.push(StreamEvent::ContentBlockDelta {
            index: self.open_index,
            delta: ContentDelta::ThinkingDelta { thinking },
        });
        out
    }

    /// Opens a new tool_use block unconditionally (each tool call is its
    /// own block; callers close the previous block by virtue of opening
    /// this one).
    pub fn open_tool_use(&mut self, id: String, name: String) -> Vec<EmittedEvent> {
        let mut out = Vec::new();
        self.open_new(
            OpenBlock::Tool,
            ContentBlockStart::ToolUse {
                id,
                name,
                input: serde_json::Value::Object(Default::default()),
            },
            &mut out,
        );
        out
    }

    /// Ensures a tool_use block is the currently open one, opening a
    /// nameless one if nothing is open yet, without emitting any delta.
    /// For callers that buffer tool-call argument fragments upstream and
    /// want to flush them as one cleaned `input_json_delta` later, while
    /// still keeping the block-open/close bookkeeping live as fragments
    /// arrive.
    pub fn ensure_tool_open(&mut self, id: String, name: String) -> Vec<EmittedEvent> {
        if self.open == OpenBlock::Tool {
            return Vec::new();
        }
        let mut out = Vec::new();
        self.open_new(
            OpenBlock::Tool,
            ContentBlockStart::ToolUse {
                id,
                name,
                input: serde_json::Value::Object(Default::default()),
            },
            &mut out,
        );
        out
    }

    pub fn tool_input_delta(&mut self, partial_json: String) -> Vec<EmittedEvent> {
        let mut out = Vec::new();
        if self.open != OpenBlock::Tool {
            // Out-of-order upstream event: auto-open a nameless tool block
            // rather than drop the delta.
            self.open_new(
                OpenBlock::Tool,
                ContentBlockStart::ToolUse {
                    id: format!("call_{}", self.open_index),
                    name: String::new(),
                    input: serde_json::Value::Object(Default::default()),
                },
                &mut out,
            );
        }
        out.push(StreamEvent::ContentBlockDelta {
            index: self.open_index,
            delta: ContentDelta::InputJsonDelta { partial_json },
        });
        out
    }

    pub fn close_current(&mut self) -> Vec<EmittedEvent> {
        let mut out = Vec::new();
        self.close_open(&mut out);
        out
    }

    /// Idempotent terminal sequence: close any open block, emit
    /// `message_delta` with usage, then `message_stop`. Subsequent calls
    /// are no-ops (the `final_sent` latch).
    pub fn finish(&mut self, usage: Usage) -> Vec<EmittedEvent> {
        if self.final_sent {
            return Vec::new();
        }
        self.final_sent = true;
        let mut out = Vec::new();
        self.close_open(&mut out);
        let stop_reason = if self.any_tool_emitted {
            StopReason::ToolUse
        } else {
            StopReason::EndTurn
        };
        out.push(StreamEvent::MessageDelta {
            delta: MessageDeltaPayload {
                stop_reason: Some(stop_reason),
                stop_sequence: None,
            },
            usage,
        });
        out.push(StreamEvent::MessageStop);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(event: &EmittedEvent) -> Option<u32> {
        match event {
            StreamEvent::ContentBlockStart { index, .. } => Some(*index),
            StreamEvent::ContentBlockDelta { index, .. } => Some(*index),
            StreamEvent::ContentBlockStop { index } => Some(*index),
            _ => None,
        }
    }

    #[test]
    fn block_pairing_is_monotonic_and_closed() {
        let mut sm = BlockStateMachine::new("msg_1", "claude-x");
        let mut events = Vec::new();
        events.extend(sm.message_start());
        events.extend(sm.text_delta("hi".into()));
        events.extend(sm.open_tool_use("call_1".into(), "lookup".into()));
        events.extend(sm.tool_input_delta("{}".into()));
        events.extend(sm.finish(Usage::default()));

        let mut open_stack: Vec<u32> = Vec::new();
        let mut max_index_closed = -1i64;
        for event in &events {
            match event {
                StreamEvent::ContentBlockStart { index, .. } => {
                    assert!(*index as i64 > max_index_closed || open_stack.is_empty());
                    open_stack.push(*index);
                }
                StreamEvent::ContentBlockStop { index } => {
                    assert_eq!(open_stack.pop(), Some(*index));
                    max_index_closed = max_index_closed.max(*index as i64);
                }
                _ => {}
            }
        }
        assert!(open_stack.is_empty(), "every block must be closed");
        assert!(matches!(events.first(), Some(StreamEvent::MessageStart { .. })));
        assert!(matches!(events.last(), Some(StreamEvent::MessageStop)));

        let _ = index_of(&events[0]);
    }

    #[test]
    fn finish_is_idempotent() {
        let mut sm = BlockStateMachine::new("msg_1", "claude-x");
        sm.message_start();
        sm.text_delta("hi".into());
        let first = sm.finish(Usage::default());
        let second = sm.finish(Usage::default());
        assert!(!first.is_empty());
        assert!(second.is_empty());
    }

    #[test]
    fn opening_new_block_closes_previous_first() {
        let mut sm = BlockStateMachine::new("msg_1", "claude-x");
        sm.message_start();
        sm.text_delta("a".into());
        let events = sm.thinking_delta("b".into());
        assert!(matches!(events[0], StreamEvent::ContentBlockStop { index: 0 }));
        assert!(matches!(
            events[1],
            StreamEvent::ContentBlockStart { index: 1, .. }
        ));
    }
}
