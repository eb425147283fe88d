//! Codex named-event SSE -> Claude SSE. Drives the shared [`crate::stream_state`] machine;
//! this module only decides *which* block kind an event implies and
//! forwards the corresponding calls.

use std::collections::HashMap;

use gproxy_protocol::claude::{StreamEvent, Usage};
use gproxy_protocol::codex::ResponseStreamEvent;
use gproxy_provider_core::ToolNameShortMap;

use crate::stream_state::BlockStateMachine;
use crate::toolargs;

pub struct CodexStreamTranscoder {
    state: BlockStateMachine,
    names: ToolNameShortMap,
    /// `output_index -> (claude tool_use id, restored name, accumulated raw
    /// argument fragments)`, populated on `OutputItemAdded` (or lazily on an
    /// out-of-order delta) and drained on `OutputItemDone`. Raw fragments
    /// are buffered here rather than forwarded as they arrive: the whole
    /// argument string is only parsed, cleaned (WebSearch empty-domain
    /// stripping, Windows-path escaping) and flushed as a single
    /// `input_json_delta` once `OutputItemDone` has the complete value, so
    /// the cleanup actually lands in what the client receives.
    open_function_calls: HashMap<u32, (String, String, String)>,
    usage: Usage,
}

impl CodexStreamTranscoder {
    pub fn new(message_id: impl Into<String>, model: impl Into<String>, names: ToolNameShortMap) -> Self {
        Self {
            state: BlockStateMachine::new(message_id, model),
            names,
            open_function_calls: HashMap::new(),
            usage: Usage::default(),
        }
    }

    pub fn final_sent(&self) -> bool {
        self.state.final_sent()
    }

    pub fn on_event(&mut self, event: ResponseStreamEvent) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        match event {
            ResponseStreamEvent::Created { response } => {
                let _ = response;
                out.extend(self.state.message_start());
            }
            ResponseStreamEvent::ReasoningSummaryPartAdded { .. } => {
                out.extend(self.state.close_current());
            }
            ResponseStreamEvent::ReasoningSummaryTextDelta { delta, .. } => {
                out.extend(self.state.message_start());
                out.extend(self.state.thinking_delta(delta));
            }
            ResponseStreamEvent::ReasoningSummaryPartDone { .. } => {
                out.extend(self.state.close_current());
            }
            ResponseStreamEvent::ReasoningTextDelta { delta, .. } => {
                out.extend(self.state.message_start());
                out.extend(self.state.thinking_delta(delta));
            }
            ResponseStreamEvent::ReasoningTextDone { .. } => {
                out.extend(self.state.close_current());
            }
            ResponseStreamEvent::OutputItemAdded { output_index, item } => {
                out.extend(self.state.message_start());
                if item.item_type == "function_call" {
                    out.extend(self.state.close_current());
                    let call_id = item.call_id.clone().unwrap_or_default();
                    let id = super::response::tool_use_id_from_call_id(&call_id);
                    let name = self.names.restore(item.name.as_deref().unwrap_or_default());
                    out.extend(self.state.open_tool_use(id.clone(), name.clone()));
                    self.open_function_calls.insert(output_index, (id, name, String::new()));
                } else {
                    out.extend(self.state.close_current());
                }
            }
            ResponseStreamEvent::ContentPartAdded { .. } => {
                out.extend(self.state.message_start());
                out.extend(self.state.close_current());
            }
            ResponseStreamEvent::OutputTextDelta { delta, .. } => {
                out.extend(self.state.message_start());
                out.extend(self.state.text_delta(delta));
            }
            ResponseStreamEvent::ContentPartDone { .. } => {
                out.extend(self.state.close_current());
            }
            ResponseStreamEvent::FunctionCallArgumentsDelta { output_index, delta } => {
                out.extend(self.state.message_start());
                // Buffered, not forwarded: the cleaned-up whole argument
                // string is flushed as one delta at `OutputItemDone`
                // instead, once WebSearch/Windows-path fixups can run on
                // it. Still opens the block eagerly so `close_current`
                // pairs correctly even if arguments never arrive split.
                let entry = self
                    .open_function_calls
                    .entry(output_index)
                    .or_insert_with(|| (format!("call_{output_index}"), String::new(), String::new()));
                entry.2.push_str(&delta);
                let (id, name) = (entry.0.clone(), entry.1.clone());
                out.extend(self.state.ensure_tool_open(id, name));
            }
            ResponseStreamEvent::OutputItemDone { output_index, item } => {
                if item.item_type == "function_call" {
                    if let Some((_, name, args)) = self.open_function_calls.remove(&output_index) {
                        let cleaned = match serde_json::from_str::<serde_json::Value>(&args) {
                            Ok(mut parsed) => {
                                toolargs::apply_by_tool_name(&name, &mut parsed);
                                parsed.to_string()
                            }
                            Err(_) => args,
                        };
                        out.extend(self.state.tool_input_delta(cleaned));
                    }
                }
                out.extend(self.state.close_current());
            }
            ResponseStreamEvent::Completed { response } | ResponseStreamEvent::Done { response } => {
                out.extend(self.finish(response.usage.input_tokens, response.usage.output_tokens));
            }
            ResponseStreamEvent::Unknown => {
                tracing::debug!("unrecognized codex stream event");
            }
        }
        out
    }

    /// Idempotent terminal sequence; also invoked directly on reader EOF
    /// without requiring a
    /// real event to have carried usage.
    pub fn finish(&mut self, input_tokens: u32, output_tokens: u32) -> Vec<StreamEvent> {
        if input_tokens > 0 || output_tokens > 0 {
            self.usage.input_tokens = input_tokens;
            self.usage.output_tokens = output_tokens;
        }
        self.state.finish(self.usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gproxy_protocol::codex::{OutputItem, ResponseObject, Usage as CxUsage};

    fn response(output_tokens: u32) -> ResponseObject {
        ResponseObject {
            id: "resp_1".to_string(),
            model: "gpt-5-codex".to_string(),
            output: vec![],
            usage: CxUsage {
                input_tokens: 10,
                output_tokens,
                total_tokens: None,
            },
        }
    }

    #[test]
    fn reasoning_deltas_open_and_close_a_thinking_block() {
        let mut transcoder = CodexStreamTranscoder::new("msg_1", "gpt-5-codex", ToolNameShortMap::default());
        transcoder.on_event(ResponseStreamEvent::Created { response: response(0) });
        transcoder.on_event(ResponseStreamEvent::ReasoningSummaryPartAdded { output_index: 0 });
        let events = transcoder.on_event(ResponseStreamEvent::ReasoningSummaryTextDelta {
            output_index: 0,
            delta: "thinking...".to_string(),
        });
        assert!(events.iter().any(|e| matches!(
            e,
            StreamEvent::ContentBlockStart {
                content_block: gproxy_protocol::claude::ContentBlockStart::Thinking { .. },
                    ..
            }
        )));
        let closed = transcoder.on_event(ResponseStreamEvent::ReasoningSummaryPartDone { output_index: 0 });
        assert!(matches!(closed[0], StreamEvent::ContentBlockStop { .. }));
    }

    #[test]
    fn function_call_restores_name_and_closes_on_done() {
        let long = "read_file_with_a_very_long_name_exceeding_the_sixty_four_character_tool_name_limit_for_providers";
        let names = ToolNameShortMap::build([long]);
        let short = names.shorten(long);
        let mut transcoder = CodexStreamTranscoder::new("msg_1", "gpt-5-codex", names);
        transcoder.on_event(ResponseStreamEvent::Created { response: response(0) });
        let added = transcoder.on_event(ResponseStreamEvent::OutputItemAdded {
            output_index: 0,
            item: OutputItem {
                item_type: "function_call".to_string(),
                id: Some("fc_abc".to_string()),
                call_id: Some("call_abc".to_string()),
                name: Some(short),
                arguments: None,
                content: None,
            },
        });
        assert!(added.iter().any(|e| matches!(
            e,
            StreamEvent::ContentBlockStart {
                content_block: gproxy_protocol::claude::ContentBlockStart::ToolUse { name, .. },
                    ..
            } if name == long
        )));
        transcoder.on_event(ResponseStreamEvent::FunctionCallArgumentsDelta {
            output_index: 0,
            delta: "{}".to_string(),
        });
        let done = transcoder.on_event(ResponseStreamEvent::OutputItemDone {
            output_index: 0,
            item: OutputItem {
                item_type: "function_call".to_string(),
                id: Some("fc_abc".to_string()),
                call_id: Some("call_abc".to_string()),
                name: None,
                arguments: Some("{}".to_string()),
                content: None,
            },
        });
        assert!(matches!(
            done[0],
            StreamEvent::ContentBlockDelta {
                delta: gproxy_protocol::claude::ContentDelta::InputJsonDelta { .. },
                ..
            }
        ), "cleaned arguments are flushed as one delta before the block closes");
        assert!(matches!(done[1], StreamEvent::ContentBlockStop { .. }));
    }

    #[test]
    fn output_item_done_cleans_buffered_arguments_before_flushing() {
        let mut transcoder = CodexStreamTranscoder::new("msg_1", "gpt-5-codex", ToolNameShortMap::default());
        transcoder.on_event(ResponseStreamEvent::Created { response: response(0) });
        transcoder.on_event(ResponseStreamEvent::OutputItemAdded {
            output_index: 0,
            item: OutputItem {
                item_type: "function_call".to_string(),
                id: Some("fc_1".to_string()),
                call_id: Some("call_1".to_string()),
                name: Some("WebSearch".to_string()),
                arguments: None,
                content: None,
            },
        });
        for fragment in ["{\"allowed_domains\":[],", "\"blocked_domains\":[],\"query\":\"x\"}"] {
            transcoder.on_event(ResponseStreamEvent::FunctionCallArgumentsDelta {
                output_index: 0,
                delta: fragment.to_string(),
            });
        }
        let done = transcoder.on_event(ResponseStreamEvent::OutputItemDone {
            output_index: 0,
            item: OutputItem {
                item_type: "function_call".to_string(),
                id: Some("fc_1".to_string()),
                call_id: Some("call_1".to_string()),
                name: None,
                arguments: None,
                content: None,
            },
        });
        let delta = done.iter().find_map(|e| match e {
            StreamEvent::ContentBlockDelta {
                delta: gproxy_protocol::claude::ContentDelta::InputJsonDelta { partial_json },
                ..
            } => Some(partial_json.clone()),
            _ => None,
        }).expect("flushed delta with cleaned arguments");
        let value: serde_json::Value = serde_json::from_str(&delta).unwrap();
        assert!(value.get("allowed_domains").is_none(), "empty WebSearch domain arrays are stripped");
        assert!(value.get("blocked_domains").is_none());
        assert_eq!(value["query"], "x");
    }

    #[test]
    fn completed_and_done_are_both_idempotent_terminal_events() {
        let mut transcoder = CodexStreamTranscoder::new("msg_1", "gpt-5-codex", ToolNameShortMap::default());
        transcoder.on_event(ResponseStreamEvent::Created { response: response(0) });
        let completed = transcoder.on_event(ResponseStreamEvent::Completed { response: response(7) });
        assert!(!completed.is_empty());
        let done = transcoder.on_event(ResponseStreamEvent::Done { response: response(7) });
        assert!(done.is_empty(), "final events must latch after the first terminal event");
    }
}
