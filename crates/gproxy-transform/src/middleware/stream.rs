//! Streaming half of the function-call middleware. Sits between an upstream OpenAI-Chat SSE stream and the
//! client: while the model's trigger-signal-prefixed XML block is being
//! emitted, its bytes are withheld from the forwarded stream and
//! accumulated into a bounded buffer; on the terminal chunk the buffer is
//! parsed into `tool_calls` and one synthetic chunk replaces whatever was
//! withheld.

use std::sync::LazyLock;

use gproxy_provider_core::TriggerSignal;
use gproxy_protocol::openai_chat::{
    ChatCompletionChunk, Delta, DeltaFunction, DeltaToolCall, FinishReason, StreamChoice,
};
use rand::Rng;
use rand::distr::Alphanumeric;
use regex::Regex;

use super::diagnostic::looks_like_unparsed_tool_intent;
use super::xml::parse_function_calls_xml;

/// Bounded accumulation buffer for the XML block.
const MAX_BUFFER_BYTES: usize = 256 * 1024;

/// The partial-tag sniff heuristic: a bare
/// `<` followed by a letter might be the start of a chunk-split XML tag.
/// Deliberately retained despite false-positiving on prose like `<img>`;
/// the cost of a false positive is withholding a few characters until the
/// next real tag closes.
static PARTIAL_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[A-Za-z]").unwrap());
const FUNCTION_CALLS_OPEN: &str = "<function_calls>";
const FUNCTION_CALLS_CLOSE: &str = "</function_calls>";

pub struct FunctionCallStreamFilter {
    trigger: Option<String>,
    buffer: String,
    inside: bool,
    overflow_warned: bool,
}

impl FunctionCallStreamFilter {
    pub fn new(trigger: Option<TriggerSignal>) -> Self {
        Self {
            trigger: trigger.map(|t| t.as_str().to_string()),
            buffer: String::new(),
            inside: false,
            overflow_warned: false,
        }
    }

    /// Filters one upstream chunk. Returns `Some(chunk)` (with `content`
    /// possibly trimmed down to its non-XML portion) to forward as-is, or
    /// `None` if the entire chunk was withheld.
    pub fn on_chunk(&mut self, mut chunk: ChatCompletionChunk) -> Option<ChatCompletionChunk> {
        let mut keep = false;
        for choice in &mut chunk.choices {
            if choice.delta.tool_calls.is_some() {
                keep = true;
                continue;
            }
            match choice.delta.content.take() {
                Some(content) => match self.filter_content(&content) {
                    Some(visible) if !visible.is_empty() => {
                        choice.delta.content = Some(visible);
                        keep = true;
                    }
                    Some(_) => {}
                    None => {}
                },
                None => keep = true,
            }
        }
        keep.then_some(chunk)
    }

    fn filter_content(&mut self, content: &str) -> Option<String> {
        if !self.inside {
            match self.find_entry_point(content) {
                Some(idx) => {
                    let visible = content[..idx].to_string();
                    self.enter_buffer(&content[idx..]);
                    Some(visible)
                }
                None => Some(content.to_string()),
            }
        } else if let Some(rel) = content.find(FUNCTION_CALLS_CLOSE) {
            let close_end = rel + FUNCTION_CALLS_CLOSE.len();
            self.enter_buffer(&content[..close_end]);
            self.inside = false;
            Some(content[close_end..].to_string())
        } else {
            self.enter_buffer(content);
            None
        }
    }

    /// Earliest index at which `content` enters the XML block: the
    /// trigger signal, a literal `<function_calls>`, or the partial-tag
    /// heuristic, whichever occurs first.
    fn find_entry_point(&self, content: &str) -> Option<usize> {
        let mut idx = None;
        let mut consider = |i: usize| idx = Some(idx.map_or(i, |cur: usize| cur.min(i)));

        if let Some(trigger) = &self.trigger {
            if let Some(i) = content.find(trigger.as_str()) {
                consider(i);
            }
        }
        if let Some(i) = content.find(FUNCTION_CALLS_OPEN) {
            consider(i);
        }
        if let Some(m) = PARTIAL_TAG_RE.find(content) {
            consider(m.start());
        }
        idx
    }

    fn enter_buffer(&mut self, s: &str) {
        self.inside = true;
        let remaining = MAX_BUFFER_BYTES.saturating_sub(self.buffer.len());
        if s.len() > remaining {
            self.buffer.push_str(truncate_at_char_boundary(s, remaining));
            if !self.overflow_warned {
                tracing::warn!(
                    event = "function_call_buffer_overflow",
                    limit_bytes = MAX_BUFFER_BYTES,
                    "function-call XML buffer exceeded bound; truncating"
                );
                self.overflow_warned = true;
            }
        } else {
            self.buffer.push_str(s);
        }
    }

    /// Parses the accumulated buffer and builds the terminal
    /// `finish_reason: "tool_calls"` chunk. Returns
    /// `None` if nothing that looked like a tool call was ever buffered.
    pub fn finish(&mut self, id: impl Into<String>, model: impl Into<String>) -> Option<ChatCompletionChunk> {
        if self.buffer.trim().is_empty() {
            return None;
        }
        let calls = parse_function_calls_xml(&self.buffer, self.trigger.as_deref());
        if calls.is_empty() {
            if looks_like_unparsed_tool_intent(&self.buffer) {
                tracing::debug!(
                    event = "function_call_intent_unparsed",
                    "assistant output suggested a tool call but no XML was found"
                );
            }
            return None;
        }

        let run_id = random_suffix();
        let tool_calls: Vec<DeltaToolCall> = calls
            .into_iter()
            .enumerate()
            .map(|(i, call)| DeltaToolCall {
                index: i as u32,
                id: Some(format!("call_{run_id}_{i}")),
                call_type: Some("function".to_string()),
                function: Some(DeltaFunction {
                    name: Some(call.name),
                    arguments: Some(call.arguments.to_string()),
                }),
            })
            .collect();

        Some(ChatCompletionChunk {
            id: id.into(),
            model: model.into(),
            choices: vec![StreamChoice {
                index: 0,
                delta: Delta {
                    role: None,
                    content: None,
                    tool_calls: Some(tool_calls),
                },
                finish_reason: Some(FinishReason::ToolCalls),
            }],
            usage: None,
        })
    }
}

fn random_suffix() -> String {
    rand::rng().sample_iter(&Alphanumeric).take(8).map(char::from).collect()
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    let mut end = max_bytes.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use gproxy_protocol::openai_chat::{Role, StreamChoice};

    fn text_chunk(content: &str) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: "c".into(),
            model: "m".into(),
            choices: vec![StreamChoice {
                index: 0,
                delta: Delta {
                    role: Some(Role::Assistant),
                    content: Some(content.to_string()),
                    tool_calls: None,
                },
                finish_reason: None,
            }],
            usage: None,
        }
    }

    #[test]
    fn forwards_plain_text_untouched() {
        let mut filter = FunctionCallStreamFilter::new(None);
        let out = filter.on_chunk(text_chunk("hello there")).unwrap();
        assert_eq!(out.choices[0].delta.content.as_deref(), Some("hello there"));
    }

    #[test]
    fn withholds_content_after_trigger_and_emits_tool_calls_on_finish() {
        let trigger = TriggerSignal::generate();
        let mut filter = FunctionCallStreamFilter::new(Some(trigger.clone()));

        let first = filter.on_chunk(text_chunk(&format!("{}", trigger.as_str())));
        assert!(first.is_none() || first.unwrap().choices[0].delta.content.as_deref() == Some(""));

        let second = filter.on_chunk(text_chunk(
            "<function_calls><function_call><invocation><name>lookup</name><parameters><q>x</q></parameters></invocation></function_call></function_calls>",
        ));
        assert!(second.is_none());

        let finish = filter.finish("c", "m").expect("tool call expected");
        let tool_calls = finish.choices[0].delta.tool_calls.as_ref().unwrap();
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].function.as_ref().unwrap().name.as_deref(), Some("lookup"));
        assert_eq!(finish.choices[0].finish_reason, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn character_by_character_split_reproduces_same_tool_calls() {
        let xml = "<function_calls><function_call><invocation><name>lookup</name><parameters><q>x</q></parameters></invocation></function_call></function_calls>";
        let mut filter = FunctionCallStreamFilter::new(None);
        for ch in xml.chars() {
            filter.on_chunk(text_chunk(&ch.to_string()));
        }
        let finish = filter.finish("c", "m").expect("tool call expected");
        let tool_calls = finish.choices[0].delta.tool_calls.as_ref().unwrap();
        assert_eq!(tool_calls[0].function.as_ref().unwrap().name.as_deref(), Some("lookup"));
    }

    #[test]
    fn leading_text_before_trigger_is_forwarded() {
        let mut filter = FunctionCallStreamFilter::new(None);
        let out = filter
            .on_chunk(text_chunk("here's my answer <function_calls><function_call>"))
            .unwrap();
        assert_eq!(out.choices[0].delta.content.as_deref(), Some("here's my answer "));
    }

    #[test]
    fn no_xml_ever_seen_finish_returns_none() {
        let mut filter = FunctionCallStreamFilter::new(None);
        filter.on_chunk(text_chunk("just a normal reply"));
        assert!(filter.finish("c", "m").is_none());
    }
}
