//! Claude-compatibility glue: dispatches request/response/stream
//! conversion to the right dialect transcoder in `gproxy-transform` based
//! on a group's `ChannelKind`. The Anthropic channel needs no conversion —
//! a group pointed at an Anthropic-speaking upstream forwards the Claude
//! wire format unchanged.

use bytes::Bytes;
use gproxy_protocol::claude::{self, StreamEvent};
use gproxy_protocol::{codex as cx, gemini as g, openai_chat as oa};
use gproxy_provider_core::group::{ChannelKind, CodexInstructionsMode, Group};
use gproxy_provider_core::{ProxyError, ToolNameShortMap};
use gproxy_transform::cc::{codex, gemini, openai_chat};

/// Builds the tool-name shorten/restore map from a Claude request's own
/// `tools[]`, so both the request and response sides of a transcode agree
/// on upstream-facing names.
pub fn names_for(request: &claude::CreateMessageRequest) -> ToolNameShortMap {
    match &request.tools {
        Some(tools) => ToolNameShortMap::build(tools.iter().map(|t| t.name.clone())),
        None => ToolNameShortMap::default(),
    }
}

pub fn parse_claude_request(body: &[u8]) -> Result<claude::CreateMessageRequest, ProxyError> {
    serde_json::from_slice(body).map_err(|err| ProxyError::BadRequest(err.to_string()))
}

/// Converts a parsed Claude request into the upstream dialect's wire
/// bytes. `Anthropic` is the identity case and is handled by the caller
/// before reaching here.
pub fn build_upstream_body(
    channel: ChannelKind,
    request: &claude::CreateMessageRequest,
    group: &Group,
    names: &ToolNameShortMap,
) -> Result<Bytes, ProxyError> {
    let json = match channel {
        ChannelKind::OpenAI => {
            let converted = openai_chat::request_to_openai(request, names);
            serde_json::to_vec(&converted)
        }
        ChannelKind::Codex => {
            let options = codex::CodexRequestOptions {
                instructions_mode: group.config.codex_instructions_mode(),
                custom_instructions: group.config.codex_instructions(),
                thinking_model_override: group.config.thinking_model(),
                parallel_tool_calls_override: group.config.parallel_tool_calls(),
            };
            let converted = codex::request_to_codex(request, names, &options);
            serde_json::to_vec(&converted)
        }
        ChannelKind::Gemini => {
            let converted = gemini::request_to_gemini(request, names);
            serde_json::to_vec(&converted)
        }
        ChannelKind::Anthropic => serde_json::to_vec(request),
    };
    json.map(Bytes::from).map_err(|err| ProxyError::ConversionFailed(err.to_string()))
}

/// Converts a full (non-streaming) upstream response body into Claude
/// response bytes. `CodexInstructionsMode` and friends only matter on the
/// request side, so this only needs the channel and the name map.
pub fn unary_response_to_claude(channel: ChannelKind, body: &[u8], names: &ToolNameShortMap) -> Result<Bytes, ProxyError> {
    let message = match channel {
        ChannelKind::OpenAI => {
            let parsed: oa::ChatCompletionResponse =
                serde_json::from_slice(body).map_err(|err| ProxyError::ConversionFailed(err.to_string()))?;
            openai_chat::response_to_claude(parsed, names)
        }
        ChannelKind::Codex => {
            let parsed: cx::ResponseObject =
                serde_json::from_slice(body).map_err(|err| ProxyError::ConversionFailed(err.to_string()))?;
            codex::response_to_claude(parsed, names)
        }
        ChannelKind::Gemini => {
            let parsed: g::GenerateContentResponse =
                serde_json::from_slice(body).map_err(|err| ProxyError::ConversionFailed(err.to_string()))?;
            gemini::response_to_claude(parsed, names)
        }
        ChannelKind::Anthropic => {
            return Ok(Bytes::copy_from_slice(body));
        }
    };
    serde_json::to_vec(&message).map(Bytes::from).map_err(|err| ProxyError::ConversionFailed(err.to_string()))
}

/// Per-dialect streaming state. `Anthropic` carries none — its SSE bytes
/// pass through untouched.
pub enum StreamTranscoder {
    OpenAi(openai_chat::OpenAiChatStreamTranscoder),
    Codex(codex::CodexStreamTranscoder),
}

impl StreamTranscoder {
    pub fn new(channel: ChannelKind, message_id: impl Into<String>, model: impl Into<String>, names: ToolNameShortMap) -> Option<Self> {
        match channel {
            ChannelKind::OpenAI => Some(Self::OpenAi(openai_chat::OpenAiChatStreamTranscoder::new(message_id, model, names))),
            ChannelKind::Codex => Some(Self::Codex(codex::CodexStreamTranscoder::new(message_id, model, names))),
            ChannelKind::Gemini | ChannelKind::Anthropic => None,
        }
    }

    /// Feeds one decoded `data:` line. `[DONE]` is OpenAI-Chat's sentinel
    /// and never appears for Codex, whose terminal event is typed.
    pub fn on_sse_data(&mut self, data: &str) -> Vec<StreamEvent> {
        match self {
            Self::OpenAi(t) => {
                if data == "[DONE]" {
                    return Vec::new();
                }
                match serde_json::from_str::<oa::ChatCompletionChunk>(data) {
                    Ok(chunk) => t.on_chunk(chunk),
                    Err(_) => Vec::new(),
                }
            }
            Self::Codex(t) => match serde_json::from_str::<cx::ResponseStreamEvent>(data) {
                Ok(event) => t.on_event(event),
                Err(_) => Vec::new(),
            },
        }
    }

    /// Idempotent terminal sequence: closes any open block and emits
    /// `message_delta`/`message_stop`. Called on the dialect's own "stream
    /// done" sentinel (`[DONE]` for OpenAI-Chat) and unconditionally after
    /// the upstream reader reaches EOF, so a stream that never sends its
    /// own terminal event (or whose terminal event the caller never saw)
    /// still reaches the client with matching block-state discipline.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        match self {
            Self::OpenAi(t) => t.finish(),
            Self::Codex(t) => t.finish(0, 0),
        }
    }
}

/// Gemini never streams incrementally at this layer: the whole response
/// body is read, parsed once, and replayed through the block-state
/// machine in one shot.
pub fn gemini_replay(message_id: impl Into<String>, model: impl Into<String>, names: ToolNameShortMap, body: &[u8]) -> Result<Vec<StreamEvent>, ProxyError> {
    let parsed: g::GenerateContentResponse =
        serde_json::from_slice(body).map_err(|err| ProxyError::ConversionFailed(err.to_string()))?;
    let mut transcoder = gemini::GeminiStreamTranscoder::new(message_id, model, names);
    Ok(transcoder.replay(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_request() -> claude::CreateMessageRequest {
        claude::CreateMessageRequest {
            model: "claude-3-5-sonnet".to_string(),
            messages: vec![claude::Message { role: claude::Role::User, content: claude::MessageContent::Text("hi".to_string()) }],
            max_tokens: 16,
            system: None,
            tools: None,
            tool_choice: None,
            thinking: None,
            stream: None,
            temperature: None,
            top_p: None,
            stop_sequences: None,
        }
    }

    fn test_group(channel: ChannelKind) -> Group {
        Group {
            id: "g".to_string(),
            display_name: "g".to_string(),
            channel,
            kind: gproxy_provider_core::group::GroupKind::Standard,
            upstreams: vec![],
            enabled: true,
            effective: Default::default(),
            config: Default::default(),
            model_mapping: Default::default(),
            header_rules: vec![],
            sub_groups: None,
        }
    }

    #[test]
    fn anthropic_channel_round_trips_body_unchanged() {
        let request = basic_request();
        let names = names_for(&request);
        let body = build_upstream_body(ChannelKind::Anthropic, &request, &test_group(ChannelKind::Anthropic), &names).unwrap();
        let back: claude::CreateMessageRequest = serde_json::from_slice(&body).unwrap();
        assert_eq!(back.model, request.model);
    }

    #[test]
    fn openai_channel_produces_chat_completion_body() {
        let request = basic_request();
        let names = names_for(&request);
        let body = build_upstream_body(ChannelKind::OpenAI, &request, &test_group(ChannelKind::OpenAI), &names).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(value.get("messages").is_some());
    }

    #[test]
    fn openai_stream_transcoder_finish_closes_and_emits_terminal_events() {
        let mut transcoder =
            StreamTranscoder::new(ChannelKind::OpenAI, "msg_1", "gpt-4o", ToolNameShortMap::default()).unwrap();
        let opened = transcoder.on_sse_data(
            r#"{"id":"c","model":"gpt-4o","choices":[{"index":0,"delta":{"content":"hi"}}]}"#,
        );
        assert!(opened.iter().any(|e| matches!(e, StreamEvent::ContentBlockStart { .. })));

        let finished = transcoder.finish();
        assert!(
            finished.iter().any(|e| matches!(e, StreamEvent::ContentBlockStop { .. })),
            "finish must close the still-open text block"
        );
        assert!(finished.iter().any(|e| matches!(e, StreamEvent::MessageDelta { .. })));
        assert!(matches!(finished.last(), Some(StreamEvent::MessageStop)));

        // Idempotent: a second call (mirroring reader-EOF running after an
        // already-seen `[DONE]`) must not re-emit the terminal sequence.
        assert!(transcoder.finish().is_empty());
    }

    #[test]
    fn codex_stream_transcoder_finish_is_idempotent_after_typed_completion() {
        let mut transcoder =
            StreamTranscoder::new(ChannelKind::Codex, "msg_1", "gpt-5-codex", ToolNameShortMap::default()).unwrap();
        transcoder.on_sse_data(r#"{"type":"response.created","response":{"id":"r","model":"gpt-5-codex","output":[],"usage":{"input_tokens":0,"output_tokens":0}}}"#);
        let completed = transcoder.on_sse_data(
            r#"{"type":"response.completed","response":{"id":"r","model":"gpt-5-codex","output":[],"usage":{"input_tokens":3,"output_tokens":5}}}"#,
        );
        assert!(completed.iter().any(|e| matches!(e, StreamEvent::MessageStop)));

        // Calling the generic `finish()` after the typed terminal event
        // already ran (the reader-EOF fallback path) must be a no-op.
        assert!(transcoder.finish().is_empty());
    }
}
