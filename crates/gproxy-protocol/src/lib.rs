//! Wire-format types for the four client/upstream dialects this gateway
//! speaks: Claude (`/v1/messages`), OpenAI Chat (`/v1/chat/completions`),
//! Codex Responses (`/v1/responses`), and Gemini
//! (`:generateContent`/`:streamGenerateContent`).
//!
//! Each dialect is modeled as a tagged sum rather than an untyped
//! `serde_json::Value` tree wherever the wire format itself is tagged
//! (content blocks, stream events), so transcoders in `gproxy-transform`
//! are total pattern matches instead of defensive type assertions.

pub mod claude;
pub mod codex;
pub mod gemini;
pub mod openai_chat;
pub mod sse;

pub type JsonObject = serde_json::Map<String, serde_json::Value>;
