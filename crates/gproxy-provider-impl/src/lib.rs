//! Built-in `ChannelHandler` implementations, one per dialect the gateway
//! natively speaks to: Anthropic, OpenAI-Chat, Codex-Responses, Gemini.
//!
//! This crate performs no network IO of its own beyond the shared
//! `wreq::Client` dispatch helper in [`client`] — building upstream
//! requests (auth headers, model redirection, upstream selection) is pure.

pub mod auth_extractor;
pub mod channels;
pub mod client;
pub mod registry;

pub use registry::{ChannelRegistry, builtin_channel_registry};
