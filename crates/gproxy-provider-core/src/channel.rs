//! Per-channel-kind strategy (glossary: "Channel handler"). One
//! implementation per `ChannelKind`, injecting provider-specific auth and
//! applying model redirection; concrete implementations live in
//! `gproxy-provider-impl`.

use bytes::Bytes;
use http::{HeaderMap, Method};

use crate::group::{Group, Upstream};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("no upstream configured for group")]
    NoUpstream,
    #[error("invalid key for channel: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Clone)]
pub struct SelectedUpstream {
    pub upstream: Upstream,
}

/// Strategy object per upstream dialect family (OpenAI, Codex, Gemini,
/// Anthropic). The Lifecycle Engine holds one `Arc<dyn ChannelHandler>` per
/// `ChannelKind` and never branches on the kind itself.
pub trait ChannelHandler: Send + Sync {
    /// Weighted pick among the group's configured upstream base URLs.
    fn select_upstream(&self, group: &Group) -> Result<SelectedUpstream, ChannelError>;

    /// Inject provider-specific auth (e.g. `Authorization: Bearer <key>`)
    /// into the outbound header map. Client auth has already been stripped
    /// by the time this runs.
    fn inject_auth(&self, headers: &mut HeaderMap, key_secret: &str);

    /// Rewrite `model` in the outbound JSON body per the group's model
    /// mapping, if the channel requires body-level redirection rather than
    /// path-level.
    fn apply_model_redirect(&self, body: &Bytes, group: &Group) -> Bytes;

    /// Best-effort extraction of the `model` field from a request body, for
    /// logging.
    fn extract_model(&self, body: &Bytes) -> Option<String>;

    fn is_stream_request(&self, body: &Bytes) -> bool;

    fn method_for(&self, path: &str) -> Method {
        let _ = path;
        Method::POST
    }
}
