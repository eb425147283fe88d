use bytes::Bytes;
use gproxy_provider_core::{ChannelError, ChannelHandler, Group, SelectedUpstream};
use http::HeaderMap;

use super::{extract_model_field, redirect_model_field, select_weighted};
use crate::auth_extractor::set_api_key_header;

/// Gemini `:generateContent` / `:streamGenerateContent` upstreams: auth via
/// `x-goog-api-key` rather than `Authorization`, and streaming is chosen by
/// the request path's method suffix rather than a body flag.
pub struct GeminiChannelHandler;

impl ChannelHandler for GeminiChannelHandler {
    fn select_upstream(&self, group: &Group) -> Result<SelectedUpstream, ChannelError> {
        select_weighted(group)
    }

    fn inject_auth(&self, headers: &mut HeaderMap, key_secret: &str) {
        set_api_key_header(headers, "x-goog-api-key", key_secret);
    }

    fn apply_model_redirect(&self, body: &Bytes, group: &Group) -> Bytes {
        redirect_model_field(body, group)
    }

    fn extract_model(&self, body: &Bytes) -> Option<String> {
        extract_model_field(body)
    }

    fn is_stream_request(&self, _body: &Bytes) -> bool {
        false
    }
}
