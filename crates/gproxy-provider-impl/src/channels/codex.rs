use bytes::Bytes;
use gproxy_provider_core::{ChannelError, ChannelHandler, Group, SelectedUpstream};
use http::{HeaderMap, Method};

use super::{body_requests_stream, extract_model_field, redirect_model_field, select_weighted};
use crate::auth_extractor::set_bearer;

/// Codex `/v1/responses` upstreams. Same bearer auth as OpenAI-Chat but a
/// distinct channel so the Lifecycle Engine never has to special-case the
/// path by string comparison.
pub struct CodexChannelHandler;

impl ChannelHandler for CodexChannelHandler {
    fn select_upstream(&self, group: &Group) -> Result<SelectedUpstream, ChannelError> {
        select_weighted(group)
    }

    fn inject_auth(&self, headers: &mut HeaderMap, key_secret: &str) {
        set_bearer(headers, key_secret);
    }

    fn apply_model_redirect(&self, body: &Bytes, group: &Group) -> Bytes {
        redirect_model_field(body, group)
    }

    fn extract_model(&self, body: &Bytes) -> Option<String> {
        extract_model_field(body)
    }

    fn is_stream_request(&self, body: &Bytes) -> bool {
        body_requests_stream(body)
    }

    fn method_for(&self, _path: &str) -> Method {
        Method::POST
    }
}
