use bytes::Bytes;
use gproxy_provider_core::{ChannelError, ChannelHandler, Group, SelectedUpstream};
use http::HeaderMap;

use super::{body_requests_stream, extract_model_field, redirect_model_field, select_weighted};
use crate::auth_extractor::set_bearer;

/// OpenAI-Chat-compatible upstreams (`/v1/chat/completions`, `/v1/models`):
/// standard `Authorization: Bearer` auth, model redirection in the JSON body.
pub struct OpenAiChannelHandler;

impl ChannelHandler for OpenAiChannelHandler {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injects_bearer_token() {
        let mut headers = HeaderMap::new();
        OpenAiChannelHandler.inject_auth(&mut headers, "sk-abc");
        assert_eq!(headers.get("Authorization").unwrap(), "Bearer sk-abc");
    }
}
