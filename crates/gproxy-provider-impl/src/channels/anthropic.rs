use bytes::Bytes;
use gproxy_provider_core::{ChannelError, ChannelHandler, Group, SelectedUpstream};
use http::HeaderMap;

use super::{body_requests_stream, extract_model_field, redirect_model_field, select_weighted};
use crate::auth_extractor::set_api_key_header;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Native Claude `/v1/messages` upstreams: `x-api-key` auth plus the
/// fixed `anthropic-version` header every upstream expects.
pub struct AnthropicChannelHandler;

impl ChannelHandler for AnthropicChannelHandler {
    fn select_upstream(&self, group: &Group) -> Result<SelectedUpstream, ChannelError> {
        select_weighted(group)
    }

    fn inject_auth(&self, headers: &mut HeaderMap, key_secret: &str) {
        set_api_key_header(headers, "x-api-key", key_secret);
        set_api_key_header(headers, "anthropic-version", ANTHROPIC_VERSION);
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
    fn injects_api_key_and_version_headers() {
        let mut headers = HeaderMap::new();
        AnthropicChannelHandler.inject_auth(&mut headers, "sk-ant-test");
        assert_eq!(headers.get("x-api-key").unwrap(), "sk-ant-test");
        assert_eq!(headers.get("anthropic-version").unwrap(), ANTHROPIC_VERSION);
    }
}
