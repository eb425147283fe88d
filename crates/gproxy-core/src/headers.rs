//! Header rewriting applied at the edges of a proxied request: strip the
//! client's own auth before an upstream key is injected, apply a group's
//! configured header rules, and strip response headers that no longer
//! describe the body once it has been decoded or transcoded.

use gproxy_provider_core::group::HeaderRuleAction;
use gproxy_provider_core::HeaderRule;
use http::{HeaderMap, HeaderName, HeaderValue};

/// Headers a client might use to authenticate with the gateway itself.
/// These must never reach an upstream — the channel handler injects its
/// own key afterward.
const CLIENT_AUTH_HEADERS: &[&str] = &["authorization", "x-api-key", "x-goog-api-key", "proxy-authorization"];

/// Hop-by-hop / body-describing headers that become stale once a response
/// body has been decompressed, re-encoded, or transcoded.
const STALE_RESPONSE_HEADERS: &[&str] = &["content-encoding", "content-length", "etag", "transfer-encoding"];

pub fn strip_client_auth(headers: &mut HeaderMap) {
    for name in CLIENT_AUTH_HEADERS {
        headers.remove(*name);
    }
}

/// Strips headers that would leak the client's real origin to the upstream
/// (`X-Forwarded-For`, `Via`, ...), per the group's configured list.
pub fn strip_anonymization_headers(headers: &mut HeaderMap, configured: &[String]) {
    for name in configured {
        headers.remove(name.as_str());
    }
}

pub fn strip_stale_response_headers(headers: &mut HeaderMap) {
    for name in STALE_RESPONSE_HEADERS {
        headers.remove(*name);
    }
}

/// Applies a group's configured `Set`/`Remove` header rules, in order, to
/// an outbound request.
pub fn apply_header_rules(headers: &mut HeaderMap, rules: &[HeaderRule]) {
    for rule in rules {
        let Ok(name) = HeaderName::try_from(rule.name.as_str()) else { continue };
        match &rule.action {
            HeaderRuleAction::Remove => {
                headers.remove(&name);
            }
            HeaderRuleAction::Set(value) => {
                if let Ok(value) = HeaderValue::from_str(value) {
                    headers.insert(name, value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_client_auth_removes_all_known_variants() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer x"));
        headers.insert("x-api-key", HeaderValue::from_static("k"));
        headers.insert("x-goog-api-key", HeaderValue::from_static("k"));
        strip_client_auth(&mut headers);
        assert!(headers.is_empty());
    }

    #[test]
    fn strip_anonymization_headers_removes_configured_names_only() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4"));
        headers.insert("via", HeaderValue::from_static("1.1 proxy"));
        headers.insert("x-custom", HeaderValue::from_static("keep"));
        let configured = vec!["x-forwarded-for".to_string(), "via".to_string()];
        strip_anonymization_headers(&mut headers, &configured);
        assert!(!headers.contains_key("x-forwarded-for"));
        assert!(!headers.contains_key("via"));
        assert!(headers.contains_key("x-custom"));
    }

    #[test]
    fn header_rules_apply_set_then_remove_in_order() {
        let mut headers = HeaderMap::new();
        headers.insert("x-foo", HeaderValue::from_static("old"));
        let rules = vec![
            HeaderRule { name: "x-foo".to_string(), action: HeaderRuleAction::Set("new".to_string()) },
            HeaderRule { name: "x-bar".to_string(), action: HeaderRuleAction::Remove },
        ];
        apply_header_rules(&mut headers, &rules);
        assert_eq!(headers.get("x-foo").unwrap(), "new");
        assert!(!headers.contains_key("x-bar"));
    }
}
