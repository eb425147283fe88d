//! Small helpers for writing outbound auth headers. Each `ChannelHandler`
//! calls into these from `inject_auth` instead of hand-rolling
//! `HeaderName`/`HeaderValue` parsing.

use http::{HeaderMap, HeaderName, HeaderValue};

fn set(headers: &mut HeaderMap, name: &str, value: &str) {
    let Ok(name) = HeaderName::try_from(name) else {
        return;
    };
    let Ok(value) = HeaderValue::from_str(value) else {
        return;
    };
    headers.insert(name, value);
}

pub fn set_bearer(headers: &mut HeaderMap, access_token: &str) {
    set(headers, "Authorization", &format!("Bearer {access_token}"));
}

pub fn set_api_key_header(headers: &mut HeaderMap, header_name: &str, key: &str) {
    set(headers, header_name, key);
}

pub fn set_header(headers: &mut HeaderMap, name: &str, value: &str) {
    set(headers, name, value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_is_well_formed() {
        let mut headers = HeaderMap::new();
        set_bearer(&mut headers, "sk-test");
        assert_eq!(headers.get("Authorization").unwrap(), "Bearer sk-test");
    }

    #[test]
    fn invalid_header_value_is_dropped_silently() {
        let mut headers = HeaderMap::new();
        set_header(&mut headers, "X-Test", "bad\nvalue");
        assert!(headers.get("X-Test").is_none());
    }
}
