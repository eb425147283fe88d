//! Shared, dependency-light utilities used across the workspace: process
//! configuration, bounded-buffer helpers, and log-safe string truncation.

pub mod bound;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum GlobalConfigError {
    #[error("missing required global config field: {0}")]
    MissingField(&'static str),
}

/// Final, merged process configuration.
///
/// Merge order: CLI > ENV > defaults, matching the teacher's CLI > ENV > DB
/// layering minus the DB layer (persistence is an external collaborator here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub host: String,
    pub port: u16,
    /// Outbound proxy used for upstream egress, if configured.
    pub proxy: Option<String>,
    /// Default per-group request timeout when a group omits one.
    pub default_request_timeout_secs: u64,
    /// Upper bound on a fully-buffered upstream response body.
    pub max_upstream_response_body_bytes: usize,
    /// Header names stripped from outbound requests alongside client-auth
    /// headers, so the upstream never learns the client's real origin.
    pub anonymization_headers: Vec<String>,
}

fn default_anonymization_headers() -> Vec<String> {
    ["x-forwarded-for", "x-forwarded-host", "x-forwarded-proto", "x-real-ip", "via", "forwarded"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            proxy: None,
            default_request_timeout_secs: 60,
            max_upstream_response_body_bytes: 8 * 1024 * 1024,
            anonymization_headers: default_anonymization_headers(),
        }
    }
}

/// Optional overlay used for merging config layers before defaults apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub proxy: Option<String>,
    pub default_request_timeout_secs: Option<u64>,
    pub max_upstream_response_body_bytes: Option<usize>,
    pub anonymization_headers: Option<Vec<String>>,
}

impl GlobalConfigPatch {
    pub fn overlay(&mut self, other: GlobalConfigPatch) {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.proxy.is_some() {
            self.proxy = other.proxy;
        }
        if other.default_request_timeout_secs.is_some() {
            self.default_request_timeout_secs = other.default_request_timeout_secs;
        }
        if other.max_upstream_response_body_bytes.is_some() {
            self.max_upstream_response_body_bytes = other.max_upstream_response_body_bytes;
        }
        if other.anonymization_headers.is_some() {
            self.anonymization_headers = other.anonymization_headers;
        }
    }

    pub fn into_config(self) -> GlobalConfig {
        let defaults = GlobalConfig::default();
        GlobalConfig {
            host: self.host.unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            proxy: self.proxy,
            default_request_timeout_secs: self
                .default_request_timeout_secs
                .unwrap_or(defaults.default_request_timeout_secs),
            max_upstream_response_body_bytes: self
                .max_upstream_response_body_bytes
                .unwrap_or(defaults.max_upstream_response_body_bytes),
            anonymization_headers: self.anonymization_headers.unwrap_or(defaults.anonymization_headers),
        }
    }
}

/// Mask a secret key for log lines: keep a short prefix, elide the rest.
pub fn mask_key(key: &str) -> String {
    let visible = 4.min(key.len());
    format!("{}***", &key[..visible])
}

/// Truncate a string to at most `max_bytes`, on a char boundary, for log
/// previews. Appends `…` when truncated.
pub fn truncate_for_log(input: &str, max_bytes: usize) -> String {
    if input.len() <= max_bytes {
        return input.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &input[..end])
}
