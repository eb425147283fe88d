use clap::Parser;

/// CLI flags layer over `GlobalConfig`'s ENV/defaults layers (teacher's
/// CLI > ENV > defaults merge order, minus the DB layer).
#[derive(Parser, Debug, Clone)]
#[command(name = "gproxy")]
pub(crate) struct Cli {
    #[arg(long)]
    pub(crate) host: Option<String>,
    #[arg(long)]
    pub(crate) port: Option<u16>,
    #[arg(long)]
    pub(crate) proxy: Option<String>,
    /// Path to a JSON group-config file (see `gproxy_storage::config`).
    #[arg(long)]
    pub(crate) config: Option<String>,
    /// Comma-separated header names to strip from outbound requests in
    /// addition to client-auth headers.
    #[arg(long, value_delimiter = ',')]
    pub(crate) anonymization_headers: Option<Vec<String>>,
    #[arg(long, default_value = "info")]
    pub(crate) log_filter: String,
}

impl Cli {
    pub(crate) fn into_patch(self) -> gproxy_common::GlobalConfigPatch {
        gproxy_common::GlobalConfigPatch {
            host: self.host,
            port: self.port,
            proxy: self.proxy,
            default_request_timeout_secs: None,
            max_upstream_response_body_bytes: None,
            anonymization_headers: self.anonymization_headers,
        }
    }
}
