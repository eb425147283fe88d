mod cli;

use std::sync::Arc;

use clap::Parser;
use gproxy_common::{GlobalConfig, GlobalConfigPatch};
use gproxy_core::ProxyEngine;
use gproxy_provider_impl::{builtin_channel_registry, client::shared_client};
use gproxy_storage::{
    InMemoryGroupManager, InMemoryKeyProvider, TracingRequestLogSink, WeightedSubGroupManager,
};

fn env_patch() -> GlobalConfigPatch {
    GlobalConfigPatch {
        host: std::env::var("GPROXY_HOST").ok(),
        port: std::env::var("GPROXY_PORT").ok().and_then(|v| v.parse().ok()),
        proxy: std::env::var("GPROXY_PROXY").ok(),
        default_request_timeout_secs: std::env::var("GPROXY_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok()),
        max_upstream_response_body_bytes: std::env::var("GPROXY_MAX_RESPONSE_BODY_BYTES")
            .ok()
            .and_then(|v| v.parse().ok()),
        anonymization_headers: std::env::var("GPROXY_ANONYMIZATION_HEADERS")
            .ok()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(cli.log_filter.clone()))
        .init();

    let mut patch = env_patch();
    patch.overlay(cli.clone().into_patch());
    let global: GlobalConfig = patch.into_config();

    let seeds = match &cli.config {
        Some(path) => gproxy_storage::load_groups_from_file(path)?,
        None => Vec::new(),
    };
    let groups = seeds.iter().map(|seed| seed.group.clone()).collect::<Vec<_>>();
    let key_seeds = seeds
        .into_iter()
        .map(|seed| (seed.group.id.clone(), seed.keys))
        .collect::<Vec<_>>();

    let client = shared_client(global.proxy.as_deref())?;

    let engine = Arc::new(ProxyEngine {
        groups: Arc::new(InMemoryGroupManager::new(groups)),
        keys: Arc::new(InMemoryKeyProvider::new(key_seeds)),
        sub_groups: Arc::new(WeightedSubGroupManager),
        log_sink: Arc::new(TracingRequestLogSink),
        channels: builtin_channel_registry(),
        client,
        global: global.clone(),
    });

    let app = gproxy_router::proxy_router(engine);

    let bind = format!("{}:{}", global.host, global.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "gproxy listening");
    axum::serve(listener, app).await?;
    Ok(())
}
