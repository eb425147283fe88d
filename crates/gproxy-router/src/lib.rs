//! HTTP surface: a single inbound route, `POST /proxy/{group_name}/{*rest}`,
//! that extracts an `EngineRequest` and hands it to
//! `gproxy_core::ProxyEngine::handle_proxy`. Everything else here is axum
//! plumbing around that one call: trace-id stamping, a body-size guard
//! ahead of the engine's own check, and converting `EngineResponse` back
//! into an axum `Response` (buffered or SSE, with heartbeat wrapping and
//! hop-by-hop header stripping), matching the teacher's `proxy.rs`.

mod proxy;

pub use proxy::proxy_router;
