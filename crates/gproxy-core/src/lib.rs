//! The Lifecycle Engine: request resolution, the Policy Pipeline's
//! routing-dependent steps, the standard/aggregate retry loops, upstream
//! dispatch, and CC-transcoder/function-call-middleware response routing.
//!
//! Everything here is generic over the collaborator traits defined in
//! `gproxy-provider-core` (`GroupManager`, `KeyProvider`, `SubGroupManager`,
//! `RequestLogSink`) plus the `ChannelHandler` registry from
//! `gproxy-provider-impl` — this crate holds no concrete persistence or
//! channel-auth logic of its own.

pub mod cc;
pub mod engine;
pub mod error;
pub mod headers;
pub mod policy;
pub mod retry_loop;
pub mod upstream;

pub use engine::{EngineBody, EngineRequest, EngineResponse, ProxyEngine};
pub use retry_loop::{Cancellation, never_cancelled};
