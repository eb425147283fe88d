//! Collaborator traits and the data model the Lifecycle Engine is generic
//! over: groups, keys, retry context, trigger signals, and tool-name
//! shortening. Persistent storage, the admin CRUD API, telemetry, and
//! rate/quota bookkeeping are named here only as trait boundaries — their
//! concrete implementations live in `gproxy-storage` (or a deployment's own
//! crate) and are never assumed by this crate.

pub mod channel;
pub mod error;
pub mod group;
pub mod key;
pub mod log;
pub mod retry;
pub mod toolname;
pub mod trigger;

pub use channel::{ChannelError, ChannelHandler, SelectedUpstream};
pub use error::{ParsedUpstreamError, ProxyError};
pub use group::{
    ChannelKind, Config, EffectiveConfig, Group, GroupId, GroupKind, GroupManager, HeaderRule,
    ModelMapping, SubGroup,
};
pub use key::{ApiKey, KeyHealth, KeyProvider, NoKeysAvailable};
pub use log::{RequestLogRecord, RequestLogSink};
pub use retry::{ExcludedSubGroups, RetryContext, SubGroupManager, SubGroupPick};
pub use toolname::ToolNameShortMap;
pub use trigger::TriggerSignal;
