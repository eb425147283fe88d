//! API keys are opaque to the core: the Lifecycle
//! Engine only ever selects one and reports success/failure back.

use async_trait::async_trait;

use crate::error::ParsedUpstreamError;
use crate::group::GroupId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyHealth {
    Healthy,
    Degraded,
    Blacklisted,
}

#[derive(Debug, Clone)]
pub struct ApiKey {
    pub id: String,
    pub secret: String,
    pub group_id: GroupId,
    pub health: KeyHealth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no usable key available for group")]
pub struct NoKeysAvailable;

/// Key rotation, blacklisting, and healing live behind this trait; the core
/// mutates key state only through `select`/`update_status`.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn select(&self, group: &GroupId) -> Result<ApiKey, NoKeysAvailable>;

    async fn update_status(
        &self,
        key: &ApiKey,
        group: &GroupId,
        success: bool,
        parsed_error: Option<&ParsedUpstreamError>,
    );
}
