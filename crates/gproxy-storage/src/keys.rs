//! In-memory `KeyProvider`: round-robin selection per group, with
//! consecutive-failure blacklisting and time-based healing. The core only
//! ever calls `select`/`update_status` — rotation, blacklist thresholds,
//! and healing windows are entirely this crate's concern, per
//! `spec.md` §3.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gproxy_provider_core::group::GroupId;
use gproxy_provider_core::key::{ApiKey, KeyHealth, KeyProvider, NoKeysAvailable};
use gproxy_provider_core::ParsedUpstreamError;

/// Failures in a row before a key is blacklisted rather than just marked
/// degraded.
const BLACKLIST_THRESHOLD: u32 = 3;
/// Base backoff once blacklisted; doubles per extra failure past the
/// threshold, capped at `MAX_BACKOFF`.
const BASE_BACKOFF: Duration = Duration::from_secs(30);
const MAX_BACKOFF: Duration = Duration::from_secs(30 * 60);

struct KeyState {
    secret: String,
    health: KeyHealth,
    consecutive_failures: u32,
    blacklisted_until: Option<Instant>,
}

struct Pool {
    keys: Vec<KeyState>,
    next: usize,
}

pub struct InMemoryKeyProvider {
    pools: HashMap<GroupId, Mutex<Pool>>,
}

impl InMemoryKeyProvider {
    /// `seeds` is `(group_id, secrets)` — one pool per group, in the order
    /// the secrets are given (rotation order is deterministic from there).
    pub fn new(seeds: impl IntoIterator<Item = (GroupId, Vec<String>)>) -> Self {
        let pools = seeds
            .into_iter()
            .map(|(group_id, secrets)| {
                let keys = secrets
                    .into_iter()
                    .map(|secret| KeyState {
                        secret,
                        health: KeyHealth::Healthy,
                        consecutive_failures: 0,
                        blacklisted_until: None,
                    })
                    .collect();
                (group_id, Mutex::new(Pool { keys, next: 0 }))
            })
            .collect();
        Self { pools }
    }

    fn key_id(group: &GroupId, index: usize) -> String {
        format!("{group}#{index}")
    }

    fn index_from_id(id: &str) -> Option<usize> {
        id.rsplit('#').next()?.parse().ok()
    }
}

fn backoff_for(consecutive_failures: u32) -> Duration {
    let extra = consecutive_failures.saturating_sub(BLACKLIST_THRESHOLD);
    let doublings = extra.min(6); // cap exponent growth well before overflow
    let factor = 1u32 << doublings;
    (BASE_BACKOFF * factor).min(MAX_BACKOFF)
}

#[async_trait]
impl KeyProvider for InMemoryKeyProvider {
    async fn select(&self, group: &GroupId) -> Result<ApiKey, NoKeysAvailable> {
        let pool_lock = self.pools.get(group).ok_or(NoKeysAvailable)?;
        let mut pool = pool_lock.lock().expect("key pool lock poisoned");
        if pool.keys.is_empty() {
            return Err(NoKeysAvailable);
        }

        let now = Instant::now();
        let len = pool.keys.len();
        for offset in 0..len {
            let idx = (pool.next + offset) % len;
            let state = &mut pool.keys[idx];
            if state.health == KeyHealth::Blacklisted {
                if state.blacklisted_until.is_some_and(|until| now >= until) {
                    state.health = KeyHealth::Healthy;
                    state.consecutive_failures = 0;
                    state.blacklisted_until = None;
                } else {
                    continue;
                }
            }
            pool.next = (idx + 1) % len;
            return Ok(ApiKey {
                id: Self::key_id(group, idx),
                secret: state.secret.clone(),
                group_id: group.clone(),
                health: state.health,
            });
        }
        Err(NoKeysAvailable)
    }

    async fn update_status(
        &self,
        key: &ApiKey,
        group: &GroupId,
        success: bool,
        _parsed_error: Option<&ParsedUpstreamError>,
    ) {
        let Some(pool_lock) = self.pools.get(group) else { return };
        let Some(idx) = Self::index_from_id(&key.id) else { return };
        let mut pool = pool_lock.lock().expect("key pool lock poisoned");
        let Some(state) = pool.keys.get_mut(idx) else { return };

        if success {
            state.consecutive_failures = 0;
            state.health = KeyHealth::Healthy;
            state.blacklisted_until = None;
            return;
        }

        state.consecutive_failures += 1;
        if state.consecutive_failures >= BLACKLIST_THRESHOLD {
            state.health = KeyHealth::Blacklisted;
            state.blacklisted_until = Some(Instant::now() + backoff_for(state.consecutive_failures));
        } else {
            state.health = KeyHealth::Degraded;
        }
    }
}
