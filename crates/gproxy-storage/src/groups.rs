//! In-memory `GroupManager`: an `ArcSwap`-held snapshot so group
//! resolution never blocks a request task behind a lock, matching the
//! teacher's hot-swappable-snapshot pattern (`MemoryAuth` in
//! `gproxy-core::auth`) generalized from auth keys to groups.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use gproxy_provider_core::group::{Group, GroupId};
use gproxy_provider_core::GroupManager;

pub struct InMemoryGroupManager {
    snapshot: ArcSwap<HashMap<GroupId, Arc<Group>>>,
}

impl InMemoryGroupManager {
    pub fn new(groups: Vec<Group>) -> Self {
        let map = groups.into_iter().map(|g| (g.id.clone(), Arc::new(g))).collect();
        Self { snapshot: ArcSwap::from_pointee(map) }
    }

    /// Atomically replaces every group at once. Requests already in
    /// flight keep resolving against the snapshot they loaded at their
    /// own request start, per the "read once, treat as immutable for the
    /// request's lifetime" invariant.
    pub fn replace(&self, groups: Vec<Group>) {
        let map = groups.into_iter().map(|g| (g.id.clone(), Arc::new(g))).collect();
        self.snapshot.store(Arc::new(map));
    }
}

impl GroupManager for InMemoryGroupManager {
    fn resolve(&self, name: &str) -> Option<Arc<Group>> {
        self.snapshot.load().get(name).cloned()
    }
}
