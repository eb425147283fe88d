//! Per-request retry bookkeeping for aggregate groups. Exclusively owned by the single request task handling
//! it — never shared, never a process-wide global.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;

use crate::group::{Group, GroupId, SubGroup};

pub type ExcludedSubGroups = HashSet<GroupId>;

#[derive(Debug, Clone)]
pub struct RetryContext {
    pub excluded_sub_groups: ExcludedSubGroups,
    pub attempt_count: u32,
    pub original_body: Bytes,
    pub original_path: String,
    pub sub_group_key_retry_map: HashMap<GroupId, u32>,
}

impl RetryContext {
    pub fn new(original_body: Bytes, original_path: impl Into<String>) -> Self {
        Self {
            excluded_sub_groups: ExcludedSubGroups::new(),
            attempt_count: 0,
            original_body,
            original_path: original_path.into(),
            sub_group_key_retry_map: HashMap::new(),
        }
    }

    /// Count of enabled sub-groups not currently excluded.
    pub fn count_available(&self, group: &Group) -> usize {
        group
            .enabled_sub_groups()
            .filter(|sg| !self.excluded_sub_groups.contains(&sg.id))
            .count()
    }

    /// Mark a sub-group as exhausted, unless it is the last survivor: the
    /// last remaining sub-group is never excluded.
    pub fn exclude_unless_last(&mut self, group: &Group, sub_group_id: &GroupId) {
        if self.count_available(group) > 1 {
            self.excluded_sub_groups.insert(sub_group_id.clone());
        }
    }

    /// Clear exclusions once every enabled, non-excluded sub-group has
    /// exhausted its key budget, giving every sub-group another round.
    pub fn reset_if_exhausted(&mut self, group: &Group) {
        if self.count_available(group) == 0 {
            self.excluded_sub_groups.clear();
        }
    }

    pub fn key_retries_used(&self, sub_group_id: &GroupId) -> u32 {
        self.sub_group_key_retry_map
            .get(sub_group_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn record_key_retry(&mut self, sub_group_id: &GroupId) {
        *self
            .sub_group_key_retry_map
            .entry(sub_group_id.clone())
            .or_insert(0) += 1;
    }

    /// Outer-loop effective max switches: `max_retries`, capped
    /// by `sub_max_retries` if positive; if `max_retries` is entirely
    /// absent and there is more than one sub-group, default to
    /// `len(sub_groups) - 1` so each sub-group gets one try.
    pub fn outer_max_switches(group: &Group) -> u32 {
        let sub_group_count = group.sub_groups.as_ref().map(Vec::len).unwrap_or(0);
        let max_retries = group.config.max_retries();
        let effective = match max_retries {
            Some(v) => v,
            None if sub_group_count > 1 => (sub_group_count - 1) as u32,
            None => 0,
        };
        match group.config.sub_max_retries() {
            Some(cap) if cap > 0 => effective.min(cap),
            _ => effective,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubGroupPick {
    pub sub_group: SubGroup,
}

/// Weighted, enablement-respecting sub-group selection for aggregate
/// groups.
pub trait SubGroupManager: Send + Sync {
    fn select_with_retry(
        &self,
        group: &Group,
        excluded: &ExcludedSubGroups,
    ) -> Option<SubGroupPick>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{ChannelKind, Config, EffectiveConfig, GroupKind, ModelMapping};

    fn group_with(sub_groups: Vec<SubGroup>, config: Config) -> Group {
        Group {
            id: "g".into(),
            display_name: "g".into(),
            channel: ChannelKind::OpenAI,
            kind: GroupKind::Aggregate,
            upstreams: vec![],
            enabled: true,
            effective: EffectiveConfig::default(),
            config,
            model_mapping: ModelMapping::default(),
            header_rules: vec![],
            sub_groups: Some(sub_groups),
        }
    }

    #[test]
    fn outer_max_defaults_to_sub_group_count_minus_one() {
        let group = group_with(
            vec![
                SubGroup { id: "a".into(), enabled: true, weight: 1 },
                SubGroup { id: "b".into(), enabled: true, weight: 1 },
                SubGroup { id: "c".into(), enabled: true, weight: 1 },
            ],
            Config::default(),
        );
        assert_eq!(RetryContext::outer_max_switches(&group), 2);
    }

    #[test]
    fn outer_max_capped_by_sub_max_retries() {
        let mut raw = std::collections::BTreeMap::new();
        raw.insert("max_retries".to_string(), serde_json::json!(10));
        raw.insert("sub_max_retries".to_string(), serde_json::json!(1));
        let group = group_with(
            vec![
                SubGroup { id: "a".into(), enabled: true, weight: 1 },
                SubGroup { id: "b".into(), enabled: true, weight: 1 },
            ],
            Config(raw),
        );
        assert_eq!(RetryContext::outer_max_switches(&group), 1);
    }

    #[test]
    fn last_survivor_never_excluded() {
        let group = group_with(
            vec![
                SubGroup { id: "a".into(), enabled: true, weight: 1 },
                SubGroup { id: "b".into(), enabled: true, weight: 1 },
            ],
            Config::default(),
        );
        let mut ctx = RetryContext::new(Bytes::new(), "/v1/messages");
        ctx.exclude_unless_last(&group, &"a".to_string());
        assert!(ctx.excluded_sub_groups.contains("a"));
        ctx.exclude_unless_last(&group, &"b".to_string());
        assert!(
            !ctx.excluded_sub_groups.contains("b"),
            "last remaining sub-group must never be excluded"
        );
    }

    #[test]
    fn reset_clears_when_all_excluded() {
        let group = group_with(
            vec![SubGroup { id: "a".into(), enabled: true, weight: 1 }],
            Config::default(),
        );
        let mut ctx = RetryContext::new(Bytes::new(), "/v1/messages");
        ctx.excluded_sub_groups.insert("a".to_string());
        ctx.reset_if_exhausted(&group);
        assert!(ctx.excluded_sub_groups.is_empty());
    }
}
