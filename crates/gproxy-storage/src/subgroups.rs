//! Weighted sub-group selection for aggregate groups: the same
//! weighted-pick rule `gproxy-provider-impl` uses for upstreams, applied to
//! enabled, non-excluded sub-groups instead.

use gproxy_provider_core::group::{Group, SubGroup};
use gproxy_provider_core::retry::{ExcludedSubGroups, SubGroupManager, SubGroupPick};
use rand::Rng;

pub struct WeightedSubGroupManager;

impl SubGroupManager for WeightedSubGroupManager {
    fn select_with_retry(&self, group: &Group, excluded: &ExcludedSubGroups) -> Option<SubGroupPick> {
        let candidates: Vec<&SubGroup> = group
            .enabled_sub_groups()
            .filter(|sg| !excluded.contains(&sg.id))
            .collect();
        let total_weight: u64 = candidates.iter().map(|sg| sg.weight as u64).sum();
        if candidates.is_empty() || total_weight == 0 {
            return None;
        }

        let mut pick = rand::rng().random_range(0..total_weight);
        for sub_group in &candidates {
            let weight = sub_group.weight as u64;
            if pick < weight {
                return Some(SubGroupPick { sub_group: (*sub_group).clone() });
            }
            pick -= weight;
        }
        candidates.last().map(|sg| SubGroupPick { sub_group: (*sg).clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gproxy_provider_core::group::{ChannelKind, Config, EffectiveConfig, GroupKind, ModelMapping};
    use std::collections::HashSet;

    fn group_with(sub_groups: Vec<SubGroup>) -> Group {
        Group {
            id: "g".into(),
            display_name: "g".into(),
            channel: ChannelKind::OpenAI,
            kind: GroupKind::Aggregate,
            upstreams: vec![],
            enabled: true,
            effective: EffectiveConfig::default(),
            config: Config::default(),
            model_mapping: ModelMapping::default(),
            header_rules: vec![],
            sub_groups: Some(sub_groups),
        }
    }

    #[test]
    fn picks_among_enabled_non_excluded() {
        let group = group_with(vec![
            SubGroup { id: "a".into(), enabled: true, weight: 1 },
            SubGroup { id: "b".into(), enabled: false, weight: 1 },
        ]);
        let manager = WeightedSubGroupManager;
        let excluded = ExcludedSubGroups::new();
        let pick = manager.select_with_retry(&group, &excluded).unwrap();
        assert_eq!(pick.sub_group.id, "a");
    }

    #[test]
    fn returns_none_when_everything_excluded() {
        let group = group_with(vec![SubGroup { id: "a".into(), enabled: true, weight: 1 }]);
        let manager = WeightedSubGroupManager;
        let mut excluded = ExcludedSubGroups::new();
        excluded.insert("a".to_string());
        assert!(manager.select_with_retry(&group, &excluded).is_none());
    }

    #[test]
    fn zero_total_weight_yields_none() {
        let group = group_with(vec![SubGroup { id: "a".into(), enabled: true, weight: 0 }]);
        let manager = WeightedSubGroupManager;
        let excluded: HashSet<String> = HashSet::new();
        assert!(manager.select_with_retry(&group, &excluded).is_none());
    }
}
