//! Deserializable group/key configuration. `gproxy_provider_core::group`
//! types carry no `serde` derives of their own (they're the core's
//! internal, read-only data model) — these DTOs are the on-disk shape and
//! are converted into real `Group`s, plus the initial key secrets used to
//! seed `InMemoryKeyProvider`, at load time.

use std::collections::BTreeMap;

use gproxy_provider_core::group::{
    ChannelKind, Config, EffectiveConfig, Group, GroupKind, HeaderRule, HeaderRuleAction,
    ModelMapping, SubGroup, Upstream,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse group config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ChannelKindDto {
    OpenAi,
    Codex,
    Gemini,
    Anthropic,
}

impl From<ChannelKindDto> for ChannelKind {
    fn from(value: ChannelKindDto) -> Self {
        match value {
            ChannelKindDto::OpenAi => ChannelKind::OpenAI,
            ChannelKindDto::Codex => ChannelKind::Codex,
            ChannelKindDto::Gemini => ChannelKind::Gemini,
            ChannelKindDto::Anthropic => ChannelKind::Anthropic,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum GroupKindDto {
    Standard,
    Aggregate,
}

impl From<GroupKindDto> for GroupKind {
    fn from(value: GroupKindDto) -> Self {
        match value {
            GroupKindDto::Standard => GroupKind::Standard,
            GroupKindDto::Aggregate => GroupKind::Aggregate,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpstreamDto {
    base_url: String,
    #[serde(default = "default_weight")]
    weight: u32,
}

fn default_weight() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct EffectiveConfigDto {
    #[serde(default = "default_max_retries")]
    max_retries: u32,
    #[serde(default = "default_timeout")]
    request_timeout_seconds: u64,
    #[serde(default)]
    enable_request_body_logging: bool,
}

fn default_max_retries() -> u32 {
    2
}

fn default_timeout() -> u64 {
    60
}

impl Default for EffectiveConfigDto {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            request_timeout_seconds: default_timeout(),
            enable_request_body_logging: false,
        }
    }
}

impl From<EffectiveConfigDto> for EffectiveConfig {
    fn from(value: EffectiveConfigDto) -> Self {
        Self {
            max_retries: value.max_retries,
            request_timeout_seconds: value.request_timeout_seconds,
            enable_request_body_logging: value.enable_request_body_logging,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum HeaderRuleActionDto {
    Set(String),
    Remove,
}

#[derive(Debug, Deserialize)]
struct HeaderRuleDto {
    name: String,
    action: HeaderRuleActionDto,
}

#[derive(Debug, Deserialize)]
struct SubGroupDto {
    id: String,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_weight")]
    weight: u32,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct GroupDto {
    id: String,
    display_name: String,
    channel: ChannelKindDto,
    kind: GroupKindDto,
    #[serde(default)]
    upstreams: Vec<UpstreamDto>,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    effective: EffectiveConfigDto,
    #[serde(default)]
    config: BTreeMap<String, JsonValue>,
    /// `[[alias, real], ...]`, preserving insertion order.
    #[serde(default)]
    model_mapping: Vec<(String, String)>,
    #[serde(default)]
    header_rules: Vec<HeaderRuleDto>,
    #[serde(default)]
    sub_groups: Option<Vec<SubGroupDto>>,
    /// Opaque upstream secrets seeded into `InMemoryKeyProvider` at
    /// startup. Not part of `Group` itself — keys are the `KeyProvider`'s
    /// concern, not the group's.
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GroupFile {
    #[serde(default)]
    pub groups: Vec<GroupDto>,
}

/// One parsed group plus the key secrets to seed its rotation pool with.
pub struct GroupSeed {
    pub group: Group,
    pub keys: Vec<String>,
}

fn convert(dto: GroupDto) -> GroupSeed {
    let group = Group {
        id: dto.id,
        display_name: dto.display_name,
        channel: dto.channel.into(),
        kind: dto.kind.into(),
        upstreams: dto
            .upstreams
            .into_iter()
            .map(|u| Upstream { base_url: u.base_url, weight: u.weight })
            .collect(),
        enabled: dto.enabled,
        effective: dto.effective.into(),
        config: Config(dto.config),
        model_mapping: ModelMapping(dto.model_mapping),
        header_rules: dto
            .header_rules
            .into_iter()
            .map(|r| HeaderRule {
                name: r.name,
                action: match r.action {
                    HeaderRuleActionDto::Set(v) => HeaderRuleAction::Set(v),
                    HeaderRuleActionDto::Remove => HeaderRuleAction::Remove,
                },
            })
            .collect(),
        sub_groups: dto.sub_groups.map(|groups| {
            groups
                .into_iter()
                .map(|sg| SubGroup { id: sg.id, enabled: sg.enabled, weight: sg.weight })
                .collect()
        }),
    };
    GroupSeed { group, keys: dto.keys }
}

pub fn load_groups_from_str(contents: &str) -> Result<Vec<GroupSeed>, ConfigError> {
    let file: GroupFile = serde_json::from_str(contents)?;
    Ok(file.groups.into_iter().map(convert).collect())
}

pub fn load_groups_from_file(path: &str) -> Result<Vec<GroupSeed>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_string(), source })?;
    load_groups_from_str(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_standard_group_with_one_upstream() {
        let json = r#"{
            "groups": [{
                "id": "g1",
                "display_name": "G1",
                "channel": "openai",
                "kind": "standard",
                "upstreams": [{"base_url": "https://api.openai.com", "weight": 1}],
                "config": {"force_function_call": true},
                "model_mapping": [["alias", "gpt-4o"]],
                "keys": ["sk-a", "sk-b"]
            }]
        }"#;
        let seeds = load_groups_from_str(json).unwrap();
        assert_eq!(seeds.len(), 1);
        let seed = &seeds[0];
        assert_eq!(seed.group.id, "g1");
        assert!(seed.group.config.force_function_call());
        assert_eq!(seed.group.model_mapping.resolve("alias"), Some("gpt-4o"));
        assert_eq!(seed.keys, vec!["sk-a".to_string(), "sk-b".to_string()]);
    }

    #[test]
    fn aggregate_group_parses_sub_groups() {
        let json = r#"{
            "groups": [{
                "id": "agg",
                "display_name": "Aggregate",
                "channel": "openai",
                "kind": "aggregate",
                "sub_groups": [
                    {"id": "a", "enabled": true, "weight": 1},
                    {"id": "b", "enabled": false, "weight": 2}
                ]
            }]
        }"#;
        let seeds = load_groups_from_str(json).unwrap();
        let group = &seeds[0].group;
        assert_eq!(group.sub_groups.as_ref().unwrap().len(), 2);
        assert_eq!(group.enabled_sub_groups().count(), 1);
    }
}
