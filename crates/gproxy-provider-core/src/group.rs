//! Group configuration. Read-only to the core: the
//! Lifecycle Engine resolves a `Group` once at request start via
//! `GroupManager` and treats it as immutable for the request's lifetime.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

pub type GroupId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    OpenAI,
    Codex,
    Gemini,
    Anthropic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Standard,
    Aggregate,
}

/// A weighted upstream base URL.
#[derive(Debug, Clone)]
pub struct Upstream {
    pub base_url: String,
    pub weight: u32,
}

/// Typed configuration knobs every group carries.
#[derive(Debug, Clone, Copy)]
pub struct EffectiveConfig {
    pub max_retries: u32,
    pub request_timeout_seconds: u64,
    pub enable_request_body_logging: bool,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            request_timeout_seconds: 60,
            enable_request_body_logging: false,
        }
    }
}

/// Untyped per-group knobs: `max_retries`, `sub_max_retries`,
/// `force_function_call`, `parallel_tool_calls`, `codex_instructions_mode`,
/// `codex_instructions`, `thinking_model`. Stored as a raw JSON map because
/// the set of recognized keys grows independently of this crate's release
/// cadence; accessors below apply the documented coercions and clamps.
#[derive(Debug, Clone, Default)]
pub struct Config(pub BTreeMap<String, JsonValue>);

impl Config {
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    /// `force_function_call` accepts bool, numeric 0/1, or string forms;
    /// `force_function_calling` is the legacy key name.
    pub fn force_function_call(&self) -> bool {
        self.get("force_function_call")
            .or_else(|| self.get("force_function_calling"))
            .map(truthy)
            .unwrap_or(false)
    }

    pub fn parallel_tool_calls(&self) -> Option<bool> {
        self.get("parallel_tool_calls").map(truthy)
    }

    /// Clamped to [0, 100] by contract.
    pub fn max_retries(&self) -> Option<u32> {
        self.get("max_retries")
            .and_then(JsonValue::as_u64)
            .map(|v| v.min(100) as u32)
    }

    /// Clamped to [0, 100] by contract.
    pub fn sub_max_retries(&self) -> Option<u32> {
        self.get("sub_max_retries")
            .and_then(JsonValue::as_u64)
            .map(|v| v.min(100) as u32)
    }

    pub fn codex_instructions_mode(&self) -> CodexInstructionsMode {
        match self.get("codex_instructions_mode").and_then(JsonValue::as_str) {
            Some("official") => CodexInstructionsMode::Official,
            Some("custom") => CodexInstructionsMode::Custom,
            _ => CodexInstructionsMode::Auto,
        }
    }

    pub fn codex_instructions(&self) -> Option<&str> {
        self.get("codex_instructions").and_then(JsonValue::as_str)
    }

    pub fn thinking_model(&self) -> Option<&str> {
        self.get("thinking_model").and_then(JsonValue::as_str)
    }

    pub fn param_overrides(&self) -> Option<&serde_json::Map<String, JsonValue>> {
        self.get("param_overrides").and_then(JsonValue::as_object)
    }
}

fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_i64().map(|v| v != 0).unwrap_or(false),
        JsonValue::String(s) => matches!(s.as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodexInstructionsMode {
    Auto,
    Official,
    Custom,
}

/// Alias -> real model name, in insertion order (preserved for the
/// models-endpoint enhancer's dedup-by-id pass).
#[derive(Debug, Clone, Default)]
pub struct ModelMapping(pub Vec<(String, String)>);

impl ModelMapping {
    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, real)| real.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(alias, _)| alias.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HeaderRule {
    pub name: String,
    pub action: HeaderRuleAction,
}

#[derive(Debug, Clone)]
pub enum HeaderRuleAction {
    Set(String),
    Remove,
}

#[derive(Debug, Clone)]
pub struct SubGroup {
    pub id: GroupId,
    pub enabled: bool,
    pub weight: u32,
}

#[derive(Debug, Clone)]
pub struct Group {
    pub id: GroupId,
    pub display_name: String,
    pub channel: ChannelKind,
    pub kind: GroupKind,
    pub upstreams: Vec<Upstream>,
    pub enabled: bool,
    pub effective: EffectiveConfig,
    pub config: Config,
    pub model_mapping: ModelMapping,
    pub header_rules: Vec<HeaderRule>,
    pub sub_groups: Option<Vec<SubGroup>>,
}

impl Group {
    pub fn enabled_sub_groups(&self) -> impl Iterator<Item = &SubGroup> {
        self.sub_groups
            .iter()
            .flatten()
            .filter(|sg| sg.enabled)
    }
}

/// Read-only group resolution. Never mutated by the core.
pub trait GroupManager: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<Group>>;
}
