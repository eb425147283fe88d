//! Tool-name shortening. Deterministic in
//! input order: duplicates are skipped, a `_N` suffix disambiguates
//! collisions within the 64-char limit, and an `mcp__` prefix is preserved
//! verbatim when shortening.

use std::collections::HashMap;

pub const MAX_TOOL_NAME_LEN: usize = 64;
const MCP_PREFIX: &str = "mcp__";

#[derive(Debug, Clone, Default)]
pub struct ToolNameShortMap {
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
}

impl ToolNameShortMap {
    /// Build the map for an ordered list of tool names, as they appear in
    /// the client's `tools[]` array.
    pub fn build(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut map = Self::default();
        for name in names {
            map.insert(name.into());
        }
        map
    }

    fn insert(&mut self, name: String) {
        if self.forward.contains_key(&name) {
            return;
        }
        if name.len() <= MAX_TOOL_NAME_LEN {
            self.forward.insert(name.clone(), name.clone());
            self.reverse.insert(name.clone(), name);
            return;
        }
        let prefix = if name.starts_with(MCP_PREFIX) {
            MCP_PREFIX
        } else {
            ""
        };
        let body = &name[prefix.len()..];
        let budget = MAX_TOOL_NAME_LEN - prefix.len();
        let mut candidate = format!("{prefix}{}", truncate_chars(body, budget));
        let mut suffix = 1u32;
        while self.reverse.contains_key(&candidate) {
            let marker = format!("_{suffix}");
            let body_budget = budget.saturating_sub(marker.len());
            candidate = format!("{prefix}{}{marker}", truncate_chars(body, body_budget));
            suffix += 1;
        }
        self.forward.insert(name.clone(), candidate.clone());
        self.reverse.insert(candidate, name);
    }

    /// Short (upstream-facing) name for an original (client-facing) name.
    pub fn shorten(&self, original: &str) -> String {
        self.forward
            .get(original)
            .cloned()
            .unwrap_or_else(|| original.to_string())
    }

    /// Original name for a short (upstream-facing) name, falling back to
    /// the input unchanged if it isn't in the map (e.g. upstream echoed a
    /// name the client never declared).
    pub fn restore(&self, short: &str) -> String {
        self.reverse
            .get(short)
            .cloned()
            .unwrap_or_else(|| short.to_string())
    }
}

fn truncate_chars(s: &str, max_bytes: usize) -> &str {
    let mut end = max_bytes.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_pass_through_unchanged() {
        let map = ToolNameShortMap::build(["read_file", "write_file"]);
        assert_eq!(map.shorten("read_file"), "read_file");
        assert_eq!(map.restore("read_file"), "read_file");
    }

    #[test]
    fn long_names_are_shortened_and_restored() {
        let long = "read_file_with_a_very_long_name_exceeding_the_sixty_four_character_tool_name_limit_for_providers";
        let map = ToolNameShortMap::build([long]);
        let short = map.shorten(long);
        assert!(short.len() <= MAX_TOOL_NAME_LEN);
        assert_eq!(map.restore(&short), long);
    }

    #[test]
    fn mcp_prefix_is_preserved_when_shortening() {
        let long = format!("mcp__{}", "x".repeat(100));
        let map = ToolNameShortMap::build([long.clone()]);
        let short = map.shorten(&long);
        assert!(short.starts_with("mcp__"));
        assert!(short.len() <= MAX_TOOL_NAME_LEN);
    }

    #[test]
    fn collisions_get_disambiguating_suffix() {
        let a = "x".repeat(100);
        let b = format!("{}y", "x".repeat(99));
        let map = ToolNameShortMap::build([a.clone(), b.clone()]);
        let short_a = map.shorten(&a);
        let short_b = map.shorten(&b);
        assert_ne!(short_a, short_b);
        assert!(short_b.ends_with("_1"));
    }

    #[test]
    fn duplicate_names_are_skipped() {
        let map = ToolNameShortMap::build(["dup", "dup"]);
        assert_eq!(map.shorten("dup"), "dup");
    }
}
