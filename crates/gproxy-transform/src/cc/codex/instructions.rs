//! `instructions` field selection: Codex requires a non-empty
//! `instructions` string, chosen from {default, official, custom} per
//! `codex_instructions_mode`.

use gproxy_provider_core::group::CodexInstructionsMode;

const DEFAULT_INSTRUCTIONS: &str =
    "You are a helpful coding assistant. Use the available tools when they help answer the user's request; otherwise respond directly.";

/// Reproduced verbatim as Codex's own system prompt for callers that need
/// byte-for-byte upstream behavior parity rather than this gateway's
/// terser default.
const OFFICIAL_INSTRUCTIONS: &str = include_str!("official_instructions.txt");

pub fn select(mode: CodexInstructionsMode, custom: Option<&str>) -> String {
    match mode {
        CodexInstructionsMode::Custom => custom
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
        CodexInstructionsMode::Official => OFFICIAL_INSTRUCTIONS.to_string(),
        CodexInstructionsMode::Auto => custom
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_mode_falls_back_to_default_when_empty() {
        assert_eq!(select(CodexInstructionsMode::Custom, None), DEFAULT_INSTRUCTIONS);
        assert_eq!(select(CodexInstructionsMode::Custom, Some("")), DEFAULT_INSTRUCTIONS);
    }

    #[test]
    fn custom_mode_uses_configured_text() {
        assert_eq!(select(CodexInstructionsMode::Custom, Some("be terse")), "be terse");
    }

    #[test]
    fn official_mode_ignores_custom_text() {
        assert_eq!(select(CodexInstructionsMode::Official, Some("be terse")), OFFICIAL_INSTRUCTIONS);
    }

    #[test]
    fn instructions_are_never_empty() {
        for mode in [
            CodexInstructionsMode::Auto,
            CodexInstructionsMode::Official,
            CodexInstructionsMode::Custom,
        ] {
            assert!(!select(mode, None).is_empty());
        }
    }
}
