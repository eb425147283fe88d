//! Reasoning-effort derivation from Claude's `thinking.budget_tokens`
//!: a thresholded mapping, not a linear one.

use gproxy_protocol::codex::ReasoningEffort;

const LOW_THRESHOLD: u32 = 5_000;
const MEDIUM_THRESHOLD: u32 = 15_000;

pub fn effort_for_budget(budget_tokens: Option<u32>) -> ReasoningEffort {
    match budget_tokens {
        Some(budget) if budget <= LOW_THRESHOLD => ReasoningEffort::Low,
        Some(budget) if budget <= MEDIUM_THRESHOLD => ReasoningEffort::Medium,
        Some(_) => ReasoningEffort::High,
        None => ReasoningEffort::Medium,
    }
}

/// The hint line appended to the last user message when thinking is
/// enabled, so the model sees the budget even though Codex's own
/// `reasoning.effort` is coarse-grained.
pub fn budget_hint(budget_tokens: u32) -> String {
    format!("\n\n[Reasoning budget: approximately {budget_tokens} tokens. Think proportionally to this budget before responding.]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_select_the_right_tier() {
        assert_eq!(effort_for_budget(Some(1000)), ReasoningEffort::Low);
        assert_eq!(effort_for_budget(Some(5000)), ReasoningEffort::Low);
        assert_eq!(effort_for_budget(Some(5001)), ReasoningEffort::Medium);
        assert_eq!(effort_for_budget(Some(15000)), ReasoningEffort::Medium);
        assert_eq!(effort_for_budget(Some(15001)), ReasoningEffort::High);
    }

    #[test]
    fn missing_budget_defaults_to_medium() {
        assert_eq!(effort_for_budget(None), ReasoningEffort::Medium);
    }
}
