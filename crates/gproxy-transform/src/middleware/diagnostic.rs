//! Execution-intent diagnostic: a debug-only heuristic that flags when the
//! model plainly meant to call a tool but never emitted a parseable XML
//! block, so the gap shows up in traces instead of silently vanishing.
//! Never changes what reaches the client.

use std::sync::LazyLock;

use regex::Regex;

/// A handful of phrases models reach for right before (or instead of)
/// emitting the trigger + XML block, in the languages seen in practice.
static INTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(I will (now )?call|I'll (now )?call|calling the .*tool|invoking the .*function|let me call|我将调用|我来调用|调用工具|我需要调用)",
    )
    .unwrap()
});

/// True if `text` reads like the model intended to call a tool, used only
/// to decide whether to emit a debug-level log line.
pub fn looks_like_unparsed_tool_intent(text: &str) -> bool {
    INTENT_RE.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_english_intent_phrases() {
        assert!(looks_like_unparsed_tool_intent("Sure, let me call the search tool for you."));
    }

    #[test]
    fn detects_chinese_intent_phrases() {
        assert!(looks_like_unparsed_tool_intent("好的，我将调用搜索工具。"));
    }

    #[test]
    fn plain_prose_is_not_flagged() {
        assert!(!looks_like_unparsed_tool_intent("The weather today is sunny and warm."));
    }
}
