//! Tool-argument fidelity fixups applied when translating tool-call
//! arguments toward upstreams that are pickier than Claude about shape
//!: WebSearch's empty domain-filter arrays and Windows
//! paths inside Bash-style `command` fields.

use serde_json::Value;

/// WebSearch tool names whose `allowed_domains`/`blocked_domains` arrays
/// must be removed entirely when empty — some upstreams reject the
/// co-presence of both keys even when both are `[]`.
const WEB_SEARCH_DOMAIN_KEYS: [&str; 2] = ["allowed_domains", "blocked_domains"];

/// Drops empty `allowed_domains`/`blocked_domains` arrays from a WebSearch
/// tool-call's arguments object. No-op for non-object input or for arrays
/// that are non-empty.
pub fn strip_empty_web_search_domains(args: &mut Value) {
    let Value::Object(map) = args else {
        return;
    };
    for key in WEB_SEARCH_DOMAIN_KEYS {
        let is_empty_array = matches!(map.get(key), Some(Value::Array(a)) if a.is_empty());
        if is_empty_array {
            map.remove(key);
        }
    }
}

/// Double-escapes Windows-style backslash path separators inside a
/// string. `C:\Users\me` -> `C:\\Users\\me`. Idempotent is not guaranteed
/// (already-escaped input would be escaped again), so callers must apply
/// this exactly once, at the point arguments are about to be serialized
/// for the upstream.
fn double_escape_windows_backslashes(value: &str) -> String {
    value.replace('\\', "\\\\")
}

/// Applies the Windows-path double-escape to the `command` field of a
/// Bash-style tool-call arguments object, if present and a string.
pub fn fix_bash_command_backslashes(args: &mut Value) {
    let Value::Object(map) = args else {
        return;
    };
    if let Some(Value::String(command)) = map.get_mut("command") {
        *command = double_escape_windows_backslashes(command);
    }
}

/// Applies both fixups, keyed by tool name: WebSearch-family tools get
/// the domain-array strip, Bash-family tools get the backslash fix.
/// Unknown tool names are left untouched.
pub fn apply_by_tool_name(name: &str, args: &mut Value) {
    let lower = name.to_ascii_lowercase();
    if lower.contains("websearch") || lower.contains("web_search") {
        strip_empty_web_search_domains(args);
    }
    if lower == "bash" || lower.contains("shell") {
        fix_bash_command_backslashes(args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_empty_domain_arrays_only() {
        let mut args = json!({"allowed_domains": [], "blocked_domains": ["x.com"], "query": "q"});
        strip_empty_web_search_domains(&mut args);
        assert!(args.get("allowed_domains").is_none());
        assert!(args.get("blocked_domains").is_some());
    }

    #[test]
    fn non_empty_domain_array_survives() {
        let mut args = json!({"allowed_domains": ["a.com"]});
        strip_empty_web_search_domains(&mut args);
        assert!(args.get("allowed_domains").is_some());
    }

    #[test]
    fn double_escapes_windows_paths() {
        let mut args = json!({"command": r"dir C:\Users\me"});
        fix_bash_command_backslashes(&mut args);
        assert_eq!(args["command"], r"dir C:\\Users\\me");
    }

    #[test]
    fn apply_by_tool_name_routes_correctly() {
        let mut args = json!({"command": r"C:\x", "allowed_domains": []});
        apply_by_tool_name("Bash", &mut args);
        assert_eq!(args["command"], r"C:\\x");
        assert!(args.get("allowed_domains").is_some());

        let mut args = json!({"allowed_domains": [], "blocked_domains": []});
        apply_by_tool_name("WebSearch", &mut args);
        assert!(args.as_object().unwrap().is_empty());
    }
}
