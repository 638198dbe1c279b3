// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Deterministic summaries used when the synthesizing model call fails.
//!
//! The turn still terminates normally: the user sees what each tool did
//! even though the model could not narrate it.

use serde_json::Value;

/// One executed tool call: `(tool_name, wire_result)`.
pub type ExecutedTool<'a> = (&'a str, &'a Value);

pub fn summarize_tool_results(executed: &[ExecutedTool<'_>]) -> String {
    if executed.is_empty() {
        return "No tools were executed.".to_string();
    }
    let lines: Vec<String> = executed.iter().map(|(name, result)| line_for(name, result)).collect();
    lines.join("\n")
}

fn line_for(name: &str, result: &Value) -> String {
    let success = result["success"].as_bool().unwrap_or(false);
    if success {
        match name {
            "file_create" => format!(
                "✓ file created: {}",
                result["result"]["file_path"].as_str().unwrap_or("?")
            ),
            "file_edit" => format!(
                "✓ file edited: {}",
                result["result"]["file_path"].as_str().unwrap_or("?")
            ),
            "shell_exec" => format!(
                "✓ command finished (exit {}): {}",
                result["result"]["exit_code"].as_i64().unwrap_or(-1),
                result["result"]["command"].as_str().unwrap_or("?")
            ),
            other => format!("✓ {other} succeeded"),
        }
    } else {
        let reason = result["error"]
            .as_str()
            .or_else(|| result["message"].as_str())
            .unwrap_or("unknown error");
        format!("✗ {name} failed: {reason}")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_create_success_names_the_file() {
        let r = json!({"success": true, "result": {"file_path": "hello.py"}});
        let s = summarize_tool_results(&[("file_create", &r)]);
        assert_eq!(s, "✓ file created: hello.py");
    }

    #[test]
    fn shell_failure_includes_the_reason() {
        let r = json!({"success": false, "error": "timeout after 30s: sleep 60"});
        let s = summarize_tool_results(&[("shell_exec", &r)]);
        assert!(s.starts_with("✗ shell_exec failed:"));
        assert!(s.contains("timeout"));
    }

    #[test]
    fn declined_edit_uses_message_field() {
        let r = json!({"success": false, "message": "Changes cancelled by user"});
        let s = summarize_tool_results(&[("file_edit", &r)]);
        assert!(s.contains("Changes cancelled by user"));
    }

    #[test]
    fn multiple_results_one_line_each() {
        let a = json!({"success": true, "result": {"file_path": "a"}});
        let b = json!({"success": false, "error": "nope"});
        let s = summarize_tool_results(&[("file_create", &a), ("grep", &b)]);
        assert_eq!(s.lines().count(), 2);
    }

    #[test]
    fn empty_execution_list_has_a_message() {
        assert!(!summarize_tool_results(&[]).is_empty());
    }
}
