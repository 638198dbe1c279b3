// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};

/// A single tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier from the model (forwarded verbatim)
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments
    pub args: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self { id: id.into(), name: name.into(), args }
    }

    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }

    pub fn u64_arg(&self, key: &str) -> Option<u64> {
        self.args.get(key).and_then(Value::as_u64)
    }

    pub fn bool_arg(&self, key: &str) -> Option<bool> {
        self.args.get(key).and_then(Value::as_bool)
    }
}

/// The result of executing a tool: `{success, result?, error?}`.
///
/// Failures never raise out of the tool boundary; they are encoded here and
/// the loop continues so the model can react.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl ToolResult {
    /// Successful result with a structured payload.
    pub fn ok(result: Value) -> Self {
        Self { success: true, result: Some(result), error: None }
    }

    /// Failure with a human-readable message.
    pub fn err(message: impl Into<String>) -> Self {
        Self { success: false, result: None, error: Some(message.into()) }
    }

    /// Failure that still carries a structured payload (e.g. a declined edit
    /// reporting which file was left untouched).
    pub fn err_with(message: impl Into<String>, result: Value) -> Self {
        Self { success: false, result: Some(result), error: Some(message.into()) }
    }

    /// The wire form placed into a tool message's content.
    pub fn to_value(&self) -> Value {
        let mut v = json!({ "success": self.success });
        if let Some(result) = &self.result {
            v["result"] = result.clone();
        }
        if let Some(error) = &self.error {
            v["error"] = json!(error);
        }
        v
    }
}

/// Preview of a destructive file change, shown before it is applied.
#[derive(Debug, Clone)]
pub struct EditPreview {
    pub path: String,
    /// Unified diff of the pending change; empty when `changes_made` is false.
    pub diff: String,
    pub changes_made: bool,
}

/// Trait every built-in tool implements.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Diff previews for tools that mutate existing files.
    ///
    /// The orchestrator calls this before `execute` and routes each preview
    /// through the confirmation gate.  Read-only tools use the default.
    /// Preview is pure: it never touches the filesystem beyond reading.
    async fn preview(&self, _call: &ToolCall) -> Vec<EditPreview> {
        Vec::new()
    }

    /// Execute the tool.  Errors are wrapped in [`ToolResult::err`].
    async fn execute(&self, call: &ToolCall) -> ToolResult;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_result_serializes_success_and_result() {
        let r = ToolResult::ok(json!({"file_path": "a.txt"}));
        let v = r.to_value();
        assert_eq!(v["success"], true);
        assert_eq!(v["result"]["file_path"], "a.txt");
        assert!(v.get("error").is_none());
    }

    #[test]
    fn err_result_serializes_error_without_result() {
        let r = ToolResult::err("file not found");
        let v = r.to_value();
        assert_eq!(v["success"], false);
        assert_eq!(v["error"], "file not found");
        assert!(v.get("result").is_none());
    }

    #[test]
    fn err_with_keeps_both_fields() {
        let r = ToolResult::err_with("Changes cancelled by user", json!({"file_path": "x"}));
        let v = r.to_value();
        assert_eq!(v["success"], false);
        assert_eq!(v["error"], "Changes cancelled by user");
        assert_eq!(v["result"]["file_path"], "x");
    }

    #[test]
    fn typed_arg_accessors() {
        let call = ToolCall::new("1", "t", json!({"s": "x", "n": 3, "b": true}));
        assert_eq!(call.str_arg("s"), Some("x"));
        assert_eq!(call.u64_arg("n"), Some(3));
        assert_eq!(call.bool_arg("b"), Some(true));
        assert_eq!(call.str_arg("missing"), None);
    }
}
