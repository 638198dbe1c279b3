// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Batched file operations with optional all-or-nothing semantics.
//!
//! Applies an ordered list of create/edit operations.  With `atomic: true`,
//! a failure rolls back previously applied operations in reverse order:
//! created files are removed, edited files restored from their pre-edit
//! snapshot.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use crate::builtin::file_edit::{apply_edit, compute_preview};
use crate::tool::{EditPreview, Tool, ToolCall, ToolResult};

pub struct MultiEditTool {
    pub create_backup: bool,
}

impl Default for MultiEditTool {
    fn default() -> Self {
        Self { create_backup: true }
    }
}

#[derive(Debug, Clone)]
enum Op {
    Create { path: String, content: String },
    Edit { path: String, content: String },
}

fn parse_ops(call: &ToolCall) -> Result<Vec<Op>, String> {
    let Some(raw) = call.args.get("operations").and_then(Value::as_array) else {
        return Err("missing required 'operations' array".into());
    };
    if raw.is_empty() {
        return Err("'operations' array is empty".into());
    }
    let mut ops = Vec::with_capacity(raw.len());
    for (i, op) in raw.iter().enumerate() {
        let action = op["action"].as_str().unwrap_or("");
        let path = op["path"].as_str().map(str::to_string);
        let content = op["content"].as_str().map(str::to_string);
        let (Some(path), Some(content)) = (path, content) else {
            return Err(format!("operation {i} needs 'path' and 'content'"));
        };
        match action {
            "create" => ops.push(Op::Create { path, content }),
            "edit" => ops.push(Op::Edit { path, content }),
            other => return Err(format!("operation {i} has invalid action {other:?}")),
        }
    }
    Ok(ops)
}

/// What to do to undo one applied operation.
enum Undo {
    RemoveFile(String),
    Restore { path: String, content: String },
}

fn rollback(undos: Vec<Undo>) {
    for undo in undos.into_iter().rev() {
        let result = match &undo {
            Undo::RemoveFile(path) => std::fs::remove_file(path),
            Undo::Restore { path, content } => std::fs::write(path, content),
        };
        if let Err(e) = result {
            let path = match &undo {
                Undo::RemoveFile(p) | Undo::Restore { path: p, .. } => p,
            };
            warn!(path = %path, error = %e, "rollback step failed");
        }
    }
}

#[async_trait]
impl Tool for MultiEditTool {
    fn name(&self) -> &str {
        "multi_edit"
    }

    fn description(&self) -> &str {
        "Apply an ordered list of file operations. Each operation is \
         {action: \"create\"|\"edit\", path, content}. With 'atomic': true, a \
         failure rolls back everything already applied (created files are \
         removed, edited files restored)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operations": {
                    "type": "array",
                    "description": "Operations applied in order",
                    "items": {
                        "type": "object",
                        "properties": {
                            "action": { "type": "string", "enum": ["create", "edit"] },
                            "path": { "type": "string" },
                            "content": { "type": "string" }
                        },
                        "required": ["action", "path", "content"],
                        "additionalProperties": false
                    }
                },
                "atomic": {
                    "type": "boolean",
                    "description": "All-or-nothing (default false)"
                }
            },
            "required": ["operations"],
            "additionalProperties": false
        })
    }

    async fn preview(&self, call: &ToolCall) -> Vec<EditPreview> {
        let Ok(ops) = parse_ops(call) else {
            return Vec::new();
        };
        let mut previews = Vec::new();
        for op in &ops {
            if let Op::Edit { path, content } = op {
                if let Ok(p) = compute_preview(path, content) {
                    previews.push(p);
                }
            }
        }
        previews
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let ops = match parse_ops(call) {
            Ok(ops) => ops,
            Err(e) => return ToolResult::err(e),
        };
        let atomic = call.bool_arg("atomic").unwrap_or(false);

        let mut undos: Vec<Undo> = Vec::new();
        let mut applied: Vec<Value> = Vec::new();

        for (i, op) in ops.iter().enumerate() {
            let outcome: Result<(), String> = match op {
                Op::Create { path, content } => {
                    let target = std::path::Path::new(path);
                    if target.exists() {
                        Err(format!("{path} already exists"))
                    } else {
                        let created = target
                            .parent()
                            .filter(|p| !p.as_os_str().is_empty())
                            .map(|p| std::fs::create_dir_all(p))
                            .transpose()
                            .map_err(|e| format!("cannot create parents for {path}: {e}"))
                            .and_then(|_| {
                                std::fs::write(target, content)
                                    .map_err(|e| format!("cannot write {path}: {e}"))
                            });
                        if created.is_ok() {
                            undos.push(Undo::RemoveFile(path.clone()));
                        }
                        created
                    }
                }
                Op::Edit { path, content } => match std::fs::read_to_string(path) {
                    Err(e) => Err(format!("cannot read {path}: {e}")),
                    Ok(previous) => {
                        match apply_edit(path, content, self.create_backup) {
                            Ok(()) => {
                                undos.push(Undo::Restore { path: path.clone(), content: previous });
                                Ok(())
                            }
                            Err(e) => Err(e),
                        }
                    }
                },
            };

            match outcome {
                Ok(()) => {
                    let (action, path) = match op {
                        Op::Create { path, .. } => ("create", path),
                        Op::Edit { path, .. } => ("edit", path),
                    };
                    applied.push(json!({"action": action, "path": path}));
                }
                Err(e) => {
                    if atomic {
                        rollback(undos);
                        return ToolResult::err(format!(
                            "operation {i} failed ({e}); rolled back {} prior operation(s)",
                            applied.len()
                        ));
                    }
                    return ToolResult::err_with(
                        format!("operation {i} failed: {e}"),
                        json!({"applied": applied}),
                    );
                }
            }
        }

        ToolResult::ok(json!({"applied": applied, "count": applied.len()}))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn call(args: Value) -> ToolCall {
        ToolCall::new("t", "multi_edit", args)
    }

    #[tokio::test]
    async fn applies_operations_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&b, "old\n").unwrap();

        let out = MultiEditTool::default()
            .execute(&call(json!({
                "operations": [
                    {"action": "create", "path": a.to_str().unwrap(), "content": "new file\n"},
                    {"action": "edit", "path": b.to_str().unwrap(), "content": "edited\n"}
                ]
            })))
            .await;
        assert!(out.success, "{:?}", out.error);
        assert_eq!(std::fs::read_to_string(&a).unwrap(), "new file\n");
        assert_eq!(std::fs::read_to_string(&b).unwrap(), "edited\n");
    }

    #[tokio::test]
    async fn atomic_failure_rolls_back_first_operation() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.txt");
        std::fs::write(&first, "pre-edit\n").unwrap();

        let out = MultiEditTool::default()
            .execute(&call(json!({
                "atomic": true,
                "operations": [
                    {"action": "edit", "path": first.to_str().unwrap(), "content": "changed\n"},
                    {"action": "edit", "path": "/nonexistent/zzz.txt", "content": "x"}
                ]
            })))
            .await;
        assert!(!out.success);
        assert_eq!(
            std::fs::read_to_string(&first).unwrap(),
            "pre-edit\n",
            "first operation must be rolled back"
        );
    }

    #[tokio::test]
    async fn atomic_failure_removes_created_files() {
        let dir = tempfile::tempdir().unwrap();
        let created = dir.path().join("created.txt");

        let out = MultiEditTool::default()
            .execute(&call(json!({
                "atomic": true,
                "operations": [
                    {"action": "create", "path": created.to_str().unwrap(), "content": "x"},
                    {"action": "create", "path": created.to_str().unwrap(), "content": "dup"}
                ]
            })))
            .await;
        assert!(!out.success);
        assert!(!created.exists(), "created file must be removed on rollback");
    }

    #[tokio::test]
    async fn non_atomic_failure_keeps_prior_work_and_reports_it() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("kept.txt");

        let out = MultiEditTool::default()
            .execute(&call(json!({
                "operations": [
                    {"action": "create", "path": a.to_str().unwrap(), "content": "kept\n"},
                    {"action": "edit", "path": "/nonexistent/zzz.txt", "content": "x"}
                ]
            })))
            .await;
        assert!(!out.success);
        assert!(a.exists(), "non-atomic mode keeps applied operations");
        let r = out.result.unwrap();
        assert_eq!(r["applied"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn preview_reports_only_edit_operations() {
        let dir = tempfile::tempdir().unwrap();
        let b = dir.path().join("b.txt");
        std::fs::write(&b, "old\n").unwrap();

        let previews = MultiEditTool::default()
            .preview(&call(json!({
                "operations": [
                    {"action": "create", "path": "new.txt", "content": "n"},
                    {"action": "edit", "path": b.to_str().unwrap(), "content": "new\n"}
                ]
            })))
            .await;
        assert_eq!(previews.len(), 1);
        assert!(previews[0].diff.contains("-old"));
    }

    #[tokio::test]
    async fn invalid_action_is_a_tool_error() {
        let out = MultiEditTool::default()
            .execute(&call(json!({
                "operations": [{"action": "delete", "path": "x", "content": ""}]
            })))
            .await;
        assert!(!out.success);
    }
}
