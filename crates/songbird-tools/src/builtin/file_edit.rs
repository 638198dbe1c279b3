// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Diff-gated file editing.
//!
//! Two phases: `preview` computes a unified diff of the pending change (pure,
//! read-only); `execute` applies it with an atomic temp-file + rename write
//! and an optional `.bak` sibling.  The orchestrator interposes the
//! confirmation gate between the phases.

use async_trait::async_trait;
use serde_json::{json, Value};
use similar::TextDiff;

use crate::tool::{EditPreview, Tool, ToolCall, ToolResult};

pub struct FileEditTool {
    pub create_backup: bool,
}

impl Default for FileEditTool {
    fn default() -> Self {
        Self { create_backup: true }
    }
}

/// Compute the unified diff preview for replacing `path`'s content.
pub(crate) fn compute_preview(path: &str, new_content: &str) -> Result<EditPreview, String> {
    let old = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {path}: {e}"))?;
    if old == new_content {
        return Ok(EditPreview { path: path.to_string(), diff: String::new(), changes_made: false });
    }
    let diff = TextDiff::from_lines(old.as_str(), new_content)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string();
    Ok(EditPreview { path: path.to_string(), diff, changes_made: true })
}

/// Replace `path`'s content atomically; optionally keep a `.bak` sibling of
/// the previous content.
pub(crate) fn apply_edit(path: &str, new_content: &str, backup: bool) -> Result<(), String> {
    let target = std::path::Path::new(path);
    let dir = target.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));

    if backup {
        let bak = format!("{path}.bak");
        std::fs::copy(target, &bak).map_err(|e| format!("cannot write backup {bak}: {e}"))?;
    }

    let tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| format!("cannot create temp file: {e}"))?;
    std::fs::write(tmp.path(), new_content).map_err(|e| format!("cannot write temp file: {e}"))?;
    tmp.persist(target).map_err(|e| format!("cannot replace {path}: {e}"))?;
    Ok(())
}

#[async_trait]
impl Tool for FileEditTool {
    fn name(&self) -> &str {
        "file_edit"
    }

    fn description(&self) -> &str {
        "Replace the content of an existing file. A unified diff of the \
         change is shown to the user for confirmation before anything is \
         written; the previous content is kept as a .bak sibling."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to edit" },
                "new_content": { "type": "string", "description": "Complete new file content" }
            },
            "required": ["path", "new_content"],
            "additionalProperties": false
        })
    }

    async fn preview(&self, call: &ToolCall) -> Vec<EditPreview> {
        let (Some(path), Some(new_content)) = (call.str_arg("path"), call.str_arg("new_content"))
        else {
            return Vec::new();
        };
        match compute_preview(path, new_content) {
            Ok(p) => vec![p],
            // Preview failures surface in execute with a proper error.
            Err(_) => Vec::new(),
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(path) = call.str_arg("path") else {
            return ToolResult::err("missing required 'path' argument");
        };
        let Some(new_content) = call.str_arg("new_content") else {
            return ToolResult::err("missing required 'new_content' argument");
        };

        let preview = match compute_preview(path, new_content) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e),
        };
        if !preview.changes_made {
            return ToolResult::ok(json!({
                "file_path": path,
                "changes_made": false,
                "message": "no changes needed; file content is already as requested",
            }));
        }

        if let Err(e) = apply_edit(path, new_content, self.create_backup) {
            return ToolResult::err(e);
        }
        ToolResult::ok(json!({
            "file_path": path,
            "changes_made": true,
            "backup_created": self.create_backup,
        }))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn call(args: Value) -> ToolCall {
        ToolCall::new("t", "file_edit", args)
    }

    #[tokio::test]
    async fn preview_contains_removed_and_added_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.txt");
        std::fs::write(&path, "a\nb\n").unwrap();

        let previews = FileEditTool::default()
            .preview(&call(json!({
                "path": path.to_str().unwrap(),
                "new_content": "a\nc\n"
            })))
            .await;
        assert_eq!(previews.len(), 1);
        assert!(previews[0].changes_made);
        assert!(previews[0].diff.contains("-b"));
        assert!(previews[0].diff.contains("+c"));
        // Preview must not touch the file.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\n");
    }

    #[tokio::test]
    async fn identical_content_reports_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("same.txt");
        std::fs::write(&path, "same\n").unwrap();

        let out = FileEditTool::default()
            .execute(&call(json!({
                "path": path.to_str().unwrap(),
                "new_content": "same\n"
            })))
            .await;
        assert!(out.success);
        assert_eq!(out.result.unwrap()["changes_made"], false);
    }

    #[tokio::test]
    async fn execute_writes_new_content_and_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.txt");
        std::fs::write(&path, "old\n").unwrap();

        let out = FileEditTool::default()
            .execute(&call(json!({
                "path": path.to_str().unwrap(),
                "new_content": "new\n"
            })))
            .await;
        assert!(out.success);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new\n");
        let bak = format!("{}.bak", path.to_str().unwrap());
        assert_eq!(std::fs::read_to_string(bak).unwrap(), "old\n");
    }

    #[tokio::test]
    async fn backup_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.txt");
        std::fs::write(&path, "old\n").unwrap();

        let tool = FileEditTool { create_backup: false };
        let out = tool
            .execute(&call(json!({
                "path": path.to_str().unwrap(),
                "new_content": "new\n"
            })))
            .await;
        assert!(out.success);
        assert!(!dir.path().join("foo.txt.bak").exists());
    }

    #[tokio::test]
    async fn editing_a_missing_file_is_a_tool_error() {
        let out = FileEditTool::default()
            .execute(&call(json!({
                "path": "/nonexistent/zzz.txt",
                "new_content": "x"
            })))
            .await;
        assert!(!out.success);
    }

    #[tokio::test]
    async fn preview_of_missing_file_is_empty() {
        let previews = FileEditTool::default()
            .preview(&call(json!({"path": "/nonexistent/zzz.txt", "new_content": "x"})))
            .await;
        assert!(previews.is_empty());
    }
}
