// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolCall, ToolResult};

/// Create a new file.  Fails if the file already exists (use file_edit for
/// changes); parent directories are created as needed.
pub struct FileCreateTool;

#[async_trait]
impl Tool for FileCreateTool {
    fn name(&self) -> &str {
        "file_create"
    }

    fn description(&self) -> &str {
        "Create a new file with the given content. Fails if the file exists \
         (use file_edit to change an existing file). Parent directories are \
         created automatically."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path of the file to create" },
                "content": { "type": "string", "description": "Full file content" }
            },
            "required": ["path", "content"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(path) = call.str_arg("path") else {
            return ToolResult::err("missing required 'path' argument");
        };
        let Some(content) = call.str_arg("content") else {
            return ToolResult::err("missing required 'content' argument");
        };

        let target = std::path::Path::new(path);
        if target.exists() {
            return ToolResult::err(format!("{path} already exists; use file_edit to change it"));
        }
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolResult::err(format!("cannot create parent directories: {e}"));
            }
        }
        if let Err(e) = tokio::fs::write(target, content).await {
            return ToolResult::err(format!("cannot write {path}: {e}"));
        }

        ToolResult::ok(json!({
            "file_path": path,
            "bytes_written": content.len(),
        }))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn call(args: Value) -> ToolCall {
        ToolCall::new("t", "file_create", args)
    }

    #[tokio::test]
    async fn creates_file_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.py");
        let out = FileCreateTool
            .execute(&call(json!({
                "path": path.to_str().unwrap(),
                "content": "print(\"Hello, World!\")\n"
            })))
            .await;
        assert!(out.success);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "print(\"Hello, World!\")\n"
        );
    }

    #[tokio::test]
    async fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c/deep.txt");
        let out = FileCreateTool
            .execute(&call(json!({
                "path": path.to_str().unwrap(),
                "content": "x"
            })))
            .await;
        assert!(out.success);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn refuses_to_overwrite_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("existing.txt");
        std::fs::write(&path, "original").unwrap();

        let out = FileCreateTool
            .execute(&call(json!({
                "path": path.to_str().unwrap(),
                "content": "clobbered"
            })))
            .await;
        assert!(!out.success);
        assert!(out.error.unwrap().contains("already exists"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
    }

    #[tokio::test]
    async fn missing_arguments_are_tool_errors() {
        let out = FileCreateTool.execute(&call(json!({"path": "/tmp/x"}))).await;
        assert!(!out.success);
        assert!(out.error.unwrap().contains("content"));
    }
}
