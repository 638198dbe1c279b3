// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolCall, ToolResult};

/// Largest file returned whole.  Bigger files must be read in line ranges.
const MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Read a UTF-8 text file, optionally restricted to a line window.
pub struct FileReadTool;

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read a text file. Rejects binaries and files over 1 MiB.\n\
         Optional: 'start_line' (1-based) and 'lines' select a window."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to read" },
                "start_line": {
                    "type": "integer",
                    "description": "First line to return, 1-based (default 1)"
                },
                "lines": {
                    "type": "integer",
                    "description": "Number of lines to return (default: all)"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(path) = call.str_arg("path") else {
            return ToolResult::err("missing required 'path' argument");
        };

        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) => return ToolResult::err(format!("cannot read {path}: {e}")),
        };
        if metadata.is_dir() {
            return ToolResult::err(format!("{path} is a directory; use ls"));
        }
        if metadata.len() > MAX_FILE_BYTES {
            return ToolResult::err(format!(
                "{path} is {} bytes, over the 1 MiB read limit; read it in line ranges",
                metadata.len()
            ));
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) => return ToolResult::err(format!("cannot read {path}: {e}")),
        };
        let content = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(_) => return ToolResult::err(format!("{path} is not valid UTF-8 (binary file?)")),
        };

        let total_lines = content.lines().count();
        let start = call.u64_arg("start_line").unwrap_or(1).max(1) as usize;
        let count = call.u64_arg("lines").map(|n| n as usize);

        let selected: String = match count {
            None if start == 1 => content.clone(),
            _ => {
                let take = count.unwrap_or(usize::MAX);
                content
                    .lines()
                    .skip(start - 1)
                    .take(take)
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        };

        ToolResult::ok(json!({
            "file_path": path,
            "content": selected,
            "total_lines": total_lines,
            "start_line": start,
            "size_bytes": metadata.len(),
        }))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn call(args: Value) -> ToolCall {
        ToolCall::new("t", "file_read", args)
    }

    #[tokio::test]
    async fn reads_whole_file_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "one\ntwo\nthree\n").unwrap();

        let out = FileReadTool
            .execute(&call(json!({"path": path.to_str().unwrap()})))
            .await;
        assert!(out.success);
        let r = out.result.unwrap();
        assert_eq!(r["content"], "one\ntwo\nthree\n");
        assert_eq!(r["total_lines"], 3);
    }

    #[tokio::test]
    async fn line_window_selects_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "1\n2\n3\n4\n5\n").unwrap();

        let out = FileReadTool
            .execute(&call(json!({
                "path": path.to_str().unwrap(),
                "start_line": 2,
                "lines": 2
            })))
            .await;
        let r = out.result.unwrap();
        assert_eq!(r["content"], "2\n3");
    }

    #[tokio::test]
    async fn missing_file_is_a_tool_error() {
        let out = FileReadTool
            .execute(&call(json!({"path": "/nonexistent/xyz.txt"})))
            .await;
        assert!(!out.success);
    }

    #[tokio::test]
    async fn binary_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin.dat");
        std::fs::write(&path, [0u8, 159, 146, 150]).unwrap();

        let out = FileReadTool
            .execute(&call(json!({"path": path.to_str().unwrap()})))
            .await;
        assert!(!out.success);
        assert!(out.error.unwrap().contains("UTF-8"));
    }

    #[tokio::test]
    async fn oversized_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "x".repeat((MAX_FILE_BYTES + 1) as usize)).unwrap();

        let out = FileReadTool
            .execute(&call(json!({"path": path.to_str().unwrap()})))
            .await;
        assert!(!out.success);
        assert!(out.error.unwrap().contains("1 MiB"));
    }

    #[tokio::test]
    async fn directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let out = FileReadTool
            .execute(&call(json!({"path": dir.path().to_str().unwrap()})))
            .await;
        assert!(!out.success);
        assert!(out.error.unwrap().contains("directory"));
    }
}
