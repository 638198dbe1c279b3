// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::builtin::file_search::{search_filenames, SearchMode, SearchParams};
use crate::tool::{Tool, ToolCall, ToolResult};

/// Thin wrapper over the search engine's glob mode.
pub struct GlobTool;

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files whose path matches a glob pattern, e.g. src/**/*.rs. \
         Returns matching file paths."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": "Glob pattern" },
                "directory": {
                    "type": "string",
                    "description": "Directory to search (default \".\")"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Result cap (default 50)"
                }
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(pattern) = call.str_arg("pattern") else {
            return ToolResult::err("missing required 'pattern' argument");
        };
        let directory = call.str_arg("directory").unwrap_or(".");
        if !std::path::Path::new(directory).is_dir() {
            return ToolResult::err(format!("directory not found: {directory}"));
        }
        let params = SearchParams {
            pattern,
            directory,
            file_type: None,
            case_sensitive: true,
            max_results: call.u64_arg("max_results").unwrap_or(50) as usize,
        };
        match search_filenames(&params, SearchMode::Glob) {
            Ok(matches) => ToolResult::ok(json!({
                "files": matches.iter().map(|m| m.file.clone()).collect::<Vec<_>>(),
                "count": matches.len(),
            })),
            Err(e) => ToolResult::err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn glob_finds_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/b.txt"), "").unwrap();

        let out = GlobTool
            .execute(&ToolCall::new(
                "t",
                "glob",
                json!({"pattern": "src/*.rs", "directory": dir.path().to_str().unwrap()}),
            ))
            .await;
        assert!(out.success);
        let r = out.result.unwrap();
        assert_eq!(r["count"], 1);
        assert!(r["files"][0].as_str().unwrap().ends_with("a.rs"));
    }

    #[tokio::test]
    async fn missing_pattern_is_a_tool_error() {
        let out = GlobTool.execute(&ToolCall::new("t", "glob", json!({}))).await;
        assert!(!out.success);
    }
}
