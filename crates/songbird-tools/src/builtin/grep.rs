// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::builtin::file_search::{search_text, SearchMatch, SearchParams};
use crate::tool::{Tool, ToolCall, ToolResult};

/// Thin wrapper over the search engine's content-regex mode.
pub struct GrepTool;

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search file contents with a regex. Returns matches as \
         {file, line_number, match_text}."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": "Content regex" },
                "directory": {
                    "type": "string",
                    "description": "Directory to search (default \".\")"
                },
                "file_type": {
                    "type": "string",
                    "description": "Restrict to one extension, e.g. \"rs\""
                },
                "case_sensitive": {
                    "type": "boolean",
                    "description": "Match case exactly (default false)"
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
            file_type: call.str_arg("file_type"),
            case_sensitive: call.bool_arg("case_sensitive").unwrap_or(false),
            max_results: call.u64_arg("max_results").unwrap_or(50) as usize,
        };
        match search_text(&params).await {
            Ok(matches) => ToolResult::ok(json!({
                "matches": matches.iter().map(SearchMatch::to_value).collect::<Vec<_>>(),
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
    async fn grep_finds_content_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.txt"), "alpha\nbeta\ngamma\n").unwrap();

        let out = GrepTool
            .execute(&ToolCall::new(
                "t",
                "grep",
                json!({"pattern": "beta", "directory": dir.path().to_str().unwrap()}),
            ))
            .await;
        assert!(out.success);
        let r = out.result.unwrap();
        assert_eq!(r["count"], 1);
        assert_eq!(r["matches"][0]["line_number"], 2);
    }

    #[tokio::test]
    async fn invalid_regex_is_a_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = GrepTool
            .execute(&ToolCall::new(
                "t",
                "grep",
                json!({"pattern": "([unclosed", "directory": dir.path().to_str().unwrap()}),
            ))
            .await;
        assert!(!out.success);
    }
}
