// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolCall, ToolResult};

/// Directory listing with sort and filter options.
pub struct LsTool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortKey {
    Name,
    Size,
    Modified,
}

#[async_trait]
impl Tool for LsTool {
    fn name(&self) -> &str {
        "ls"
    }

    fn description(&self) -> &str {
        "List a directory. Entries carry name, type, and size. Options: \
         'sort_by' (name|size|modified), 'show_hidden' (default false), \
         'filter' (substring of the name)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Directory (default \".\")" },
                "sort_by": {
                    "type": "string",
                    "enum": ["name", "size", "modified"],
                    "description": "Sort order (default name)"
                },
                "show_hidden": {
                    "type": "boolean",
                    "description": "Include dotfiles (default false)"
                },
                "filter": {
                    "type": "string",
                    "description": "Only entries whose name contains this substring"
                }
            },
            "required": [],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let path = call.str_arg("path").unwrap_or(".");
        let show_hidden = call.bool_arg("show_hidden").unwrap_or(false);
        let filter = call.str_arg("filter").map(str::to_lowercase);
        let sort_by = match call.str_arg("sort_by") {
            Some("size") => SortKey::Size,
            Some("modified") => SortKey::Modified,
            Some("name") | None => SortKey::Name,
            Some(other) => return ToolResult::err(format!("invalid sort_by: {other}")),
        };

        let read_dir = match std::fs::read_dir(path) {
            Ok(rd) => rd,
            Err(e) => return ToolResult::err(format!("cannot list {path}: {e}")),
        };

        let mut entries: Vec<(String, bool, u64, std::time::SystemTime)> = Vec::new();
        for entry in read_dir.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !show_hidden && name.starts_with('.') {
                continue;
            }
            if let Some(f) = &filter {
                if !name.to_lowercase().contains(f) {
                    continue;
                }
            }
            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(_) => continue,
            };
            let modified = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            entries.push((name, meta.is_dir(), meta.len(), modified));
        }

        match sort_by {
            SortKey::Name => entries.sort_by(|a, b| a.0.cmp(&b.0)),
            SortKey::Size => entries.sort_by(|a, b| b.2.cmp(&a.2)),
            SortKey::Modified => entries.sort_by(|a, b| b.3.cmp(&a.3)),
        }

        let listed: Vec<Value> = entries
            .iter()
            .map(|(name, is_dir, size, _)| {
                json!({
                    "name": name,
                    "type": if *is_dir { "dir" } else { "file" },
                    "size": size,
                })
            })
            .collect();

        ToolResult::ok(json!({
            "path": path,
            "entries": listed,
            "count": listed.len(),
        }))
    }
}
