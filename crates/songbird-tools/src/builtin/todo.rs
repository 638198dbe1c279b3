// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Todo tracking tools, backed by the per-project todo store.
//!
//! `todo_write` has upsert semantics: entries without an id are matched
//! against existing todos by normalized-content similarity before being
//! treated as new, so a model re-stating a task does not duplicate it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use songbird_session::{TodoItem, TodoStatus, TodoStore};

use crate::tool::{Tool, ToolCall, ToolResult};

pub struct TodoReadTool {
    pub store: Arc<TodoStore>,
}

#[async_trait]
impl Tool for TodoReadTool {
    fn name(&self) -> &str {
        "todo_read"
    }

    fn description(&self) -> &str {
        "List the project's todos. Optional 'status' filters to one status; \
         completed items are hidden unless 'show_completed' is true."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "enum": ["pending", "in_progress", "completed"],
                    "description": "Only return todos with this status"
                },
                "show_completed": {
                    "type": "boolean",
                    "description": "Include completed todos (default false)"
                }
            },
            "required": [],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let status_filter = match call.str_arg("status") {
            Some("pending") => Some(TodoStatus::Pending),
            Some("in_progress") => Some(TodoStatus::InProgress),
            Some("completed") => Some(TodoStatus::Completed),
            Some(other) => return ToolResult::err(format!("invalid status filter: {other}")),
            None => None,
        };
        let show_completed = call.bool_arg("show_completed").unwrap_or(false);

        let todos = match self.store.load() {
            Ok(t) => t,
            Err(e) => return ToolResult::err(format!("cannot load todos: {e}")),
        };
        let filtered: Vec<&TodoItem> = todos
            .iter()
            .filter(|t| match status_filter {
                Some(s) => t.status == s,
                None => show_completed || t.status != TodoStatus::Completed,
            })
            .collect();

        ToolResult::ok(json!({
            "todos": filtered,
            "count": filtered.len(),
        }))
    }
}

pub struct TodoWriteTool {
    pub store: Arc<TodoStore>,
    pub session_id: Option<String>,
}

#[async_trait]
impl Tool for TodoWriteTool {
    fn name(&self) -> &str {
        "todo_write"
    }

    fn description(&self) -> &str {
        "Create or update todos. Each entry has 'content' plus optional 'id', \
         'priority' (high|medium|low) and 'status' \
         (pending|in_progress|completed). Entries without an id that closely \
         match an existing todo update it instead of creating a duplicate."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "description": "Todo entries to upsert",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "content": { "type": "string" },
                            "priority": {
                                "type": "string",
                                "enum": ["high", "medium", "low"]
                            },
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed"]
                            }
                        },
                        "required": ["content"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["todos"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(raw) = call.args.get("todos").filter(|v| v.is_array()) else {
            return ToolResult::err("missing required 'todos' array");
        };
        let writes: Vec<songbird_session::TodoWrite> =
            match serde_json::from_value(raw.clone()) {
                Ok(w) => w,
                Err(e) => return ToolResult::err(format!("invalid todo entry: {e}")),
            };
        if writes.is_empty() {
            return ToolResult::err("'todos' array is empty");
        }

        debug!(count = writes.len(), "todo_write");
        match self.store.upsert(writes, self.session_id.as_deref()) {
            Ok(todos) => ToolResult::ok(json!({
                "todos": todos,
                "count": todos.len(),
            })),
            Err(e) => ToolResult::err(format!("cannot write todos: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tools() -> (tempfile::TempDir, TodoReadTool, TodoWriteTool) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TodoStore::new(dir.path(), 0.75));
        (
            dir,
            TodoReadTool { store: store.clone() },
            TodoWriteTool { store, session_id: Some("sess-1".into()) },
        )
    }

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall::new("t", name, args)
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let (_dir, read, write) = tools();
        let out = write
            .execute(&call(
                "todo_write",
                json!({"todos": [{"content": "add tests", "priority": "high"}]}),
            ))
            .await;
        assert!(out.success, "{:?}", out.error);

        let out = read.execute(&call("todo_read", json!({}))).await;
        let r = out.result.unwrap();
        assert_eq!(r["count"], 1);
        assert_eq!(r["todos"][0]["content"], "add tests");
        assert_eq!(r["todos"][0]["priority"], "high");
        assert_eq!(r["todos"][0]["session_id"], "sess-1");
    }

    #[tokio::test]
    async fn completed_todos_are_hidden_by_default() {
        let (_dir, read, write) = tools();
        write
            .execute(&call(
                "todo_write",
                json!({"todos": [
                    {"content": "done task", "status": "completed"},
                    {"content": "open task"}
                ]}),
            ))
            .await;

        let hidden = read.execute(&call("todo_read", json!({}))).await;
        assert_eq!(hidden.result.unwrap()["count"], 1);

        let shown = read
            .execute(&call("todo_read", json!({"show_completed": true})))
            .await;
        assert_eq!(shown.result.unwrap()["count"], 2);
    }

    #[tokio::test]
    async fn status_filter_selects_one_status() {
        let (_dir, read, write) = tools();
        write
            .execute(&call(
                "todo_write",
                json!({"todos": [
                    {"content": "a", "status": "in_progress"},
                    {"content": "b", "status": "pending"}
                ]}),
            ))
            .await;
        let out = read
            .execute(&call("todo_read", json!({"status": "in_progress"})))
            .await;
        let r = out.result.unwrap();
        assert_eq!(r["count"], 1);
        assert_eq!(r["todos"][0]["content"], "a");
    }

    #[tokio::test]
    async fn similar_content_updates_instead_of_duplicating() {
        let (_dir, read, write) = tools();
        write
            .execute(&call("todo_write", json!({"todos": [{"content": "fix login bug"}]})))
            .await;
        write
            .execute(&call(
                "todo_write",
                json!({"todos": [{"content": "fix login bug", "status": "completed"}]}),
            ))
            .await;

        let out = read
            .execute(&call("todo_read", json!({"show_completed": true})))
            .await;
        let r = out.result.unwrap();
        assert_eq!(r["count"], 1, "similar write must upsert");
        assert_eq!(r["todos"][0]["status"], "completed");
    }

    #[tokio::test]
    async fn missing_todos_array_is_a_tool_error() {
        let (_dir, _read, write) = tools();
        let out = write.execute(&call("todo_write", json!({}))).await;
        assert!(!out.success);
    }

    #[tokio::test]
    async fn invalid_status_filter_is_a_tool_error() {
        let (_dir, read, _write) = tools();
        let out = read
            .execute(&call("todo_read", json!({"status": "bogus"})))
            .await;
        assert!(!out.success);
    }
}
