// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
pub mod builtin;
pub mod denylist;
mod registry;
mod tool;

pub use builtin::file_create::FileCreateTool;
pub use builtin::file_edit::FileEditTool;
pub use builtin::file_read::FileReadTool;
pub use builtin::file_search::FileSearchTool;
pub use builtin::glob::GlobTool;
pub use builtin::grep::GrepTool;
pub use builtin::ls::LsTool;
pub use builtin::multi_edit::MultiEditTool;
pub use builtin::shell_exec::ShellExecTool;
pub use builtin::todo::{TodoReadTool, TodoWriteTool};
pub use registry::{ToolRegistry, ToolSchema};
pub use tool::{EditPreview, Tool, ToolCall, ToolResult};

use std::sync::Arc;

use songbird_config::ToolsConfig;
use songbird_session::TodoStore;

/// Build the standard registry: every mandatory tool, configured from
/// `ToolsConfig` and bound to the project's todo store.
pub fn standard_registry(
    config: &ToolsConfig,
    project_dir: &std::path::Path,
    session_id: Option<String>,
) -> ToolRegistry {
    let todo_store = Arc::new(TodoStore::new(project_dir, config.todo_similarity_threshold));

    let mut registry = ToolRegistry::new();
    registry.register(FileSearchTool);
    registry.register(FileReadTool);
    registry.register(FileCreateTool);
    registry.register(FileEditTool { create_backup: config.create_backups });
    registry.register(ShellExecTool {
        timeout_secs: config.shell_timeout_secs,
        max_output_size: config.shell_output_cap,
        extra_denylist: denylist::ExtraDenylist::from_globs(&config.deny_patterns),
    });
    registry.register(TodoReadTool { store: todo_store.clone() });
    registry.register(TodoWriteTool { store: todo_store, session_id });
    registry.register(GlobTool);
    registry.register(GrepTool);
    registry.register(LsTool);
    registry.register(MultiEditTool { create_backup: config.create_backups });
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_contains_every_mandatory_tool() {
        let dir = tempfile::tempdir().unwrap();
        let reg = standard_registry(&ToolsConfig::default(), dir.path(), None);
        for name in [
            "file_search",
            "file_read",
            "file_create",
            "file_edit",
            "shell_exec",
            "todo_read",
            "todo_write",
            "glob",
            "grep",
            "ls",
            "multi_edit",
        ] {
            assert!(reg.get(name).is_some(), "missing tool: {name}");
        }
    }

    #[test]
    fn standard_registry_schemas_are_wire_ready() {
        let dir = tempfile::tempdir().unwrap();
        let reg = standard_registry(&ToolsConfig::default(), dir.path(), None);
        for schema in reg.schemas() {
            assert!(!schema.name.is_empty());
            assert!(!schema.description.is_empty());
            assert_eq!(schema.parameters["type"], "object");
            assert!(schema.parameters["properties"].is_object());
            assert!(schema.parameters["required"].is_array());
        }
    }
}
