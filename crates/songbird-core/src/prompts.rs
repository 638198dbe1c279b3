// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! System prompt and prompt-construction helpers.

/// Instruction paragraph appended (as a transient user message, never
/// persisted) when the synthesizing follow-up turn is sent after tools ran.
pub const FOLLOW_UP_INSTRUCTIONS: &str =
    "The tool outputs above have already been displayed to the user. \
     Acknowledge the results and answer the request; do NOT repeat raw tool \
     output or re-print file contents.";

/// Build the system prompt for a session rooted at `project_root`.
pub fn system_prompt(project_root: &str, custom: Option<&str>) -> String {
    if let Some(text) = custom {
        return text.to_string();
    }
    format!(
        "You are Songbird, an AI coding assistant working in {project_root}.\n\
         \n\
         You have tools for interacting with the file system and terminal:\n\
         - file_search / glob / grep: find files and content\n\
         - file_read: read a file\n\
         - file_create: create a new file\n\
         - file_edit / multi_edit: change existing files (the user confirms a diff first)\n\
         - shell_exec: run a shell command\n\
         - todo_read / todo_write: track multi-step work\n\
         \n\
         Always use the appropriate tool when asked to perform file or \
         terminal operations; never claim you cannot do something these \
         tools enable. Prefer small, focused changes, and explain what you \
         did after the tools run."
    )
}
