// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use crate::denylist::{deny_reason, ExtraDenylist};
use crate::tool::{Tool, ToolCall, ToolResult};

/// Run a shell command with a hard timeout and capped output capture.
pub struct ShellExecTool {
    pub timeout_secs: u64,
    pub max_output_size: usize,
    pub extra_denylist: ExtraDenylist,
}

impl Default for ShellExecTool {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_output_size: 4096,
            extra_denylist: ExtraDenylist::default(),
        }
    }
}

#[async_trait]
impl Tool for ShellExecTool {
    fn name(&self) -> &str {
        "shell_exec"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return exit code, stdout, and stderr.\n\
         Output is capped (default 4096 bytes per stream) with a truncation \
         flag; the process is killed after the timeout (default 30 s).\n\
         Patently destructive commands (recursive root deletion, raw disk \
         writes, fork bombs) are refused.\n\
         Prefer the dedicated tools over shell for file work:\n\
         - read files with file_read, not cat\n\
         - search with file_search/grep, not grep -r\n\
         - edit with file_edit, not sed"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Shell command to run" },
                "working_dir": {
                    "type": "string",
                    "description": "Working directory (default: current)"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (default 30)"
                },
                "max_output_size": {
                    "type": "integer",
                    "description": "Byte cap per output stream (default 4096)"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(command) = call.str_arg("command") else {
            return ToolResult::err("missing required 'command' argument");
        };
        let working_dir = call.str_arg("working_dir").map(str::to_string);
        let timeout = call.u64_arg("timeout").unwrap_or(self.timeout_secs);
        let cap = call.u64_arg("max_output_size").unwrap_or(self.max_output_size as u64) as usize;

        // Denylist check happens before any subprocess exists.
        if let Some(reason) = deny_reason(command) {
            return ToolResult::err(format!("refused by denylist ({reason}): {command}"));
        }
        if self.extra_denylist.matches(command) {
            return ToolResult::err(format!("refused by configured deny pattern: {command}"));
        }

        debug!(cmd = %command, "executing shell command");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        // Detach from the terminal: no stdin, and (on unix) a new session so
        // the child cannot reach /dev/tty and corrupt the UI.
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }
        if let Some(wd) = &working_dir {
            cmd.current_dir(wd);
        }

        let result =
            tokio::time::timeout(std::time::Duration::from_secs(timeout), cmd.output()).await;

        match result {
            Ok(Ok(output)) => {
                let (stdout, out_trunc) = cap_output(&output.stdout, cap);
                let (stderr, err_trunc) = cap_output(&output.stderr, cap);
                let truncated = out_trunc || err_trunc;

                let mut result = json!({
                    "exit_code": output.status.code().unwrap_or(-1),
                    "stdout": stdout,
                    "stderr": stderr,
                    "command": command,
                    "working_dir": working_dir.unwrap_or_else(|| ".".into()),
                });
                if truncated {
                    result["output_truncated"] = json!(true);
                }
                ToolResult::ok(result)
            }
            Ok(Err(e)) => ToolResult::err(format!("spawn error: {e}")),
            // The timeout dropped the future; kill_on_drop delivered SIGKILL.
            Err(_) => ToolResult::err(format!("timeout after {timeout}s: {command}")),
        }
    }
}

/// Cap one output stream at `cap` bytes (on a char boundary), reporting
/// whether anything was dropped.
fn cap_output(bytes: &[u8], cap: usize) -> (String, bool) {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= cap {
        return (text.into_owned(), false);
    }
    let mut end = cap;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    (text[..end].to_string(), true)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
