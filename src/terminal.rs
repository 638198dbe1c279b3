// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Plain-terminal implementation of the core's UI port.
//!
//! Deliberately minimal: a one-line status indicator, a unified-diff dump,
//! and a y/n prompt.  The richer TUI lives outside this binary; everything
//! here exists so the confirmation gate and status contract work in a bare
//! terminal.

use std::io::Write;

use async_trait::async_trait;
use songbird_core::{AskOutcome, StatusHandle, UiPort};

pub struct TerminalUi;

/// Status line shown while the agent is thinking.  Stopping erases the line
/// so subsequent prompts and diffs render cleanly.
struct LineStatus {
    active: bool,
    label_len: usize,
}

impl StatusHandle for LineStatus {
    fn stop(&mut self) {
        if self.active {
            self.active = false;
            // Erase the status line.
            eprint!("\r{}\r", " ".repeat(self.label_len + 4));
            let _ = std::io::stderr().flush();
        }
    }
}

impl Drop for LineStatus {
    fn drop(&mut self) {
        self.stop();
    }
}

#[async_trait]
impl UiPort for TerminalUi {
    fn show_diff(&self, path: &str, unified_diff: &str) {
        println!("\n─── proposed change: {path} ───");
        for line in unified_diff.lines() {
            println!("{line}");
        }
        println!("──────────────────────────────");
    }

    async fn ask(&self, title: &str, options: &[&str], default_index: usize) -> AskOutcome {
        let rendered: Vec<String> = options
            .iter()
            .enumerate()
            .map(|(i, o)| {
                if i == default_index {
                    format!("[{}]", o)
                } else {
                    o.to_string()
                }
            })
            .collect();
        print!("{title} {} ", rendered.join("/"));
        let _ = std::io::stdout().flush();

        // Blocking read moved off the event loop.
        let line = tokio::task::spawn_blocking(|| {
            let mut buf = String::new();
            std::io::stdin().read_line(&mut buf).map(|_| buf)
        })
        .await;

        let answer = match line {
            Ok(Ok(text)) => text.trim().to_lowercase(),
            _ => return AskOutcome::Canceled,
        };
        if answer.is_empty() {
            return AskOutcome::Selected(default_index);
        }
        let index = options.iter().position(|o| {
            let lower = o.to_lowercase();
            lower == answer || lower.starts_with(&answer)
        });
        match index {
            Some(i) => AskOutcome::Selected(i),
            None => AskOutcome::Canceled,
        }
    }

    fn show_status(&self, label: &str) -> Box<dyn StatusHandle> {
        eprint!("{label}…");
        let _ = std::io::stderr().flush();
        Box::new(LineStatus { active: true, label_len: label.len() })
    }

    fn show_error(&self, message: &str, hints: &[String]) {
        eprintln!("error: {message}");
        for hint in hints.iter().take(3) {
            eprintln!("  hint: {hint}");
        }
    }
}
