// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The narrow interface the core consumes from the outside world.
//!
//! The TUI proper lives outside this workspace's core; everything the
//! orchestrator needs from a front end is the diff display, a yes/no
//! question, a stoppable status line, and an interrupt hook.  A headless
//! implementation ([`AutoApplyUi`]) answers every question with its default,
//! which is what `SONGBIRD_AUTO_APPLY=y` turns on.

use async_trait::async_trait;

/// Result of a confirmation question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskOutcome {
    Selected(usize),
    Canceled,
}

/// A running status indicator.  `stop` must be idempotent; the orchestrator
/// stops any live handle before asking a question or streaming raw tool
/// output so a spinner cannot clobber the terminal.
pub trait StatusHandle: Send {
    fn stop(&mut self);
}

/// No-op handle for headless runs.
pub struct NullStatus;

impl StatusHandle for NullStatus {
    fn stop(&mut self) {}
}

#[async_trait]
pub trait UiPort: Send + Sync {
    /// Present a unified diff for the file about to change.
    fn show_diff(&self, path: &str, unified_diff: &str);

    /// Ask the user to pick an option.  Resolves before any following tool
    /// executes; `default_index` is what Enter (or headless mode) picks.
    async fn ask(&self, title: &str, options: &[&str], default_index: usize) -> AskOutcome;

    /// Start a status indicator with the given label.
    fn show_status(&self, label: &str) -> Box<dyn StatusHandle>;

    /// Register an interrupt callback (first Ctrl-C tap).  Front ends that
    /// deliver cancellation some other way keep the default no-op.
    fn on_interrupt(&self, _callback: Box<dyn Fn() + Send + Sync>) {}

    /// Display a short error with remediation hints.
    fn show_error(&self, message: &str, hints: &[String]);
}

/// Headless UI: every question resolves to its default, nothing renders.
pub struct AutoApplyUi;

#[async_trait]
impl UiPort for AutoApplyUi {
    fn show_diff(&self, _path: &str, _unified_diff: &str) {}

    async fn ask(&self, _title: &str, _options: &[&str], default_index: usize) -> AskOutcome {
        AskOutcome::Selected(default_index)
    }

    fn show_status(&self, _label: &str) -> Box<dyn StatusHandle> {
        Box::new(NullStatus)
    }

    fn show_error(&self, message: &str, hints: &[String]) {
        tracing::warn!(message, ?hints, "provider error in headless mode");
    }
}
