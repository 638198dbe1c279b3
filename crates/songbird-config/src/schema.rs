// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Serde default helper — returns `true`.
///
/// `#[serde(default)]` on a `bool` always falls back to `bool::default()`
/// (i.e. `false`), so enabled-by-default fields need a named function.
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Named provider configurations.
    ///
    /// Define custom endpoints or additional accounts here and reference them
    /// by name with `--model <key>` or `--model <key>/<model>`.
    ///
    /// ```yaml
    /// providers:
    ///   local:
    ///     provider: ollama
    ///     base_url: http://localhost:11434/v1
    ///     name: qwen2.5-coder
    /// ```
    #[serde(default)]
    pub providers: std::collections::HashMap<String, ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider identifier.  Run `songbird --list-providers` for the full
    /// list.  Common values: "openai" | "anthropic" | "gemini" | "openrouter"
    /// | "ollama" | "mock"
    pub provider: String,
    /// Model name forwarded to the provider API
    pub name: String,
    /// Environment variable that holds the API key (read at runtime)
    pub api_key_env: Option<String>,
    /// Explicit API key; prefer api_key_env in config files to avoid secrets
    /// in version-controlled files
    pub api_key: Option<String>,
    /// Base URL override.  Useful for local servers and proxies.  For hosted
    /// providers the correct default is auto-selected from the registry.
    pub base_url: Option<String>,
    /// Maximum tokens to request in a single completion
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0–2.0)
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            name: "gpt-4o".into(),
            // api_key_env is intentionally None: the driver registry already
            // knows the canonical env-var name for each provider, and a
            // hard-coded value here would shadow that lookup when the provider
            // is overridden on the command line.
            api_key_env: None,
            api_key: None,
            base_url: None,
            max_tokens: Some(4096),
            temperature: Some(0.2),
        }
    }
}

fn default_max_tool_iterations() -> u32 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of model invocations in a single user turn.  Exceeding
    /// the bound aborts the turn with a terminal assistant message.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
    /// Disable heavy auxiliary features (auto-todo creation, LLM-based
    /// classification) for lower latency.  Also settable via
    /// `SONGBIRD_FAST_MODE=1`.
    #[serde(default)]
    pub fast_mode: bool,
    /// Override the built-in system prompt.
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            fast_mode: false,
            system_prompt: None,
        }
    }
}

fn default_shell_timeout() -> u64 {
    30
}
fn default_shell_output_cap() -> usize {
    4096
}
fn default_todo_similarity() -> f64 {
    0.75
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Hard deadline for shell_exec subprocesses, in seconds.
    #[serde(default = "default_shell_timeout")]
    pub shell_timeout_secs: u64,
    /// Byte cap on captured stdout/stderr per stream.
    #[serde(default = "default_shell_output_cap")]
    pub shell_output_cap: usize,
    /// Apply file edits without asking.  Also settable via
    /// `SONGBIRD_AUTO_APPLY=y` (for scripted runs).
    #[serde(default)]
    pub auto_apply_edits: bool,
    /// Write a `.bak` sibling before overwriting an edited file.
    #[serde(default = "default_true")]
    pub create_backups: bool,
    /// Normalized-content similarity at which a todo write updates an
    /// existing item instead of creating a new one.
    #[serde(default = "default_todo_similarity")]
    pub todo_similarity_threshold: f64,
    /// Extra destructive-command patterns refused by shell_exec, in addition
    /// to the built-in denylist.  Simple glob syntax (`*` and `?`).
    #[serde(default)]
    pub deny_patterns: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            shell_timeout_secs: default_shell_timeout(),
            shell_output_cap: default_shell_output_cap(),
            auto_apply_edits: false,
            create_backups: true,
            todo_similarity_threshold: default_todo_similarity(),
            deny_patterns: Vec::new(),
        }
    }
}

fn default_discovery_ttl() -> u64 {
    3600
}
fn default_probe_timeout() -> u64 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Seconds a fetched model list stays fresh before it is re-probed.
    #[serde(default = "default_discovery_ttl")]
    pub ttl_secs: u64,
    /// Per-provider timeout for a live model-list probe.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_discovery_ttl(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
