// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "songbird",
    version,
    about = "A terminal-first AI coding agent",
    long_about = "Songbird drives an LLM tool-calling loop against your local \
                  workspace: file operations, shell commands, search, and todo \
                  tracking, with destructive edits gated behind a diff \
                  confirmation. Sessions persist per project directory."
)]
pub struct Cli {
    /// Provider to use (openai | anthropic | gemini | openrouter | ollama)
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Model override: "model", "provider/model", or a bare provider id
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Custom OpenAI-compatible base URL (local servers, proxies)
    #[arg(long, global = true)]
    pub provider_url: Option<String>,

    /// Resume the most recent session for this project
    #[arg(short = 'c', long = "continue")]
    pub continue_latest: bool,

    /// Resume a specific session by id
    #[arg(short = 'r', long)]
    pub resume: Option<String>,

    /// List the supported providers and exit
    #[arg(long)]
    pub list_providers: bool,

    /// Explicit config file (default: search standard locations)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log to stderr (otherwise only SONGBIRD_LOG_FILE receives logs)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start or resume an interactive session (the default)
    Chat,
    /// Print the version and exit
    Version,
    /// Show provider/key/session status for this project
    Status,
    /// Turn-latency instrumentation
    Performance {
        /// Start recording turn timings
        #[arg(long)]
        enable: bool,
        /// Print recorded timings
        #[arg(long)]
        report: bool,
        /// Delete recorded timings and disable recording
        #[arg(long)]
        clear: bool,
    },
    /// List models available from the active provider
    ListModels {
        /// Provider to query (default: the configured one)
        provider: Option<String>,
    },
    /// List saved sessions for this project
    Sessions {
        /// Maximum number of sessions to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}
