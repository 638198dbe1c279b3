// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;
mod terminal;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use songbird_config::Config;
use songbird_core::{Agent, AgentEvent, AutoApplyUi, InterruptController, TapAction, UiPort};
use songbird_model::{resolve_model_cfg, DiscoveryCache};
use songbird_session::SessionStore;
use songbird_tools::standard_registry;
use terminal::TerminalUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.list_providers {
        list_providers_cmd();
        return Ok(());
    }

    match cli.command.take() {
        Some(Commands::Version) => {
            println!("songbird {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Status) => {
            let config = load_config(&cli)?;
            status_cmd(&config)
        }
        Some(Commands::Performance { enable, report, clear }) => {
            performance_cmd(enable, report, clear)
        }
        Some(Commands::ListModels { provider }) => {
            let config = load_config(&cli)?;
            list_models_cmd(&config, provider.as_deref()).await
        }
        Some(Commands::Sessions { limit }) => sessions_cmd(limit),
        Some(Commands::Chat) | None => {
            let config = load_config(&cli)?;
            run_chat(cli, config).await
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config =
        songbird_config::load(cli.config.as_deref()).context("startup configuration failed")?;
    if let Some(provider) = &cli.provider {
        config.model = resolve_model_cfg(&config.model, provider);
    }
    if let Some(model) = &cli.model {
        // Named custom providers take precedence over the standard forms.
        let key = model.split('/').next().unwrap_or(model);
        if let Some(named) = config.providers.get(key).cloned() {
            config.model = named;
            if let Some((_, name)) = model.split_once('/') {
                config.model.name = name.to_string();
            }
        } else {
            config.model = resolve_model_cfg(&config.model, model);
        }
    }
    if let Some(url) = &cli.provider_url {
        config.model.base_url = Some(url.clone());
    }
    Ok(config)
}

/// Tracing setup: quiet by default, `SONGBIRD_LOG` selects a filter,
/// `SONGBIRD_LOG_FILE` redirects to a file so interactive output stays clean.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("SONGBIRD_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    if let Ok(path) = std::env::var("SONGBIRD_LOG_FILE") {
        if let Ok(file) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::sync::Mutex::new(file)).with_ansi(false))
                .init();
            return;
        }
    }
    if verbose {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// The project root partitions session storage: the enclosing git root when
/// one exists, the current directory otherwise.
fn find_project_root() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut dir = cwd.as_path();
    loop {
        if dir.join(".git").exists() {
            return dir.to_path_buf();
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return cwd.clone(),
        }
    }
}

// ── chat ──────────────────────────────────────────────────────────────────────

async fn run_chat(cli: Cli, config: Config) -> anyhow::Result<()> {
    let project_root = find_project_root();
    let store = SessionStore::open_default(&project_root)
        .context("cannot open session store")?;

    // Resume selection: explicit id beats --continue beats fresh.
    let session = if let Some(id) = &cli.resume {
        store.load_session(id).with_context(|| format!("cannot resume session {id}"))?
    } else if cli.continue_latest {
        match store.latest_session() {
            Some(stub) => store.load_session(&stub.id)?,
            None => store.create_session(),
        }
    } else {
        store.create_session()
    };

    // A resumed session restores its provider config unless overridden.
    let mut model_cfg = config.model.clone();
    if cli.provider.is_none() && cli.model.is_none() {
        if let Some(pc) = &session.provider_config {
            model_cfg.provider = pc.provider.clone();
            model_cfg.name = pc.model.clone();
            model_cfg.base_url = pc.api_base.clone().or(model_cfg.base_url);
        }
    }

    let provider = songbird_model::from_config(&model_cfg)?;
    let registry = Arc::new(standard_registry(
        &config.tools,
        store.project_dir(),
        Some(session.id.clone()),
    ));
    let ui: Arc<dyn UiPort> = if config.tools.auto_apply_edits {
        Arc::new(AutoApplyUi)
    } else {
        Arc::new(TerminalUi)
    };

    let mut agent = Agent::new(
        provider,
        registry,
        store,
        session,
        ui,
        config.agent.clone(),
        config.tools.auto_apply_edits,
    );

    println!(
        "songbird · {}/{} · {}",
        agent.provider().name(),
        agent.provider().model_name(),
        project_root.display()
    );
    println!("Type a request, /model <name> to switch models, or \"exit\" to quit.\n");

    // First Ctrl-C cancels the in-flight turn; a second within 2 s exits 130.
    let cancel_slot: Arc<Mutex<Option<oneshot::Sender<()>>>> = Arc::new(Mutex::new(None));
    spawn_interrupt_handler(Arc::clone(&cancel_slot));

    let perf = PerformanceLog::open();

    loop {
        let Some(line) = read_line("❯ ").await else {
            break; // EOF
        };
        let input = line.trim().to_string();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }
        if let Some(rest) = input.strip_prefix("/model ") {
            let (tx, mut rx) = mpsc::channel::<AgentEvent>(16);
            agent.switch_model(&config.model, rest.trim(), &tx).await?;
            drop(tx);
            while let Some(ev) = rx.recv().await {
                if let AgentEvent::ModelSwitched { provider, model } = ev {
                    println!("now using {provider}/{model}");
                }
            }
            continue;
        }

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        *cancel_slot.lock().expect("cancel slot lock") = Some(cancel_tx);

        let (tx, rx) = mpsc::channel::<AgentEvent>(256);
        let printer = tokio::spawn(print_events(rx));

        let started = std::time::Instant::now();
        let result = agent.submit_with_cancel(&input, tx, cancel_rx).await;
        cancel_slot.lock().expect("cancel slot lock").take();
        let _ = printer.await;
        result?;
        perf.record(started.elapsed());
    }

    agent.flush()?;
    Ok(())
}

fn spawn_interrupt_handler(cancel_slot: Arc<Mutex<Option<oneshot::Sender<()>>>>) {
    tokio::spawn(async move {
        let mut controller = InterruptController::default();
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            match controller.tap() {
                TapAction::CancelInFlight => {
                    if let Some(tx) = cancel_slot.lock().expect("cancel slot lock").take() {
                        let _ = tx.send(());
                    }
                    eprintln!("\n(interrupted — press Ctrl-C again within 2s to exit)");
                }
                TapAction::Exit => {
                    std::process::exit(130);
                }
            }
        }
    });
}

async fn print_events(mut rx: mpsc::Receiver<AgentEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            AgentEvent::TextDelta(t) => {
                print!("{t}");
                let _ = std::io::stdout().flush();
            }
            AgentEvent::ToolCallStarted { tool_name, .. } => {
                eprintln!("→ {tool_name}");
            }
            AgentEvent::ToolCallFinished { tool_name, success, output, .. } => {
                let mark = if success { "✓" } else { "✗" };
                println!("{mark} {tool_name}");
                println!("{output}");
            }
            AgentEvent::TurnComplete(_) => {
                println!();
            }
            AgentEvent::Aborted => {
                eprintln!("(turn canceled)");
            }
            AgentEvent::CapExceeded => {
                eprintln!("aborted: too many tool iterations");
            }
            // Provider errors render through the UI port with hints.
            AgentEvent::ProviderError { .. } => {}
            AgentEvent::TextComplete(_)
            | AgentEvent::TokenUsage { .. }
            | AgentEvent::ModelSwitched { .. } => {}
        }
    }
}

async fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    let _ = std::io::stdout().flush();
    tokio::task::spawn_blocking(|| {
        let mut buf = String::new();
        match std::io::stdin().read_line(&mut buf) {
            Ok(0) => None,
            Ok(_) => Some(buf),
            Err(_) => None,
        }
    })
    .await
    .ok()
    .flatten()
}

// ── status / discovery / sessions ─────────────────────────────────────────────

fn status_cmd(config: &Config) -> anyhow::Result<()> {
    let project_root = find_project_root();
    println!("project root : {}", project_root.display());
    println!("provider     : {}/{}", config.model.provider, config.model.name);

    println!("\napi keys:");
    for meta in songbird_model::list_drivers() {
        if meta.id == "mock" {
            continue;
        }
        let found = meta.api_key_envs.iter().find(|env| std::env::var(env).is_ok());
        let state = match (meta.requires_api_key, found) {
            (_, Some(env)) => format!("set ({env})"),
            (false, None) => "not required".to_string(),
            (true, None) => format!("missing ({})", meta.api_key_envs.join(" or ")),
        };
        println!("  {:<11} {state}", meta.id);
    }

    let store = SessionStore::open_default(&project_root)?;
    let sessions = store.list_sessions();
    println!("\nsessions     : {}", sessions.len());
    if let Some(latest) = sessions.first() {
        println!("latest       : {} ({})", latest.id, latest.summary);
    }
    Ok(())
}

fn list_providers_cmd() {
    println!("supported providers:");
    for meta in songbird_model::list_drivers() {
        println!("  {:<11} {}", meta.id, meta.description);
    }
}

async fn list_models_cmd(config: &Config, provider_override: Option<&str>) -> anyhow::Result<()> {
    let mut model_cfg = config.model.clone();
    if let Some(p) = provider_override {
        model_cfg = resolve_model_cfg(&model_cfg, p);
    }
    let provider = songbird_model::from_config(&model_cfg)?;
    let cache = DiscoveryCache::from_config(&config.discovery);
    let models = cache
        .models(provider.as_ref())
        .await
        .map_err(|e| anyhow::anyhow!("model discovery failed: {e}"))?;

    if models.is_empty() {
        println!("no models reported by {}", provider.name());
        return Ok(());
    }
    for m in models {
        let ctx = m
            .context_length
            .map(|n| format!("{:>8} ctx", n))
            .unwrap_or_else(|| "        ".to_string());
        let tools = if m.supports_function_calling { "tools" } else { "     " };
        println!("  {:<40} {ctx}  {tools}", m.id);
    }
    Ok(())
}

fn sessions_cmd(limit: usize) -> anyhow::Result<()> {
    let project_root = find_project_root();
    let store = SessionStore::open_default(&project_root)?;
    let sessions = store.list_sessions();
    if sessions.is_empty() {
        println!("no sessions for {}", project_root.display());
        return Ok(());
    }
    for stub in sessions.iter().take(limit) {
        println!(
            "{}  {}  {:>3} msgs  {}",
            stub.id,
            stub.updated_at.format("%Y-%m-%d %H:%M"),
            stub.n_messages,
            stub.summary
        );
    }
    Ok(())
}

// ── performance instrumentation ───────────────────────────────────────────────

struct PerformanceLog {
    path: PathBuf,
    enabled: bool,
}

impl PerformanceLog {
    fn file_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".songbird/performance.json")
    }

    fn open() -> Self {
        let path = Self::file_path();
        let enabled = Self::read(&path)["enabled"].as_bool().unwrap_or(false);
        Self { path, enabled }
    }

    fn read(path: &Path) -> serde_json::Value {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|t| serde_json::from_str(&t).ok())
            .unwrap_or_else(|| serde_json::json!({"enabled": false, "turns": []}))
    }

    fn write(path: &Path, value: &serde_json::Value) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(value)?)?;
        Ok(())
    }

    fn record(&self, elapsed: std::time::Duration) {
        if !self.enabled {
            return;
        }
        let mut data = Self::read(&self.path);
        if let Some(turns) = data["turns"].as_array_mut() {
            turns.push(serde_json::json!({
                "at": chrono::Utc::now().to_rfc3339(),
                "seconds": elapsed.as_secs_f64(),
            }));
        }
        let _ = Self::write(&self.path, &data);
    }
}

fn performance_cmd(enable: bool, report: bool, clear: bool) -> anyhow::Result<()> {
    let path = PerformanceLog::file_path();
    if clear {
        let _ = std::fs::remove_file(&path);
        println!("performance data cleared");
        return Ok(());
    }
    if enable {
        let mut data = PerformanceLog::read(&path);
        data["enabled"] = serde_json::json!(true);
        PerformanceLog::write(&path, &data)?;
        println!("performance recording enabled");
        return Ok(());
    }
    if report {
        let data = PerformanceLog::read(&path);
        let turns = data["turns"].as_array().cloned().unwrap_or_default();
        if turns.is_empty() {
            println!("no performance data recorded");
            return Ok(());
        }
        let times: Vec<f64> =
            turns.iter().filter_map(|t| t["seconds"].as_f64()).collect();
        let total: f64 = times.iter().sum();
        let mean = total / times.len() as f64;
        let max = times.iter().cloned().fold(0.0_f64, f64::max);
        println!("turns : {}", times.len());
        println!("mean  : {mean:.2}s");
        println!("max   : {max:.2}s");
        return Ok(());
    }
    println!("usage: songbird performance [--enable|--report|--clear]");
    Ok(())
}
