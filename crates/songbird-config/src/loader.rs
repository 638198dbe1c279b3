// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest
/// priority.  Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. System-wide default
    paths.push(PathBuf::from("/etc/songbird/config.yaml"));

    // 2. XDG / home
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/songbird/config.yaml"));
        paths.push(home.join(".songbird/config.yaml"));
    }

    // 3. Workspace-local
    paths.push(PathBuf::from(".songbird.yaml"));
    paths.push(PathBuf::from(".songbird/config.yaml"));

    paths
}

/// Load configuration.
///
/// When `explicit` is given, only that file is read (an error if missing).
/// Otherwise the search paths are probed in priority order and the highest
/// priority file found wins.  When no file exists the built-in defaults are
/// returned.  Environment overrides (`SONGBIRD_AUTO_APPLY`,
/// `SONGBIRD_FAST_MODE`) are applied last in either case.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = if let Some(path) = explicit {
        read_config_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?
    } else {
        let mut found = Config::default();
        for path in config_search_paths() {
            if path.is_file() {
                found = read_config_file(&path)
                    .with_context(|| format!("failed to load config {}", path.display()))?;
                debug!(path = %path.display(), "loaded config file");
            }
        }
        found
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn read_config_file(path: &Path) -> anyhow::Result<Config> {
    let text = std::fs::read_to_string(path)?;
    let config: Config = serde_yaml::from_str(&text)?;
    Ok(config)
}

/// Environment variables override file settings so scripted runs can adjust
/// behaviour without touching config files.
fn apply_env_overrides(config: &mut Config) {
    if std::env::var("SONGBIRD_AUTO_APPLY").map(|v| v == "y").unwrap_or(false) {
        config.tools.auto_apply_edits = true;
    }
    if std::env::var("SONGBIRD_FAST_MODE").map(|v| v == "1").unwrap_or(false) {
        config.agent.fast_mode = true;
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = load(Some(Path::new("/nonexistent/songbird.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "model:\n  provider: ollama\n  name: llama3.2\n").unwrap();
        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.model.provider, "ollama");
        assert_eq!(cfg.model.name, "llama3.2");
    }

    #[test]
    fn invalid_yaml_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "model: [not a mapping").unwrap();
        let err = load(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("bad.yaml"));
    }
}
