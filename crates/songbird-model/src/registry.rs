// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Driver registry: static metadata for every supported model provider.
//!
//! Single source of truth for which provider ids exist and what their
//! defaults are.  Construction logic lives in [`crate::from_config`].

use songbird_config::ModelConfig;

/// Metadata describing a registered model driver.
#[derive(Debug, Clone)]
pub struct DriverMeta {
    /// Unique provider id used in `model.provider` (e.g. `"openai"`).
    pub id: &'static str,
    /// Human-readable display name.
    pub name: &'static str,
    /// One-line description shown by `songbird --list-providers`.
    pub description: &'static str,
    /// Environment variables probed for the API key, in priority order.
    /// Empty for providers that require no key (local servers).
    pub api_key_envs: &'static [&'static str],
    /// Default base URL when the user does not set `model.base_url`.
    pub default_base_url: Option<&'static str>,
    /// Whether an API key is required for requests to succeed.
    pub requires_api_key: bool,
}

/// Complete registry of supported drivers.
pub static DRIVERS: &[DriverMeta] = &[
    DriverMeta {
        id: "openai",
        name: "OpenAI",
        description: "OpenAI GPT and o-series models",
        api_key_envs: &["OPENAI_API_KEY"],
        default_base_url: Some("https://api.openai.com/v1"),
        requires_api_key: true,
    },
    DriverMeta {
        id: "anthropic",
        name: "Anthropic",
        description: "Anthropic Claude models",
        api_key_envs: &["ANTHROPIC_API_KEY"],
        default_base_url: Some("https://api.anthropic.com"),
        requires_api_key: true,
    },
    DriverMeta {
        id: "gemini",
        name: "Google Gemini",
        description: "Google Gemini models via the Generative Language API",
        api_key_envs: &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        default_base_url: Some("https://generativelanguage.googleapis.com"),
        requires_api_key: true,
    },
    DriverMeta {
        id: "openrouter",
        name: "OpenRouter",
        description: "OpenRouter gateway (many models from many vendors)",
        api_key_envs: &["OPENROUTER_API_KEY"],
        default_base_url: Some("https://openrouter.ai/api/v1"),
        requires_api_key: true,
    },
    DriverMeta {
        id: "ollama",
        name: "Ollama",
        description: "Ollama local model runner (http://localhost:11434)",
        api_key_envs: &[],
        default_base_url: Some("http://localhost:11434/v1"),
        requires_api_key: false,
    },
    DriverMeta {
        id: "mock",
        name: "Mock",
        description: "Mock driver for tests (no network, echoes input)",
        api_key_envs: &[],
        default_base_url: None,
        requires_api_key: false,
    },
];

/// Returns all registered drivers in declaration order.
pub fn list_drivers() -> &'static [DriverMeta] {
    DRIVERS
}

/// Look up a driver by its id.  Returns `None` for unknown ids.
pub fn get_driver(id: &str) -> Option<&'static DriverMeta> {
    DRIVERS.iter().find(|d| d.id == id)
}

pub fn known_driver_ids() -> impl Iterator<Item = &'static str> {
    DRIVERS.iter().map(|d| d.id)
}

/// Split a `vendor/model` string into `(vendor, model)`.
///
/// A string without a slash is treated as an OpenAI-family model name.
pub fn parse_model_string(s: &str) -> (&str, &str) {
    match s.split_once('/') {
        Some((vendor, model)) => (vendor, model),
        None => ("openai", s),
    }
}

/// Resolve the API key for a model config: explicit key first, then the
/// configured env var, then the registry's default env vars for the provider.
pub fn resolve_api_key(cfg: &ModelConfig) -> Option<String> {
    if let Some(k) = &cfg.api_key {
        return Some(k.clone());
    }
    if let Some(env) = &cfg.api_key_env {
        return std::env::var(env).ok();
    }
    if let Some(meta) = get_driver(&cfg.provider) {
        for env_var in meta.api_key_envs {
            if let Ok(v) = std::env::var(env_var) {
                return Some(v);
            }
        }
    }
    None
}

/// Build a [`ModelConfig`] by applying `override_str` on top of `base`.
///
/// The override may be:
/// - `"provider/model"` → sets both (e.g. `"anthropic/claude-sonnet-4-5"`)
/// - a bare registered provider id → changes provider, keeps the model name
/// - a bare model name → changes the model, keeps the provider
///
/// When the provider changes, inherited `api_key` / `api_key_env` are cleared
/// so the correct credential for the new provider is looked up.
pub fn resolve_model_cfg(base: &ModelConfig, override_str: &str) -> ModelConfig {
    let mut cfg = base.clone();
    let provider_changed;
    if let Some((provider, model)) = override_str.split_once('/') {
        provider_changed = provider != base.provider;
        cfg.provider = provider.to_string();
        cfg.name = model.to_string();
    } else if get_driver(override_str).is_some() {
        provider_changed = override_str != base.provider;
        cfg.provider = override_str.to_string();
    } else {
        cfg.name = override_str.to_string();
        provider_changed = false;
    }
    if provider_changed {
        cfg.api_key = None;
        cfg.api_key_env = None;
        cfg.base_url = None;
    }
    cfg
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for d in DRIVERS {
            assert!(seen.insert(d.id), "duplicate driver id: {}", d.id);
        }
    }

    #[test]
    fn required_providers_are_registered() {
        for required in ["openai", "anthropic", "gemini", "openrouter", "ollama"] {
            assert!(get_driver(required).is_some(), "missing driver: {required}");
        }
    }

    #[test]
    fn gemini_probes_both_google_env_vars() {
        let meta = get_driver("gemini").unwrap();
        assert_eq!(meta.api_key_envs, &["GEMINI_API_KEY", "GOOGLE_API_KEY"]);
    }

    #[test]
    fn ollama_requires_no_key() {
        let meta = get_driver("ollama").unwrap();
        assert!(!meta.requires_api_key);
        assert!(meta.api_key_envs.is_empty());
    }

    #[test]
    fn parse_with_slash_splits_vendor_and_model() {
        assert_eq!(
            parse_model_string("anthropic/claude-sonnet-4-5"),
            ("anthropic", "claude-sonnet-4-5")
        );
    }

    #[test]
    fn parse_without_slash_defaults_to_openai_family() {
        assert_eq!(parse_model_string("gpt-4o-mini"), ("openai", "gpt-4o-mini"));
    }

    fn openai_base() -> ModelConfig {
        ModelConfig {
            provider: "openai".into(),
            name: "gpt-4o".into(),
            api_key_env: Some("OPENAI_API_KEY".into()),
            ..ModelConfig::default()
        }
    }

    #[test]
    fn resolve_slash_form_sets_provider_and_name() {
        let cfg = resolve_model_cfg(&openai_base(), "anthropic/claude-sonnet-4-5");
        assert_eq!(cfg.provider, "anthropic");
        assert_eq!(cfg.name, "claude-sonnet-4-5");
    }

    #[test]
    fn resolve_clears_credentials_on_provider_change() {
        let cfg = resolve_model_cfg(&openai_base(), "anthropic/claude-sonnet-4-5");
        assert!(cfg.api_key.is_none());
        assert!(cfg.api_key_env.is_none());
    }

    #[test]
    fn resolve_bare_model_keeps_provider_and_key() {
        let cfg = resolve_model_cfg(&openai_base(), "gpt-4o-mini");
        assert_eq!(cfg.provider, "openai");
        assert_eq!(cfg.name, "gpt-4o-mini");
        assert_eq!(cfg.api_key_env.as_deref(), Some("OPENAI_API_KEY"));
    }

    #[test]
    fn resolve_bare_provider_id_switches_provider() {
        let cfg = resolve_model_cfg(&openai_base(), "ollama");
        assert_eq!(cfg.provider, "ollama");
        assert_eq!(cfg.name, "gpt-4o", "model name is kept");
        assert!(cfg.api_key_env.is_none());
    }
}
