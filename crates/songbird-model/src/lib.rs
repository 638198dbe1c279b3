// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
pub mod discovery;
pub mod registry;
pub mod repair;
pub mod sanitize;
mod anthropic;
mod error;
mod google;
pub mod http;
mod mock;
mod openai_compat;
mod provider;
mod types;

pub use anthropic::AnthropicProvider;
pub use discovery::{DiscoveredModel, DiscoveryCache};
pub use error::ProviderError;
pub use google::GoogleProvider;
pub use mock::{MockProvider, ScriptedMockProvider, ScriptedTurn};
pub use openai_compat::{build_openai_messages, validate_wire_tools, AuthStyle, OpenAICompatProvider};
pub use provider::{collect_stream, finish_pending, ModelProvider, PendingToolCall, ResponseStream};
pub use registry::{
    get_driver, list_drivers, parse_model_string, resolve_api_key, resolve_model_cfg, DriverMeta,
};
pub use types::*;

use anyhow::bail;
use songbird_config::ModelConfig;
use tracing::warn;

/// Construct a boxed [`ModelProvider`] from configuration.
///
/// Selects the driver based on `cfg.provider`; run
/// `songbird --list-providers` for the recognised ids.
///
/// Environment pre-flight: a provider that requires an API key but has none
/// resolvable produces a warning here (non-fatal), so the error surface stays
/// uniform at call time.
pub fn from_config(cfg: &ModelConfig) -> anyhow::Result<Box<dyn ModelProvider>> {
    let key = registry::resolve_api_key(cfg);

    if let Some(meta) = registry::get_driver(&cfg.provider) {
        if meta.requires_api_key && key.is_none() {
            let envs = meta.api_key_envs.join(" or ");
            warn!(
                provider = %cfg.provider,
                "no API key found; set {envs} before sending a message"
            );
        }
    }

    let base_url = |default: &str| -> String {
        cfg.base_url.clone().unwrap_or_else(|| default.into())
    };

    match cfg.provider.as_str() {
        "openai" => Ok(Box::new(OpenAICompatProvider::new(
            "openai",
            cfg.name.clone(),
            key,
            &base_url("https://api.openai.com/v1"),
            cfg.max_tokens,
            cfg.temperature,
            vec![],
            AuthStyle::Bearer,
        ))),
        "anthropic" => Ok(Box::new(AnthropicProvider::new(
            cfg.name.clone(),
            key,
            cfg.base_url.clone(),
            cfg.max_tokens,
            cfg.temperature,
        ))),
        "gemini" => Ok(Box::new(GoogleProvider::new(
            cfg.name.clone(),
            key,
            cfg.base_url.clone(),
            cfg.max_tokens,
            cfg.temperature,
        ))),
        "openrouter" => Ok(Box::new(OpenAICompatProvider::new(
            "openrouter",
            cfg.name.clone(),
            key,
            &base_url("https://openrouter.ai/api/v1"),
            cfg.max_tokens,
            cfg.temperature,
            vec![
                ("HTTP-Referer".into(), "https://github.com/songbird-ai/songbird".into()),
                ("X-Title".into(), "songbird".into()),
            ],
            AuthStyle::Bearer,
        ))),
        "ollama" => Ok(Box::new(OpenAICompatProvider::new(
            "ollama",
            cfg.name.clone(),
            None,
            &base_url("http://localhost:11434/v1"),
            cfg.max_tokens,
            cfg.temperature,
            vec![],
            AuthStyle::None,
        ))),
        "mock" => Ok(Box::new(MockProvider::default())),
        other => {
            let known: Vec<&str> = registry::known_driver_ids().collect();
            bail!(
                "unknown model provider: {other:?}\n\
                 Run `songbird --list-providers` for a full list, or check your config.\n\
                 Known providers: {known}",
                known = known.join(", ")
            )
        }
    }
}
