// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Dynamic model discovery with a TTL cache.
//!
//! Each provider exposes `list_models`; the cache remembers the result per
//! provider for a configurable TTL (default one hour) so interactive model
//! pickers never wait on the network twice.  Live probes are bounded by a
//! short per-provider timeout and fall back to the static entries on failure.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ModelProvider, ProviderError};

/// One model known to a provider, static or live-discovered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredModel {
    pub id: String,
    pub display_name: String,
    pub provider: String,
    pub supports_function_calling: bool,
    pub supports_streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_per_token: Option<f64>,
}

impl DiscoveredModel {
    fn basic(id: &str, provider: &str, context_length: u32) -> Self {
        Self {
            id: id.to_string(),
            display_name: id.to_string(),
            provider: provider.to_string(),
            supports_function_calling: true,
            supports_streaming: true,
            context_length: Some(context_length),
            description: None,
            pricing_per_token: None,
        }
    }
}

/// Static model entries used when a live probe is unavailable or fails.
/// Deliberately short — the live endpoint is the source of truth.
pub fn static_models(provider: &str) -> Vec<DiscoveredModel> {
    match provider {
        "openai" => vec![
            DiscoveredModel::basic("gpt-4o", "openai", 128_000),
            DiscoveredModel::basic("gpt-4o-mini", "openai", 128_000),
            DiscoveredModel::basic("gpt-4.1", "openai", 1_000_000),
        ],
        "anthropic" => vec![
            DiscoveredModel::basic("claude-sonnet-4-5", "anthropic", 200_000),
            DiscoveredModel::basic("claude-haiku-4-5", "anthropic", 200_000),
        ],
        "gemini" => vec![
            DiscoveredModel::basic("gemini-2.0-flash", "gemini", 1_000_000),
            DiscoveredModel::basic("gemini-2.5-pro", "gemini", 1_000_000),
        ],
        "openrouter" => vec![],
        "ollama" => vec![],
        _ => vec![],
    }
}

/// Look up a static entry by provider + model id.
pub fn static_lookup(provider: &str, model: &str) -> Option<DiscoveredModel> {
    static_models(provider).into_iter().find(|m| m.id == model)
}

/// TTL cache over provider model listings.
pub struct DiscoveryCache {
    ttl: Duration,
    probe_timeout: Duration,
    entries: Mutex<HashMap<String, (Instant, Vec<DiscoveredModel>)>>,
}

impl DiscoveryCache {
    pub fn new(ttl: Duration, probe_timeout: Duration) -> Self {
        Self { ttl, probe_timeout, entries: Mutex::new(HashMap::new()) }
    }

    pub fn from_config(cfg: &songbird_config::DiscoveryConfig) -> Self {
        Self::new(
            Duration::from_secs(cfg.ttl_secs),
            Duration::from_secs(cfg.probe_timeout_secs),
        )
    }

    /// Fetch the model list for `provider`, serving a fresh cache entry when
    /// one exists.  A timed-out or failed probe degrades to the static
    /// entries and is NOT cached, so the next call retries the live path.
    pub async fn models(
        &self,
        provider: &dyn ModelProvider,
    ) -> Result<Vec<DiscoveredModel>, ProviderError> {
        let key = provider.name().to_string();
        if let Some(models) = self.fresh_entry(&key) {
            debug!(provider = %key, "model discovery cache hit");
            return Ok(models);
        }

        match tokio::time::timeout(self.probe_timeout, provider.list_models()).await {
            Ok(Ok(models)) => {
                self.insert(&key, models.clone());
                Ok(models)
            }
            Ok(Err(e)) => {
                debug!(provider = %key, error = %e, "live model probe failed; using static entries");
                Ok(static_models(&key))
            }
            Err(_) => {
                debug!(provider = %key, "live model probe timed out; using static entries");
                Ok(static_models(&key))
            }
        }
    }

    /// Drop the cached entry for one provider (used after a model switch so
    /// compatibility checks re-run against fresh data).
    pub fn invalidate(&self, provider: &str) {
        self.entries.lock().expect("discovery cache lock").remove(provider);
    }

    fn fresh_entry(&self, key: &str) -> Option<Vec<DiscoveredModel>> {
        let entries = self.entries.lock().expect("discovery cache lock");
        entries.get(key).and_then(|(at, models)| {
            (at.elapsed() < self.ttl).then(|| models.clone())
        })
    }

    fn insert(&self, key: &str, models: Vec<DiscoveredModel>) {
        self.entries
            .lock()
            .expect("discovery cache lock")
            .insert(key.to_string(), (Instant::now(), models));
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
