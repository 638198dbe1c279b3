// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Provider error taxonomy.
//!
//! Every adapter converts vendor failures into one of these kinds so callers
//! can react uniformly: authentication problems prompt for a key, rate limits
//! suggest waiting, model errors suggest `list-models`, connection errors
//! point at the network or the local daemon.  Each error carries up to three
//! provider-specific remediation hints for the UI.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} authentication failed: {message}")]
    Auth {
        provider: String,
        message: String,
        hints: Vec<String>,
    },
    #[error("{provider} rate limit exceeded: {message}")]
    RateLimit {
        provider: String,
        message: String,
        hints: Vec<String>,
    },
    #[error("{provider} model error: {message}")]
    Model {
        provider: String,
        message: String,
        hints: Vec<String>,
    },
    #[error("{provider} connection error: {message}")]
    Connection {
        provider: String,
        message: String,
        hints: Vec<String>,
    },
    #[error("{provider} error: {message}")]
    Generic {
        provider: String,
        message: String,
        hints: Vec<String>,
    },
}

impl ProviderError {
    pub fn provider(&self) -> &str {
        match self {
            Self::Auth { provider, .. }
            | Self::RateLimit { provider, .. }
            | Self::Model { provider, .. }
            | Self::Connection { provider, .. }
            | Self::Generic { provider, .. } => provider,
        }
    }

    pub fn hints(&self) -> &[String] {
        match self {
            Self::Auth { hints, .. }
            | Self::RateLimit { hints, .. }
            | Self::Model { hints, .. }
            | Self::Connection { hints, .. }
            | Self::Generic { hints, .. } => hints,
        }
    }

    /// Classify an HTTP failure (or transport error message) into a typed
    /// error with remediation hints attached.
    ///
    /// Classification uses the status code when available, falling back to
    /// well-known substrings for providers that return 200-with-error-body or
    /// fail before a status exists (connection refused, DNS, timeout).
    pub fn classify(provider: &str, status: Option<u16>, message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        let provider_owned = provider.to_string();

        let auth = status == Some(401)
            || status == Some(403)
            || lower.contains("api key")
            || lower.contains("unauthorized")
            || lower.contains("authentication");
        if auth {
            return Self::Auth {
                provider: provider_owned,
                message: message.to_string(),
                hints: auth_hints(provider),
            };
        }

        let rate = status == Some(429) || lower.contains("rate limit") || lower.contains("quota");
        if rate {
            return Self::RateLimit {
                provider: provider_owned,
                message: message.to_string(),
                hints: vec![
                    "Wait a moment and retry; rate limits reset on a rolling window.".into(),
                    "Switch to a smaller model with --model to reduce token pressure.".into(),
                ],
            };
        }

        let model = status == Some(404)
            || lower.contains("model not found")
            || lower.contains("not found")
            || lower.contains("not supported");
        if model {
            return Self::Model {
                provider: provider_owned,
                message: message.to_string(),
                hints: vec![
                    "Run `songbird list-models` to see what this provider offers.".into(),
                    "Model names are provider-specific; check for typos or a wrong vendor prefix."
                        .into(),
                ],
            };
        }

        let connection = status == Some(503)
            || status == Some(502)
            || lower.contains("timed out")
            || lower.contains("timeout")
            || lower.contains("connection refused")
            || lower.contains("dns")
            || lower.contains("connect");
        if connection {
            return Self::Connection {
                provider: provider_owned,
                message: message.to_string(),
                hints: connection_hints(provider),
            };
        }

        Self::Generic {
            provider: provider_owned,
            message: message.to_string(),
            hints: vec!["Re-run with SONGBIRD_LOG=debug for the full provider exchange.".into()],
        }
    }
}

fn auth_hints(provider: &str) -> Vec<String> {
    match provider {
        "openai" => vec![
            "Set OPENAI_API_KEY in your environment.".into(),
            "Create a key at https://platform.openai.com/api-keys".into(),
        ],
        "anthropic" => vec![
            "Set ANTHROPIC_API_KEY in your environment.".into(),
            "Create a key at https://console.anthropic.com/settings/keys".into(),
        ],
        "gemini" => vec![
            "Set GEMINI_API_KEY (or GOOGLE_API_KEY) in your environment.".into(),
            "Create a key at https://aistudio.google.com/apikey".into(),
        ],
        "openrouter" => vec![
            "Set OPENROUTER_API_KEY in your environment.".into(),
            "Create a key at https://openrouter.ai/keys".into(),
        ],
        "ollama" => vec![
            "Ollama needs no API key; this usually means a proxy in between rejected the request."
                .into(),
        ],
        _ => vec!["Set the provider's API key environment variable.".into()],
    }
}

fn connection_hints(provider: &str) -> Vec<String> {
    match provider {
        "ollama" => vec![
            "Start the local daemon with `ollama serve`.".into(),
            "Check that the base URL points at your Ollama instance (default http://localhost:11434/v1).".into(),
        ],
        _ => vec![
            "Check your network connection.".into(),
            "The provider may be experiencing an outage; retry shortly.".into(),
        ],
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_401_is_auth() {
        let e = ProviderError::classify("openai", Some(401), "Unauthorized");
        assert!(matches!(e, ProviderError::Auth { .. }));
        assert!(e.hints().iter().any(|h| h.contains("OPENAI_API_KEY")));
    }

    #[test]
    fn api_key_substring_is_auth_without_status() {
        let e = ProviderError::classify("anthropic", None, "invalid x-api-key header");
        assert!(matches!(e, ProviderError::Auth { .. }));
    }

    #[test]
    fn http_429_is_rate_limit() {
        let e = ProviderError::classify("openai", Some(429), "Too Many Requests");
        assert!(matches!(e, ProviderError::RateLimit { .. }));
    }

    #[test]
    fn quota_substring_is_rate_limit() {
        let e = ProviderError::classify("gemini", None, "quota exceeded for project");
        assert!(matches!(e, ProviderError::RateLimit { .. }));
    }

    #[test]
    fn http_404_is_model_error() {
        let e = ProviderError::classify("openai", Some(404), "The model `gpt-9` does not exist");
        assert!(matches!(e, ProviderError::Model { .. }));
    }

    #[test]
    fn connection_refused_is_connection() {
        let e = ProviderError::classify("ollama", None, "tcp connect error: connection refused");
        assert!(matches!(e, ProviderError::Connection { .. }));
        assert!(e.hints().iter().any(|h| h.contains("ollama serve")));
    }

    #[test]
    fn http_503_is_connection() {
        let e = ProviderError::classify("openai", Some(503), "Service Unavailable");
        assert!(matches!(e, ProviderError::Connection { .. }));
    }

    #[test]
    fn unknown_failure_is_generic() {
        let e = ProviderError::classify("openai", Some(500), "internal server error");
        assert!(matches!(e, ProviderError::Generic { .. }));
    }

    #[test]
    fn hints_never_exceed_three() {
        for (status, msg) in [
            (Some(401), "unauthorized"),
            (Some(429), "rate limit"),
            (Some(404), "not found"),
            (None, "connection refused"),
            (Some(500), "boom"),
        ] {
            for provider in ["openai", "anthropic", "gemini", "openrouter", "ollama", "custom"] {
                let e = ProviderError::classify(provider, status, msg);
                assert!(e.hints().len() <= 3, "{provider}: too many hints");
            }
        }
    }
}
