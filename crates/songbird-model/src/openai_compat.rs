// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Unified adapter for OpenAI-compatible chat completion APIs.
//!
//! OpenAI, OpenRouter, and Ollama (plus any `--provider-url` custom endpoint)
//! speak the same `/chat/completions` + `/models` wire format.  This module
//! provides a single provider that each driver configures with its own
//! defaults (URL, auth style, headers).
//!
//! # Auth styles
//! - `Bearer` — `Authorization: Bearer <key>` (hosted providers)
//! - `None` — no authentication (local servers like Ollama)

use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    discovery::{static_lookup, static_models, DiscoveredModel},
    http::shared_client,
    provider::ResponseStream,
    CompletionRequest, Message, ModelProvider, ProviderError, ResponseEvent, Role, ToolSchema,
};

/// How to send the API key in HTTP requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>` — standard for hosted providers.
    Bearer,
    /// No authentication header — local servers.
    None,
}

/// OpenAI-compatible chat completion provider.
pub struct OpenAICompatProvider {
    driver_name: String,
    model: String,
    api_key: Option<String>,
    /// Full chat completions URL, e.g. `https://api.openai.com/v1/chat/completions`.
    chat_url: String,
    /// Full models list URL.  `None` → static entries only.
    models_url: Option<String>,
    max_tokens: u32,
    temperature: f32,
    extra_headers: Vec<(String, String)>,
    auth_style: AuthStyle,
    client: reqwest::Client,
    /// Model name whose compatibility was last checked.  Cleared by
    /// `set_model` so the check re-runs for the new model.
    compat_checked: Mutex<Option<String>>,
}

impl OpenAICompatProvider {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        driver_name: impl Into<String>,
        model: String,
        api_key: Option<String>,
        base_url: &str,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        extra_headers: Vec<(String, String)>,
        auth_style: AuthStyle,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            driver_name: driver_name.into(),
            model,
            api_key,
            chat_url: format!("{base}/chat/completions"),
            models_url: Some(format!("{base}/models")),
            max_tokens: max_tokens.unwrap_or(4096),
            temperature: temperature.unwrap_or(0.2),
            extra_headers,
            auth_style,
            client: shared_client(),
            compat_checked: Mutex::new(None),
        }
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, ProviderError> {
        let mut req = match self.auth_style {
            AuthStyle::Bearer => {
                let key = self.api_key.as_deref().ok_or_else(|| {
                    ProviderError::classify(
                        &self.driver_name,
                        Some(401),
                        "API key not set; provide api_key or the provider's key env var",
                    )
                })?;
                req.bearer_auth(key)
            }
            AuthStyle::None => req,
        };
        for (name, val) in &self.extra_headers {
            req = req.header(name.as_str(), val.as_str());
        }
        Ok(req)
    }

    /// One-shot compatibility check against the static catalog, re-armed on
    /// every model change.
    fn check_model_compat(&self) {
        let mut checked = self.compat_checked.lock().expect("compat lock");
        if checked.as_deref() == Some(self.model.as_str()) {
            return;
        }
        if let Some(entry) = static_lookup(&self.driver_name, &self.model) {
            if !entry.supports_function_calling {
                warn!(
                    model = %self.model,
                    "model does not advertise function calling; tool use may fail"
                );
            }
        }
        *checked = Some(self.model.clone());
    }
}

#[async_trait]
impl ModelProvider for OpenAICompatProvider {
    fn name(&self) -> &str {
        &self.driver_name
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, model: &str) {
        if self.model != model {
            self.model = model.to_string();
            *self.compat_checked.lock().expect("compat lock") = None;
        }
    }

    /// List models via `GET /models`, enriched with static metadata.  Falls
    /// back to static entries when no endpoint or key is available.
    async fn list_models(&self) -> Result<Vec<DiscoveredModel>, ProviderError> {
        let statics = static_models(&self.driver_name);
        let url = match &self.models_url {
            Some(u) => u.clone(),
            None => return Ok(statics),
        };
        if self.auth_style == AuthStyle::Bearer && self.api_key.is_none() {
            return Ok(statics);
        }

        let req = self.auth(self.client.get(&url))?;
        let resp = match req.send().await {
            Ok(r) if r.status().is_success() => r,
            // Non-critical path: local server down or endpoint missing.
            _ => return Ok(statics),
        };
        let body: Value = match resp.json().await {
            Ok(v) => v,
            Err(_) => return Ok(statics),
        };

        let mut entries = Vec::new();
        if let Some(data) = body["data"].as_array() {
            for item in data {
                let id = match item["id"].as_str() {
                    Some(s) => s.to_string(),
                    None => continue,
                };
                if let Some(known) = statics.iter().find(|m| m.id == id) {
                    entries.push(known.clone());
                } else {
                    entries.push(DiscoveredModel {
                        id: id.clone(),
                        display_name: id,
                        provider: self.driver_name.clone(),
                        // Unknown model: assume the common case for this wire format.
                        supports_function_calling: true,
                        supports_streaming: true,
                        context_length: item["context_length"].as_u64().map(|n| n as u32),
                        description: item["description"].as_str().map(str::to_string),
                        pricing_per_token: item["pricing"]["prompt"]
                            .as_str()
                            .and_then(|s| s.parse().ok()),
                    });
                }
            }
        }
        if entries.is_empty() {
            return Ok(statics);
        }
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    async fn stream_chat(&self, req: CompletionRequest) -> Result<ResponseStream, ProviderError> {
        self.check_model_compat();

        let messages = build_openai_messages(&req.messages);
        let tools = validate_wire_tools(build_wire_tools(&req.tools));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "stream_options": { "include_usage": true },
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
            body["tool_choice"] = json!("auto");
        }

        debug!(
            driver = %self.driver_name,
            model = %self.model,
            tool_count = tools.len(),
            message_count = messages.len(),
            "sending completion request"
        );

        let http_req = self.auth(self.client.post(&self.chat_url).json(&body))?;
        let resp = http_req.send().await.map_err(|e| {
            ProviderError::classify(&self.driver_name, e.status().map(|s| s.as_u16()), &e.to_string())
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::classify(&self.driver_name, Some(status), &text));
        }

        let driver = self.driver_name.clone();
        // SSE events can be split across TCP packets.  Maintain a line buffer
        // across chunks; emit events only for complete lines.
        let event_stream = resp
            .bytes_stream()
            .scan(String::new(), move |buf, chunk| {
                let events: Vec<Result<ResponseEvent, ProviderError>> = match chunk {
                    Ok(b) => {
                        buf.push_str(&String::from_utf8_lossy(&b));
                        drain_complete_sse_lines(buf)
                    }
                    Err(e) => vec![Err(ProviderError::classify(&driver, None, &e.to_string()))],
                };
                std::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(event_stream))
    }
}

/// Build the wire-level tool array: `{type:"function", function:{…}}`.
fn build_wire_tools(tools: &[ToolSchema]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                }
            })
        })
        .collect()
}

/// Drop malformed tool definitions before dispatch.
///
/// A valid entry has `type == "function"`, a non-empty `function.name`, and a
/// `function.parameters` object.  Invalid entries are logged and skipped; the
/// remaining tools are still sent.
pub fn validate_wire_tools(tools: Vec<Value>) -> Vec<Value> {
    tools
        .into_iter()
        .filter(|t| {
            let ok = t["type"] == "function"
                && t["function"]["name"].as_str().map(|n| !n.is_empty()).unwrap_or(false)
                && t["function"]["parameters"].is_object();
            if !ok {
                warn!(tool = %t, "dropping malformed tool schema before provider call");
            }
            ok
        })
        .collect()
}

fn role_str(r: Role) -> &'static str {
    match r {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// Convert transcript messages into the OpenAI wire-format JSON array.
///
/// Extracted as a free function so it can be unit-tested without HTTP.
pub fn build_openai_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let mut v = json!({
                "role": role_str(m.role),
                "content": m.content,
            });
            if let Some(calls) = &m.tool_calls {
                if !calls.is_empty() {
                    let wire_calls: Vec<Value> = calls
                        .iter()
                        .map(|c| {
                            json!({
                                "id": c.id,
                                "type": "function",
                                "function": {
                                    "name": c.name,
                                    // OpenAI expects a JSON-encoded string here.
                                    "arguments": c.arguments.to_string(),
                                }
                            })
                        })
                        .collect();
                    v["tool_calls"] = json!(wire_calls);
                }
            }
            if let Some(id) = &m.tool_call_id {
                v["tool_call_id"] = json!(id);
            }
            v
        })
        .collect()
}

/// Drain all complete `\n`-terminated SSE lines from `buf`.
///
/// Any trailing incomplete line stays in `buf` so the next TCP chunk can
/// extend it — a single SSE event may be split across packets.
pub(crate) fn drain_complete_sse_lines(
    buf: &mut String,
) -> Vec<Result<ResponseEvent, ProviderError>> {
    let mut events = Vec::new();
    while let Some(nl_pos) = buf.find('\n') {
        let line = buf[..nl_pos].trim_end_matches('\r').to_string();
        *buf = buf[nl_pos + 1..].to_string();
        if let Some(ev) = parse_sse_data_line(&line) {
            events.push(Ok(ev));
        }
    }
    events
}

/// Parse a single complete SSE `data:` line into a [`ResponseEvent`].
///
/// Returns `None` for empty lines, comments, or unparseable data.
fn parse_sse_data_line(line: &str) -> Option<ResponseEvent> {
    let data = line.strip_prefix("data: ")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(ResponseEvent::Done);
    }
    let v: Value = serde_json::from_str(data).ok()?;
    Some(parse_sse_chunk(&v))
}

fn parse_sse_chunk(v: &Value) -> ResponseEvent {
    // Usage-only chunk (emitted when stream_options.include_usage = true)
    if let Some(usage) = v.get("usage").filter(|u| !u.is_null()) {
        return ResponseEvent::Usage {
            input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
        };
    }

    let delta = &v["choices"][0]["delta"];

    // Tool call delta — parallel calls are identified by an "index" field;
    // each chunk carries exactly one fragment in practice.
    if let Some(tc) = delta.get("tool_calls").and_then(|t| t.get(0)) {
        return ResponseEvent::ToolCallDelta {
            index: tc["index"].as_u64().unwrap_or(0) as u32,
            id: tc["id"].as_str().unwrap_or("").to_string(),
            name: tc["function"]["name"].as_str().unwrap_or("").to_string(),
            arguments: tc["function"]["arguments"].as_str().unwrap_or("").to_string(),
        };
    }

    if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
        return ResponseEvent::TextDelta(text.to_string());
    }

    ResponseEvent::TextDelta(String::new())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
