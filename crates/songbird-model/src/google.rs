// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Native Google Gemini adapter (Generative Language API).
//!
//! Gemini's dialect differs from both OpenAI and Anthropic: roles are
//! `user`/`model`, tool calls are `functionCall` parts with complete argument
//! objects (no streaming fragments), and tool results are `functionResponse`
//! parts keyed by function *name* rather than call id.  The adapter keeps an
//! id→name map while translating the transcript so results land on the right
//! function.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    http::shared_client, provider::ResponseStream, CompletionRequest, Message, ModelProvider,
    ProviderError, ResponseEvent, Role,
};

pub struct GoogleProvider {
    model: String,
    api_key: Option<String>,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(
        model: String,
        api_key: Option<String>,
        base_url: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Self {
        Self {
            model,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".into())
                .trim_end_matches('/')
                .to_string(),
            max_tokens: max_tokens.unwrap_or(4096),
            temperature: temperature.unwrap_or(0.2),
            client: shared_client(),
        }
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl ModelProvider for GoogleProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, model: &str) {
        // Gemini requests are stateless per model; nothing cached to flush.
        self.model = model.to_string();
    }

    async fn stream_chat(&self, req: CompletionRequest) -> Result<ResponseStream, ProviderError> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::classify("gemini", Some(401), "API key not set")
        })?;

        let (system, contents) = build_gemini_contents(&req.messages);
        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            },
        });
        if let Some(sys) = system {
            body["systemInstruction"] = json!({"parts": [{"text": sys}]});
        }
        if !req.tools.is_empty() {
            let decls: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    })
                })
                .collect();
            body["tools"] = json!([{"functionDeclarations": decls}]);
        }

        debug!(model = %self.model, "sending generateContent request");

        let resp = self
            .client
            .post(self.stream_url())
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::classify("gemini", None, &e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::classify("gemini", Some(status), &text));
        }

        // Scan state: SSE line buffer + a counter assigning distinct indexes
        // to successive functionCall parts (Gemini has no call ids).
        let event_stream = resp
            .bytes_stream()
            .scan((String::new(), 0u32), move |(buf, next_index), chunk| {
                let events: Vec<Result<ResponseEvent, ProviderError>> = match chunk {
                    Ok(b) => {
                        buf.push_str(&String::from_utf8_lossy(&b));
                        drain_gemini_lines(buf, next_index)
                    }
                    Err(e) => vec![Err(ProviderError::classify("gemini", None, &e.to_string()))],
                };
                std::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(event_stream))
    }
}

/// Translate the transcript into Gemini `(systemInstruction, contents)`.
pub(crate) fn build_gemini_contents(messages: &[Message]) -> (Option<String>, Vec<Value>) {
    let mut system_parts: Vec<&str> = Vec::new();
    let mut contents: Vec<Value> = Vec::new();
    // Gemini keys function responses by name; remember what each call id was.
    let mut call_names: std::collections::HashMap<&str, &str> = std::collections::HashMap::new();

    for m in messages {
        match m.role {
            Role::System => system_parts.push(&m.content),
            Role::User => {
                contents.push(json!({"role": "user", "parts": [{"text": m.content}]}));
            }
            Role::Assistant => {
                let mut parts: Vec<Value> = Vec::new();
                if !m.content.is_empty() {
                    parts.push(json!({"text": m.content}));
                }
                if let Some(calls) = &m.tool_calls {
                    for c in calls {
                        call_names.insert(&c.id, &c.name);
                        parts.push(json!({
                            "functionCall": {"name": c.name, "args": c.arguments}
                        }));
                    }
                }
                if parts.is_empty() {
                    parts.push(json!({"text": ""}));
                }
                contents.push(json!({"role": "model", "parts": parts}));
            }
            Role::Tool => {
                let name = m
                    .tool_call_id
                    .as_deref()
                    .and_then(|id| call_names.get(id).copied())
                    .unwrap_or("unknown");
                // functionResponse.response must be an object; tool results
                // are JSON text already, so parse when possible.
                let response: Value = serde_json::from_str(&m.content)
                    .ok()
                    .filter(Value::is_object)
                    .unwrap_or_else(|| json!({"result": m.content}));
                contents.push(json!({
                    "role": "user",
                    "parts": [{"functionResponse": {"name": name, "response": response}}]
                }));
            }
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system, contents)
}

fn drain_gemini_lines(
    buf: &mut String,
    next_index: &mut u32,
) -> Vec<Result<ResponseEvent, ProviderError>> {
    let mut events = Vec::new();
    while let Some(nl_pos) = buf.find('\n') {
        let line = buf[..nl_pos].trim_end_matches('\r').to_string();
        *buf = buf[nl_pos + 1..].to_string();
        if let Some(data) = line.strip_prefix("data: ") {
            if let Ok(v) = serde_json::from_str::<Value>(data.trim()) {
                events.extend(parse_gemini_chunk(&v, next_index).into_iter().map(Ok));
            }
        }
    }
    events
}

/// Map one streamed generateContent chunk onto response events.
fn parse_gemini_chunk(v: &Value, next_index: &mut u32) -> Vec<ResponseEvent> {
    let mut events = Vec::new();

    if let Some(parts) = v["candidates"][0]["content"]["parts"].as_array() {
        for part in parts {
            if let Some(text) = part["text"].as_str() {
                events.push(ResponseEvent::TextDelta(text.to_string()));
            }
            if let Some(fc) = part.get("functionCall") {
                let index = *next_index;
                *next_index += 1;
                events.push(ResponseEvent::ToolCallDelta {
                    index,
                    // Gemini has no call ids; the accumulator synthesizes one.
                    id: String::new(),
                    name: fc["name"].as_str().unwrap_or("").to_string(),
                    arguments: fc["args"].to_string(),
                });
            }
        }
    }

    if let Some(usage) = v.get("usageMetadata") {
        let input = usage["promptTokenCount"].as_u64().unwrap_or(0) as u32;
        let output = usage["candidatesTokenCount"].as_u64().unwrap_or(0) as u32;
        if input > 0 || output > 0 {
            events.push(ResponseEvent::Usage { input_tokens: input, output_tokens: output });
        }
    }

    events
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
