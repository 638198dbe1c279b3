// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Native Anthropic Messages API adapter.
//!
//! Anthropic does not speak the OpenAI wire format: the system prompt is a
//! top-level field, tool calls are `tool_use` content blocks, and tool
//! results travel back as `tool_result` blocks inside a user message.  This
//! adapter translates the canonical transcript both ways and maps the
//! Messages SSE event dialect onto [`ResponseEvent`].

use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    discovery::static_lookup,
    http::shared_client,
    provider::ResponseStream,
    CompletionRequest, Message, ModelProvider, ProviderError, ResponseEvent, Role,
};

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    model: String,
    api_key: Option<String>,
    messages_url: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
    compat_checked: Mutex<Option<String>>,
}

impl AnthropicProvider {
    pub fn new(
        model: String,
        api_key: Option<String>,
        base_url: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Self {
        let base = base_url.unwrap_or_else(|| "https://api.anthropic.com".into());
        Self {
            model,
            api_key,
            messages_url: format!("{}/v1/messages", base.trim_end_matches('/')),
            max_tokens: max_tokens.unwrap_or(4096),
            temperature: temperature.unwrap_or(0.2),
            client: shared_client(),
            compat_checked: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
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

    async fn stream_chat(&self, req: CompletionRequest) -> Result<ResponseStream, ProviderError> {
        {
            let mut checked = self.compat_checked.lock().expect("compat lock");
            if checked.as_deref() != Some(self.model.as_str()) {
                if static_lookup("anthropic", &self.model).is_none() {
                    debug!(model = %self.model, "model not in static catalog; proceeding anyway");
                }
                *checked = Some(self.model.clone());
            }
        }

        let key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::classify("anthropic", Some(401), "API key not set")
        })?;

        let (system, messages) = build_anthropic_messages(&req.messages);
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "stream": true,
        });
        if let Some(sys) = system {
            body["system"] = json!(sys);
        }
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = json!({"type": "auto"});
        }

        debug!(model = %self.model, message_count = messages.len(), "sending messages request");

        let resp = self
            .client
            .post(&self.messages_url)
            .header("x-api-key", key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::classify("anthropic", None, &e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::classify("anthropic", Some(status), &text));
        }

        // Scan state: SSE line buffer + input token count from message_start,
        // reported together with output tokens at message_delta.
        let event_stream = resp
            .bytes_stream()
            .scan((String::new(), 0u32), move |(buf, input_tokens), chunk| {
                let events: Vec<Result<ResponseEvent, ProviderError>> = match chunk {
                    Ok(b) => {
                        buf.push_str(&String::from_utf8_lossy(&b));
                        drain_anthropic_lines(buf, input_tokens)
                    }
                    Err(e) => {
                        vec![Err(ProviderError::classify("anthropic", None, &e.to_string()))]
                    }
                };
                std::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(event_stream))
    }
}

/// Split the transcript into Anthropic's `(system, messages)` shape.
///
/// - System messages are concatenated into the top-level system field.
/// - Assistant tool calls become `tool_use` content blocks.
/// - Tool results become `tool_result` blocks inside a user message.
pub(crate) fn build_anthropic_messages(messages: &[Message]) -> (Option<String>, Vec<Value>) {
    let mut system_parts: Vec<&str> = Vec::new();
    let mut wire: Vec<Value> = Vec::new();

    for m in messages {
        match m.role {
            Role::System => system_parts.push(&m.content),
            Role::User => wire.push(json!({"role": "user", "content": m.content})),
            Role::Assistant => {
                let mut blocks: Vec<Value> = Vec::new();
                if !m.content.is_empty() {
                    blocks.push(json!({"type": "text", "text": m.content}));
                }
                if let Some(calls) = &m.tool_calls {
                    for c in calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": c.id,
                            "name": c.name,
                            "input": c.arguments,
                        }));
                    }
                }
                if blocks.is_empty() {
                    blocks.push(json!({"type": "text", "text": ""}));
                }
                wire.push(json!({"role": "assistant", "content": blocks}));
            }
            Role::Tool => {
                let block = json!({
                    "type": "tool_result",
                    "tool_use_id": m.tool_call_id.as_deref().unwrap_or(""),
                    "content": m.content,
                });
                // Consecutive tool results may be merged into one user message;
                // sending them separately is also accepted by the API.
                wire.push(json!({"role": "user", "content": [block]}));
            }
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system, wire)
}

fn drain_anthropic_lines(
    buf: &mut String,
    input_tokens: &mut u32,
) -> Vec<Result<ResponseEvent, ProviderError>> {
    let mut events = Vec::new();
    while let Some(nl_pos) = buf.find('\n') {
        let line = buf[..nl_pos].trim_end_matches('\r').to_string();
        *buf = buf[nl_pos + 1..].to_string();
        if let Some(ev) = parse_anthropic_data_line(&line, input_tokens) {
            events.push(Ok(ev));
        }
    }
    events
}

/// Parse one `data:` line of the Messages SSE dialect.
///
/// `event:` lines are redundant (every data payload carries a `type`) and
/// are skipped along with comments and blanks.
fn parse_anthropic_data_line(line: &str, input_tokens: &mut u32) -> Option<ResponseEvent> {
    let data = line.strip_prefix("data: ")?.trim();
    if data.is_empty() {
        return None;
    }
    let v: Value = serde_json::from_str(data).ok()?;

    match v["type"].as_str()? {
        "message_start" => {
            *input_tokens = v["message"]["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32;
            None
        }
        "content_block_start" => {
            let block = &v["content_block"];
            if block["type"] == "tool_use" {
                Some(ResponseEvent::ToolCallDelta {
                    index: v["index"].as_u64().unwrap_or(0) as u32,
                    id: block["id"].as_str().unwrap_or("").to_string(),
                    name: block["name"].as_str().unwrap_or("").to_string(),
                    arguments: String::new(),
                })
            } else {
                None
            }
        }
        "content_block_delta" => {
            let delta = &v["delta"];
            match delta["type"].as_str() {
                Some("text_delta") => Some(ResponseEvent::TextDelta(
                    delta["text"].as_str().unwrap_or("").to_string(),
                )),
                Some("input_json_delta") => Some(ResponseEvent::ToolCallDelta {
                    index: v["index"].as_u64().unwrap_or(0) as u32,
                    id: String::new(),
                    name: String::new(),
                    arguments: delta["partial_json"].as_str().unwrap_or("").to_string(),
                }),
                _ => None,
            }
        }
        "message_delta" => Some(ResponseEvent::Usage {
            input_tokens: *input_tokens,
            output_tokens: v["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
        }),
        "message_stop" => Some(ResponseEvent::Done),
        "error" => Some(ResponseEvent::Error(
            v["error"]["message"].as_str().unwrap_or("unknown stream error").to_string(),
        )),
        _ => None,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolCall;
    use serde_json::json;

    #[test]
    fn system_messages_are_lifted_to_top_level() {
        let msgs = vec![Message::system("be terse"), Message::user("hi")];
        let (system, wire) = build_anthropic_messages(&msgs);
        assert_eq!(system.as_deref(), Some("be terse"));
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0]["role"], "user");
    }

    #[test]
    fn assistant_tool_calls_become_tool_use_blocks() {
        let call = ToolCall::new("toolu_1", "file_read", json!({"path": "a.txt"}));
        let msgs = vec![Message::assistant_with_tool_calls("reading", vec![call])];
        let (_, wire) = build_anthropic_messages(&msgs);
        let blocks = wire[0]["content"].as_array().unwrap();
        assert_eq!(blocks[0]["type"], "text");
        assert_eq!(blocks[1]["type"], "tool_use");
        assert_eq!(blocks[1]["id"], "toolu_1");
        assert_eq!(blocks[1]["input"], json!({"path": "a.txt"}));
    }

    #[test]
    fn empty_assistant_tool_call_message_has_no_empty_text_block() {
        let call = ToolCall::new("toolu_2", "ls", json!({}));
        let msgs = vec![Message::assistant_with_tool_calls("", vec![call])];
        let (_, wire) = build_anthropic_messages(&msgs);
        let blocks = wire[0]["content"].as_array().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["type"], "tool_use");
    }

    #[test]
    fn tool_results_become_tool_result_blocks_in_user_messages() {
        let msgs = vec![Message::tool_result("toolu_1", r#"{"success":true}"#)];
        let (_, wire) = build_anthropic_messages(&msgs);
        assert_eq!(wire[0]["role"], "user");
        let block = &wire[0]["content"][0];
        assert_eq!(block["type"], "tool_result");
        assert_eq!(block["tool_use_id"], "toolu_1");
    }

    #[test]
    fn text_delta_events_are_mapped() {
        let mut input = 0u32;
        let line = r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#;
        let ev = parse_anthropic_data_line(line, &mut input).unwrap();
        assert!(matches!(ev, ResponseEvent::TextDelta(t) if t == "Hi"));
    }

    #[test]
    fn tool_use_start_maps_to_tool_call_delta() {
        let mut input = 0u32;
        let line = r#"data: {"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_9","name":"shell_exec"}}"#;
        let ev = parse_anthropic_data_line(line, &mut input).unwrap();
        match ev {
            ResponseEvent::ToolCallDelta { index, id, name, arguments } => {
                assert_eq!(index, 1);
                assert_eq!(id, "toolu_9");
                assert_eq!(name, "shell_exec");
                assert!(arguments.is_empty());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn input_json_delta_carries_argument_fragment() {
        let mut input = 0u32;
        let line = r#"data: {"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"command\":"}}"#;
        let ev = parse_anthropic_data_line(line, &mut input).unwrap();
        match ev {
            ResponseEvent::ToolCallDelta { arguments, .. } => {
                assert_eq!(arguments, "{\"command\":");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn usage_combines_message_start_and_delta() {
        let mut input = 0u32;
        let start = r#"data: {"type":"message_start","message":{"usage":{"input_tokens":120}}}"#;
        assert!(parse_anthropic_data_line(start, &mut input).is_none());
        assert_eq!(input, 120);

        let delta = r#"data: {"type":"message_delta","delta":{},"usage":{"output_tokens":33}}"#;
        let ev = parse_anthropic_data_line(delta, &mut input).unwrap();
        assert!(matches!(
            ev,
            ResponseEvent::Usage { input_tokens: 120, output_tokens: 33 }
        ));
    }

    #[test]
    fn message_stop_is_done() {
        let mut input = 0u32;
        let ev = parse_anthropic_data_line(r#"data: {"type":"message_stop"}"#, &mut input).unwrap();
        assert!(matches!(ev, ResponseEvent::Done));
    }

    #[test]
    fn ping_events_are_ignored() {
        let mut input = 0u32;
        assert!(parse_anthropic_data_line(r#"data: {"type":"ping"}"#, &mut input).is_none());
        assert!(parse_anthropic_data_line("event: ping", &mut input).is_none());
    }
}
