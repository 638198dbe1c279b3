// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::warn;

use crate::{
    discovery::DiscoveredModel, repair::parse_tool_arguments, ChatResponse, CompletionRequest,
    ProviderError, ResponseEvent, ToolCall, Usage,
};

pub type ResponseStream =
    Pin<Box<dyn Stream<Item = Result<ResponseEvent, ProviderError>> + Send>>;

/// Capability set every model backend satisfies.
///
/// Adapters translate the canonical tool-calling contract to and from their
/// vendor wire format; nothing outside this crate sees raw provider payloads.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Stable provider id for status display and error classification.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Swap the active model.  Implementations flush any per-model cached
    /// state when the name actually changes.
    fn set_model(&mut self, model: &str);

    /// Send a completion request and return a stream of deltas.
    ///
    /// The returned stream is closed when dropped, including on early
    /// cancellation mid-turn.
    async fn stream_chat(&self, req: CompletionRequest) -> Result<ResponseStream, ProviderError>;

    /// Non-streaming completion: drives [`stream_chat`] to completion and
    /// aggregates the deltas into a [`ChatResponse`].
    async fn chat_with_messages(
        &self,
        req: CompletionRequest,
    ) -> Result<ChatResponse, ProviderError> {
        let stream = self.stream_chat(req).await?;
        let collected = collect_stream(stream).await?;
        Ok(ChatResponse {
            model: self.model_name().to_string(),
            ..collected
        })
    }

    /// List models available from this provider.
    ///
    /// The default implementation returns the static entries for this
    /// provider.  Adapters with a live listing endpoint override this and
    /// merge the results with the static metadata.
    async fn list_models(&self) -> Result<Vec<DiscoveredModel>, ProviderError> {
        Ok(crate::discovery::static_models(self.name()))
    }

    /// Release held resources.  Must be idempotent; the shared HTTP pool is
    /// process-wide and survives individual provider teardown.
    fn cleanup(&self) {}
}

/// Drive a response stream to completion, accumulating text, tool calls, and
/// usage into a [`ChatResponse`].
///
/// Tool-call fragments are keyed by the provider's parallel-call `index` and
/// flushed in index order once the stream ends, so interleaved argument
/// deltas reassemble correctly.
pub async fn collect_stream(mut stream: ResponseStream) -> Result<ChatResponse, ProviderError> {
    let mut content = String::new();
    let mut usage: Option<Usage> = None;
    let mut pending: HashMap<u32, PendingToolCall> = HashMap::new();

    while let Some(event) = stream.next().await {
        match event? {
            ResponseEvent::TextDelta(t) => content.push_str(&t),
            ResponseEvent::ToolCallDelta { index, id, name, arguments } => {
                let slot = pending.entry(index).or_default();
                if !id.is_empty() {
                    slot.id = id;
                }
                if !name.is_empty() {
                    slot.name = name;
                }
                slot.args_buf.push_str(&arguments);
            }
            ResponseEvent::Usage { input_tokens, output_tokens } => {
                usage = Some(Usage { input_tokens, output_tokens });
            }
            ResponseEvent::Error(e) => warn!("model stream error: {e}"),
            ResponseEvent::Done => break,
        }
    }

    Ok(ChatResponse {
        content,
        model: String::new(),
        usage,
        tool_calls: finish_pending(pending),
    })
}

/// Accumulator for one in-flight tool call during streaming.
#[derive(Debug, Default)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    pub args_buf: String,
}

/// Flush accumulated parallel tool calls, ordered by index.
///
/// Calls with an empty name cannot be dispatched and are dropped — storing
/// them would corrupt the transcript sent back on the next turn.  An empty id
/// gets a synthetic fallback so the turn can still complete.
pub fn finish_pending(pending: HashMap<u32, PendingToolCall>) -> Vec<ToolCall> {
    let mut sorted: Vec<(u32, PendingToolCall)> = pending.into_iter().collect();
    sorted.sort_by_key(|(idx, _)| *idx);

    let mut calls = Vec::with_capacity(sorted.len());
    for (i, (_, ptc)) in sorted.into_iter().enumerate() {
        if ptc.name.is_empty() {
            warn!(tool_call_id = %ptc.id, "dropping tool call with empty name from model");
            continue;
        }
        let arguments = parse_tool_arguments(&ptc.args_buf).unwrap_or_else(|e| {
            warn!(
                tool_name = %ptc.name,
                error = %e,
                "tool call arguments unparseable after repair; substituting {{}}"
            );
            serde_json::Value::Object(Default::default())
        });
        let id = if ptc.id.is_empty() {
            warn!(tool_name = %ptc.name, "tool call had empty id; generating synthetic id");
            format!("tc_synthetic_{i}")
        } else {
            ptc.id
        };
        calls.push(ToolCall { id, name: ptc.name, arguments });
    }
    calls
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;

    fn ok_stream(events: Vec<ResponseEvent>) -> ResponseStream {
        Box::pin(stream::iter(events.into_iter().map(Ok)))
    }

    #[tokio::test]
    async fn collect_concatenates_text_deltas() {
        let s = ok_stream(vec![
            ResponseEvent::TextDelta("Hello".into()),
            ResponseEvent::TextDelta(", world".into()),
            ResponseEvent::Done,
        ]);
        let resp = collect_stream(s).await.unwrap();
        assert_eq!(resp.content, "Hello, world");
        assert!(resp.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn collect_reassembles_split_tool_arguments() {
        let s = ok_stream(vec![
            ResponseEvent::ToolCallDelta {
                index: 0,
                id: "call_1".into(),
                name: "file_read".into(),
                arguments: r#"{"path""#.into(),
            },
            ResponseEvent::ToolCallDelta {
                index: 0,
                id: "".into(),
                name: "".into(),
                arguments: r#": "a.txt"}"#.into(),
            },
            ResponseEvent::Done,
        ]);
        let resp = collect_stream(s).await.unwrap();
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].id, "call_1");
        assert_eq!(resp.tool_calls[0].arguments, json!({"path": "a.txt"}));
    }

    #[tokio::test]
    async fn collect_orders_parallel_calls_by_index() {
        let s = ok_stream(vec![
            ResponseEvent::ToolCallDelta {
                index: 1,
                id: "b".into(),
                name: "grep".into(),
                arguments: "{}".into(),
            },
            ResponseEvent::ToolCallDelta {
                index: 0,
                id: "a".into(),
                name: "glob".into(),
                arguments: "{}".into(),
            },
            ResponseEvent::Done,
        ]);
        let resp = collect_stream(s).await.unwrap();
        let ids: Vec<&str> = resp.tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn collect_captures_usage() {
        let s = ok_stream(vec![
            ResponseEvent::TextDelta("ok".into()),
            ResponseEvent::Usage { input_tokens: 10, output_tokens: 2 },
            ResponseEvent::Done,
        ]);
        let resp = collect_stream(s).await.unwrap();
        let usage = resp.usage.unwrap();
        assert_eq!(usage.input_tokens, 10);
        assert_eq!(usage.output_tokens, 2);
    }

    #[test]
    fn empty_name_calls_are_dropped() {
        let mut pending = HashMap::new();
        pending.insert(0, PendingToolCall { id: "x".into(), name: "".into(), args_buf: "{}".into() });
        assert!(finish_pending(pending).is_empty());
    }

    #[test]
    fn empty_id_gets_synthetic_fallback() {
        let mut pending = HashMap::new();
        pending.insert(
            0,
            PendingToolCall { id: "".into(), name: "ls".into(), args_buf: "{}".into() },
        );
        let calls = finish_pending(pending);
        assert_eq!(calls[0].id, "tc_synthetic_0");
    }

    #[test]
    fn empty_arguments_become_empty_object() {
        let mut pending = HashMap::new();
        pending.insert(
            0,
            PendingToolCall { id: "c".into(), name: "ls".into(), args_buf: String::new() },
        );
        let calls = finish_pending(pending);
        assert!(calls[0].arguments.as_object().unwrap().is_empty());
    }
}
