// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Mock providers for tests.  No network; fully deterministic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;

use crate::{
    discovery::DiscoveredModel, provider::ResponseStream, CompletionRequest, ModelProvider,
    ProviderError, ResponseEvent,
};

/// Echoes the last user message.  Useful for wiring tests.
#[derive(Default)]
pub struct MockProvider {
    list_models_calls: AtomicUsize,
}

impl MockProvider {
    pub fn list_models_calls(&self) -> usize {
        self.list_models_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }

    fn set_model(&mut self, _model: &str) {}

    async fn stream_chat(&self, req: CompletionRequest) -> Result<ResponseStream, ProviderError> {
        let last_user = req
            .messages
            .iter()
            .rev()
            .find(|m| m.role == crate::Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let events = vec![
            Ok(ResponseEvent::TextDelta(format!("echo: {last_user}"))),
            Ok(ResponseEvent::Done),
        ];
        Ok(Box::pin(stream::iter(events)))
    }

    async fn list_models(&self) -> Result<Vec<DiscoveredModel>, ProviderError> {
        self.list_models_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![DiscoveredModel {
            id: "mock-model".into(),
            display_name: "Mock Model".into(),
            provider: "mock".into(),
            supports_function_calling: true,
            supports_streaming: true,
            context_length: Some(8192),
            description: Some("deterministic test model".into()),
            pricing_per_token: None,
        }])
    }
}

/// One scripted model turn.
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// Plain text answer.
    Text(String),
    /// Text (may be empty) plus tool calls given as `(name, arguments)`.
    /// Call ids are synthesized as `call_1`, `call_2`, … per turn.
    ToolCalls(String, Vec<(String, Value)>),
    /// Fail with an HTTP-style status and message, classified like a real
    /// provider error.
    Fail(u16, String),
}

/// Plays back a fixed script of turns; used to drive the orchestrator state
/// machine without a network.
pub struct ScriptedMockProvider {
    script: Mutex<VecDeque<ScriptedTurn>>,
    /// When the script runs dry, keep replaying the last turn instead of
    /// failing.  This is how an endlessly-tool-calling model is simulated.
    repeat_last: bool,
    last: Mutex<Option<ScriptedTurn>>,
    calls: AtomicUsize,
    model: String,
}

impl ScriptedMockProvider {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            script: Mutex::new(turns.into()),
            repeat_last: false,
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            model: "scripted-mock".into(),
        }
    }

    /// A provider that replays its final scripted turn forever.
    pub fn repeating(turns: Vec<ScriptedTurn>) -> Self {
        let mut p = Self::new(turns);
        p.repeat_last = true;
        p
    }

    /// Number of completion calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_turn(&self) -> Option<ScriptedTurn> {
        let mut script = self.script.lock().expect("script lock");
        match script.pop_front() {
            Some(turn) => {
                *self.last.lock().expect("last lock") = Some(turn.clone());
                Some(turn)
            }
            None if self.repeat_last => self.last.lock().expect("last lock").clone(),
            None => None,
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedMockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, model: &str) {
        self.model = model.to_string();
    }

    async fn stream_chat(&self, _req: CompletionRequest) -> Result<ResponseStream, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let turn = self.next_turn().ok_or_else(|| {
            ProviderError::classify("mock", Some(500), "scripted mock exhausted")
        })?;

        let mut events: Vec<Result<ResponseEvent, ProviderError>> = Vec::new();
        match turn {
            ScriptedTurn::Text(text) => {
                events.push(Ok(ResponseEvent::TextDelta(text)));
            }
            ScriptedTurn::ToolCalls(text, calls) => {
                if !text.is_empty() {
                    events.push(Ok(ResponseEvent::TextDelta(text)));
                }
                for (i, (name, args)) in calls.into_iter().enumerate() {
                    events.push(Ok(ResponseEvent::ToolCallDelta {
                        index: i as u32,
                        id: format!("call_{}", i + 1),
                        name,
                        arguments: args.to_string(),
                    }));
                }
            }
            ScriptedTurn::Fail(status, message) => {
                return Err(ProviderError::classify("mock", Some(status), &message));
            }
        }
        events.push(Ok(ResponseEvent::Usage { input_tokens: 1, output_tokens: 1 }));
        events.push(Ok(ResponseEvent::Done));
        Ok(Box::pin(stream::iter(events)))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;
    use serde_json::json;

    #[tokio::test]
    async fn mock_provider_echoes_user_message() {
        let p = MockProvider::default();
        let req = CompletionRequest::new(vec![Message::user("ping")]);
        let resp = p.chat_with_messages(req).await.unwrap();
        assert_eq!(resp.content, "echo: ping");
    }

    #[tokio::test]
    async fn scripted_turns_play_in_order() {
        let p = ScriptedMockProvider::new(vec![
            ScriptedTurn::Text("one".into()),
            ScriptedTurn::Text("two".into()),
        ]);
        let r1 = p.chat_with_messages(CompletionRequest::default()).await.unwrap();
        let r2 = p.chat_with_messages(CompletionRequest::default()).await.unwrap();
        assert_eq!(r1.content, "one");
        assert_eq!(r2.content, "two");
        assert_eq!(p.calls(), 2);
    }

    #[tokio::test]
    async fn scripted_tool_calls_get_synthesized_ids() {
        let p = ScriptedMockProvider::new(vec![ScriptedTurn::ToolCalls(
            String::new(),
            vec![("file_read".into(), json!({"path": "a.txt"}))],
        )]);
        let resp = p.chat_with_messages(CompletionRequest::default()).await.unwrap();
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].id, "call_1");
        assert_eq!(resp.tool_calls[0].name, "file_read");
    }

    #[tokio::test]
    async fn exhausted_script_errors() {
        let p = ScriptedMockProvider::new(vec![]);
        assert!(p.chat_with_messages(CompletionRequest::default()).await.is_err());
    }

    #[tokio::test]
    async fn repeating_provider_replays_last_turn() {
        let p = ScriptedMockProvider::repeating(vec![ScriptedTurn::ToolCalls(
            String::new(),
            vec![("ls".into(), json!({}))],
        )]);
        for _ in 0..5 {
            let resp = p.chat_with_messages(CompletionRequest::default()).await.unwrap();
            assert_eq!(resp.tool_calls.len(), 1);
        }
        assert_eq!(p.calls(), 5);
    }

    #[tokio::test]
    async fn scripted_failure_is_classified() {
        let p = ScriptedMockProvider::new(vec![ScriptedTurn::Fail(401, "bad api key".into())]);
        let err = p.chat_with_messages(CompletionRequest::default()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Auth { .. }));
    }
}
