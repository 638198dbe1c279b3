// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The agent orchestrator: drives the user → model → tools → model loop.
//!
//! One `submit` call is one agent turn.  The orchestrator owns the session,
//! persists after every logical step (user message, assistant message, each
//! tool result), gates destructive edits behind the confirmation UI, and
//! bounds the turn to a fixed number of model invocations.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use songbird_config::{AgentConfig, ModelConfig};
use songbird_model::{
    finish_pending, resolve_model_cfg, sanitize, CompletionRequest, Message, ModelProvider,
    PendingToolCall, ProviderConfig, ProviderError, ResponseEvent, ToolCall, ToolSchema,
};
use songbird_session::{Session, SessionStore};
use songbird_tools::ToolRegistry;

use crate::{
    events::AgentEvent,
    fallback::summarize_tool_results,
    prompts::{system_prompt, FOLLOW_UP_INSTRUCTIONS},
    state::TurnState,
    ui::{AskOutcome, StatusHandle as _, UiPort},
};

pub struct Agent {
    session: Session,
    store: SessionStore,
    tools: Arc<ToolRegistry>,
    provider: Box<dyn ModelProvider>,
    ui: Arc<dyn UiPort>,
    config: AgentConfig,
    /// Apply file edits without asking (`SONGBIRD_AUTO_APPLY=y`).
    auto_apply: bool,
    state: TurnState,
}

enum StreamOutcome {
    Completed(String, Vec<ToolCall>),
    Canceled,
    Failed(ProviderError),
}

impl Agent {
    pub fn new(
        provider: Box<dyn ModelProvider>,
        tools: Arc<ToolRegistry>,
        store: SessionStore,
        session: Session,
        ui: Arc<dyn UiPort>,
        config: AgentConfig,
        auto_apply: bool,
    ) -> Self {
        Self {
            session,
            store,
            tools,
            provider,
            ui,
            config,
            auto_apply,
            state: TurnState::Idle,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn provider(&self) -> &dyn ModelProvider {
        self.provider.as_ref()
    }

    /// Persist any pending session changes (used on shutdown).
    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.store.save_session(&mut self.session)
    }

    /// Switch the active model mid-session.
    ///
    /// `override_str` accepts `provider/model`, a bare provider id, or a bare
    /// model name (resolved against `base`).  The switch is recorded in the
    /// session's provider config and as a system-role annotation so resumed
    /// conversations see it.
    pub async fn switch_model(
        &mut self,
        base: &ModelConfig,
        override_str: &str,
        tx: &mpsc::Sender<AgentEvent>,
    ) -> anyhow::Result<()> {
        let cfg = resolve_model_cfg(base, override_str);
        if cfg.provider == self.provider.name() {
            self.provider.set_model(&cfg.name);
        } else {
            self.provider.cleanup();
            self.provider = songbird_model::from_config(&cfg)?;
        }
        self.session.set_provider_config(ProviderConfig {
            provider: cfg.provider.clone(),
            model: cfg.name.clone(),
            api_base: cfg.base_url.clone(),
            resolved_model: Some(self.provider.model_name().to_string()),
        });
        self.session.push(Message::system(format!(
            "Model switched to {}/{}",
            cfg.provider, cfg.name
        )));
        self.store.save_session(&mut self.session)?;
        let _ = tx
            .send(AgentEvent::ModelSwitched { provider: cfg.provider, model: cfg.name })
            .await;
        Ok(())
    }

    /// Run one agent turn.  Events stream through `tx`; the caller drops the
    /// receiver when no longer interested.
    pub async fn submit(
        &mut self,
        user_input: &str,
        tx: mpsc::Sender<AgentEvent>,
    ) -> anyhow::Result<()> {
        // The sender half must stay alive for the duration of the turn — a
        // dropped sender reads as a cancellation signal.
        let (_keep_alive, mut cancel) = oneshot::channel::<()>();
        self.run_turn(user_input, tx, &mut cancel).await
    }

    /// Like [`submit`] but cancellable: sending on (or dropping) the paired
    /// sender interrupts the turn at the next suspension point.  A turn
    /// canceled while awaiting the model appends no assistant message; the
    /// user message stays persisted.
    pub async fn submit_with_cancel(
        &mut self,
        user_input: &str,
        tx: mpsc::Sender<AgentEvent>,
        mut cancel: oneshot::Receiver<()>,
    ) -> anyhow::Result<()> {
        self.run_turn(user_input, tx, &mut cancel).await
    }

    async fn run_turn(
        &mut self,
        user_input: &str,
        tx: mpsc::Sender<AgentEvent>,
        cancel: &mut oneshot::Receiver<()>,
    ) -> anyhow::Result<()> {
        // The system prompt is prepended exactly once, on the first turn.
        if self.session.messages.is_empty() {
            let root = self.session.project_root.display().to_string();
            self.session.push(Message::system(system_prompt(
                &root,
                self.config.system_prompt.as_deref(),
            )));
        }
        self.session.push(Message::user(user_input));
        self.session.set_provider_config(ProviderConfig {
            provider: self.provider.name().to_string(),
            model: self.provider.model_name().to_string(),
            api_base: None,
            resolved_model: None,
        });
        // Persist the user message before the first provider call so a failed
        // turn still leaves a resumable session.
        self.store.save_session(&mut self.session)?;

        let mut iterations = 0u32;
        let mut follow_up = false;
        // Wire results of every executed tool this turn, for the
        // deterministic fallback summary.
        let mut executed: Vec<(String, Value)> = Vec::new();

        loop {
            iterations += 1;
            if iterations > self.config.max_tool_iterations {
                self.session.push(Message::assistant("aborted: too many tool iterations"));
                self.store.save_session(&mut self.session)?;
                self.state = TurnState::Failed;
                let _ = tx.send(AgentEvent::CapExceeded).await;
                return Ok(());
            }

            self.state = TurnState::AwaitingModel;
            let req = self.build_request(follow_up);
            let ui = Arc::clone(&self.ui);
            let mut status = ui.show_status("thinking");
            let outcome = self.stream_one_turn(req, &tx, cancel).await;
            status.stop();

            let (text, tool_calls) = match outcome {
                StreamOutcome::Canceled => {
                    // In-flight call dropped; no assistant message appended.
                    self.session.truncate_to_persisted();
                    self.state = TurnState::Idle;
                    let _ = tx.send(AgentEvent::Aborted).await;
                    return Ok(());
                }
                StreamOutcome::Failed(e) => {
                    if follow_up {
                        // Tools already ran; synthesize a deterministic
                        // summary so their effects are still narrated.
                        warn!(error = %e, "follow-up turn failed; using fallback summary");
                        let refs: Vec<(&str, &Value)> =
                            executed.iter().map(|(n, v)| (n.as_str(), v)).collect();
                        let summary = summarize_tool_results(&refs);
                        self.session.push(Message::assistant(&summary));
                        self.store.save_session(&mut self.session)?;
                        self.state = TurnState::Terminal;
                        let _ = tx.send(AgentEvent::TurnComplete(summary)).await;
                        return Ok(());
                    }
                    warn!(error = %e, "provider call failed");
                    self.ui.show_error(&e.to_string(), e.hints());
                    let _ = tx
                        .send(AgentEvent::ProviderError {
                            message: e.to_string(),
                            hints: e.hints().to_vec(),
                        })
                        .await;
                    self.state = TurnState::Idle;
                    return Ok(());
                }
                StreamOutcome::Completed(text, calls) => (text, calls),
            };

            if tool_calls.is_empty() {
                self.session.push(Message::assistant(&text));
                self.store.save_session(&mut self.session)?;
                self.state = TurnState::Terminal;
                let _ = tx.send(AgentEvent::TurnComplete(text)).await;
                return Ok(());
            }

            // Assistant message that requested the tools keeps its
            // tool_calls field for follow-up prompts.
            self.session
                .push(Message::assistant_with_tool_calls(&text, tool_calls.clone()));
            self.store.save_session(&mut self.session)?;
            self.state = TurnState::DispatchingTools;

            // Sequential dispatch, in model-emitted order.  Each result is
            // persisted before the next tool's destructive phase begins.
            for call in &tool_calls {
                let _ = tx
                    .send(AgentEvent::ToolCallStarted {
                        call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                    })
                    .await;

                let wire = self.dispatch_tool(call).await;
                let content = wire.to_string();
                self.session.push(Message::tool_result(&call.id, &content));
                self.store.save_session(&mut self.session)?;
                executed.push((call.name.clone(), wire.clone()));

                let _ = tx
                    .send(AgentEvent::ToolCallFinished {
                        call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        success: wire["success"].as_bool().unwrap_or(false),
                        output: content,
                    })
                    .await;
            }

            follow_up = true;
        }
    }

    /// Build the provider request: the full transcript, plus — on follow-up
    /// turns — the transient "already displayed" instruction.  Follow-up
    /// turns are sent without tools; the model is synthesizing, not acting.
    fn build_request(&self, follow_up: bool) -> CompletionRequest {
        let mut messages = self.session.messages.clone();
        let tools: Vec<ToolSchema> = if follow_up {
            messages.push(Message::user(FOLLOW_UP_INSTRUCTIONS));
            Vec::new()
        } else {
            self.tools
                .schemas()
                .into_iter()
                .map(|s| ToolSchema {
                    name: s.name,
                    description: s.description,
                    parameters: s.parameters,
                })
                .collect()
        };
        CompletionRequest { messages, tools }
    }

    /// Execute one tool call, interposing the confirmation gate for tools
    /// that present an edit preview.  Returns the sanitized wire result.
    async fn dispatch_tool(&mut self, call: &ToolCall) -> Value {
        let Some(tool) = self.tools.get(&call.name) else {
            return json!({"success": false, "error": format!("unknown tool: {}", call.name)});
        };
        let tool_call =
            songbird_tools::ToolCall::new(&call.id, &call.name, call.arguments.clone());

        let previews: Vec<_> = tool
            .preview(&tool_call)
            .await
            .into_iter()
            .filter(|p| p.changes_made)
            .collect();

        let result = if previews.is_empty() || self.auto_apply {
            tool.execute(&tool_call).await.to_value()
        } else {
            self.state = TurnState::AwaitingConfirmation;
            let ui = Arc::clone(&self.ui);
            for p in &previews {
                ui.show_diff(&p.path, &p.diff);
            }
            let outcome = ui.ask("Apply these changes?", &["Yes", "No"], 0).await;
            self.state = TurnState::DispatchingTools;
            match outcome {
                AskOutcome::Selected(0) => tool.execute(&tool_call).await.to_value(),
                _ => {
                    debug!(tool = %call.name, "edit declined by user");
                    json!({"success": false, "message": "Changes cancelled by user"})
                }
            }
        };

        // Mandatory before transport: strip anything that is not
        // JSON-native plain text.
        sanitize::json_safe(result)
    }

    /// Drive one provider stream to completion, forwarding deltas as events.
    /// Cancellation is observed between every delta; dropping the stream
    /// closes the underlying connection.
    async fn stream_one_turn(
        &mut self,
        req: CompletionRequest,
        tx: &mpsc::Sender<AgentEvent>,
        cancel: &mut oneshot::Receiver<()>,
    ) -> StreamOutcome {
        let mut stream = tokio::select! {
            biased;
            _ = &mut *cancel => return StreamOutcome::Canceled,
            s = self.provider.stream_chat(req) => match s {
                Ok(s) => s,
                Err(e) => return StreamOutcome::Failed(e),
            },
        };

        let mut text = String::new();
        let mut pending: HashMap<u32, PendingToolCall> = HashMap::new();

        loop {
            let event = tokio::select! {
                biased;
                _ = &mut *cancel => return StreamOutcome::Canceled,
                ev = futures::StreamExt::next(&mut stream) => ev,
            };
            let Some(event) = event else { break };
            match event {
                Ok(ResponseEvent::TextDelta(delta)) if !delta.is_empty() => {
                    text.push_str(&delta);
                    let _ = tx.send(AgentEvent::TextDelta(delta)).await;
                }
                Ok(ResponseEvent::TextDelta(_)) => {}
                Ok(ResponseEvent::ToolCallDelta { index, id, name, arguments }) => {
                    let slot = pending.entry(index).or_default();
                    if !id.is_empty() {
                        slot.id = id;
                    }
                    if !name.is_empty() {
                        slot.name = name;
                    }
                    slot.args_buf.push_str(&arguments);
                }
                Ok(ResponseEvent::Usage { input_tokens, output_tokens }) => {
                    let _ = tx
                        .send(AgentEvent::TokenUsage { input: input_tokens, output: output_tokens })
                        .await;
                }
                Ok(ResponseEvent::Done) => break,
                Ok(ResponseEvent::Error(e)) => warn!("model stream error: {e}"),
                Err(e) => return StreamOutcome::Failed(e),
            }
        }

        if !text.is_empty() {
            let _ = tx.send(AgentEvent::TextComplete(text.clone())).await;
        }
        StreamOutcome::Completed(text, finish_pending(pending))
    }
}
