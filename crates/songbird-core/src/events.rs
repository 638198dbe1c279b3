// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
/// Events streamed from the orchestrator to the front end.
///
/// Deltas arrive in model order; once `TurnComplete`, `Aborted`, or
/// `CapExceeded` is received, no further events for that turn are emitted.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A text delta streamed from the model.
    TextDelta(String),
    /// The full text of one model response (after streaming finished).
    TextComplete(String),
    ToolCallStarted {
        call_id: String,
        tool_name: String,
    },
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        success: bool,
        /// JSON-encoded tool result, as placed in the transcript.
        output: String,
    },
    TokenUsage {
        input: u32,
        output: u32,
    },
    /// The turn ended normally; the payload is the final assistant text.
    TurnComplete(String),
    /// Cancellation fired mid-turn; the transcript ends at the last
    /// persisted message.
    Aborted,
    /// The iteration bound was reached and a terminal message recorded.
    CapExceeded,
    /// A recoverable provider failure; the session returns to idle.
    ProviderError {
        message: String,
        hints: Vec<String>,
    },
    /// The active model changed (recorded in the session).
    ModelSwitched {
        provider: String,
        model: String,
    },
}
