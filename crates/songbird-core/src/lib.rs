// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod agent;
mod events;
mod fallback;
mod interrupt;
mod prompts;
mod state;
mod ui;

pub use agent::Agent;
pub use events::AgentEvent;
pub use fallback::summarize_tool_results;
pub use interrupt::{InterruptController, TapAction};
pub use prompts::{system_prompt, FOLLOW_UP_INSTRUCTIONS};
pub use state::TurnState;
pub use ui::{AskOutcome, AutoApplyUi, NullStatus, StatusHandle, UiPort};
