// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use songbird_model::{Message, ProviderConfig, Role};
use uuid::Uuid;

/// In-memory session: the persistent transcript plus provider config for one
/// working directory.  Mutated only through the orchestrator; persisted by
/// [`crate::SessionStore`].
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub project_root: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Short human-readable line derived from the transcript; regenerated on
    /// every save.
    pub summary: String,
    pub provider_config: Option<ProviderConfig>,
    pub messages: Vec<Message>,
    /// Number of messages already appended to the session file.  Messages
    /// beyond this index are written on the next save.
    pub(crate) persisted_messages: usize,
    /// Set when provider_config changed since the last save.
    pub(crate) meta_dirty: bool,
}

impl Session {
    pub fn new(project_root: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            project_root,
            created_at: now,
            updated_at: now,
            summary: String::new(),
            provider_config: None,
            messages: Vec::new(),
            persisted_messages: 0,
            meta_dirty: false,
        }
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    /// Remove messages appended after the last save (used to roll back a
    /// failed turn so the transcript never contains an orphan assistant).
    pub fn truncate_to_persisted(&mut self) {
        self.messages.truncate(self.persisted_messages);
    }

    pub fn set_provider_config(&mut self, cfg: ProviderConfig) {
        if self.provider_config.as_ref() != Some(&cfg) {
            self.provider_config = Some(cfg);
            self.meta_dirty = true;
        }
    }

    /// Messages not yet written to disk.
    pub fn unsaved_messages(&self) -> &[Message] {
        &self.messages[self.persisted_messages.min(self.messages.len())..]
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.meta_dirty || self.persisted_messages < self.messages.len()
    }
}

/// Lightweight listing entry: everything but the message bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStub {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub summary: String,
    pub n_messages: usize,
}

/// Derive the human-readable summary for a session: the first user message,
/// collapsed to one line and truncated.
pub fn summarize(messages: &[Message]) -> String {
    const MAX: usize = 64;
    let first_user = messages.iter().find(|m| m.role == Role::User);
    let text = match first_user {
        Some(m) => m.content.split_whitespace().collect::<Vec<_>>().join(" "),
        None => return "(empty session)".into(),
    };
    if text.chars().count() <= MAX {
        text
    } else {
        let truncated: String = text.chars().take(MAX).collect();
        format!("{truncated}…")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
