// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use songbird_model::{Message, ProviderConfig};

/// One line of a session JSONL file.
///
/// `message` records carry a full transcript entry; `meta` records carry
/// session-level state.  On replay, later `meta` records override earlier
/// ones field-by-field, which lets a save append a summary update without
/// rewriting the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionRecord {
    Message {
        #[serde(flatten)]
        message: Message,
    },
    Meta {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project_root: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created_at: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        updated_at: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_config: Option<ProviderConfig>,
    },
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
