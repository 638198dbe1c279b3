// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Append-only JSONL session store, partitioned by project root.
//!
//! Layout:
//! ```text
//! <base>/projects/<sanitized-project-root>/
//!     sessions/<session-id>.jsonl
//!     index.json
//!     todos.json
//! ```
//!
//! Each session file is a sequence of [`SessionRecord`] lines.  Appends are
//! line-atomic; the index is replaced via temp-file + rename so concurrent
//! listers always see a consistent snapshot.  A corrupt line in a session
//! file is skipped with a warning and the rest of the session loads.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use tracing::warn;

use crate::{
    record::SessionRecord,
    session::{summarize, Session, SessionStub},
};

pub struct SessionStore {
    project_root: PathBuf,
    project_dir: PathBuf,
    sessions_dir: PathBuf,
    index_path: PathBuf,
}

impl SessionStore {
    /// Open (creating directories as needed) the store for one project.
    pub fn open(base: &Path, project_root: &Path) -> anyhow::Result<Self> {
        let project_dir = crate::paths::project_dir(base, project_root);
        let sessions_dir = project_dir.join("sessions");
        fs::create_dir_all(&sessions_dir)
            .with_context(|| format!("creating session dir {}", sessions_dir.display()))?;
        Ok(Self {
            project_root: project_root.to_path_buf(),
            index_path: project_dir.join("index.json"),
            project_dir,
            sessions_dir,
        })
    }

    /// Open the store under the default base (`~/.songbird`).
    pub fn open_default(project_root: &Path) -> anyhow::Result<Self> {
        Self::open(&crate::paths::default_base(), project_root)
    }

    /// Directory holding per-project auxiliary files (todos.json lives here).
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn create_session(&self) -> Session {
        Session::new(self.project_root.clone())
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{id}.jsonl"))
    }

    /// Append any new records since the last save and refresh the index.
    ///
    /// Saving an unchanged session is a no-op, byte for byte: nothing is
    /// appended and the index is left alone.
    pub fn save_session(&self, session: &mut Session) -> anyhow::Result<()> {
        let path = self.session_path(&session.id);
        let is_new = !path.exists();
        let new_summary = summarize(&session.messages);
        let summary_changed = new_summary != session.summary;

        if !is_new && !session.has_unsaved_changes() && !summary_changed {
            return Ok(());
        }

        session.updated_at = Utc::now();
        session.summary = new_summary;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening session file {}", path.display()))?;

        if is_new {
            // Header meta identifies the session even if the index is lost.
            let header = SessionRecord::Meta {
                id: Some(session.id.clone()),
                project_root: Some(session.project_root.to_string_lossy().into_owned()),
                created_at: Some(session.created_at),
                updated_at: Some(session.updated_at),
                summary: None,
                provider_config: None,
            };
            append_record(&mut file, &header)?;
        }

        for message in session.unsaved_messages() {
            append_record(&mut file, &SessionRecord::Message { message: message.clone() })?;
        }
        session.persisted_messages = session.messages.len();

        let meta = SessionRecord::Meta {
            id: None,
            project_root: None,
            created_at: None,
            updated_at: Some(session.updated_at),
            summary: Some(session.summary.clone()),
            provider_config: session.provider_config.clone(),
        };
        append_record(&mut file, &meta)?;
        file.flush()?;
        session.meta_dirty = false;

        self.update_index(session)?;
        Ok(())
    }

    /// Load a full session by id, replaying records in order.  Malformed
    /// lines are skipped with a warning; later meta records override earlier
    /// ones.
    pub fn load_session(&self, id: &str) -> anyhow::Result<Session> {
        let path = self.session_path(id);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading session {}", path.display()))?;

        let mut session = Session::new(self.project_root.clone());
        session.id = id.to_string();

        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: SessionRecord = match serde_json::from_str(line) {
                Ok(r) => r,
                Err(e) => {
                    warn!(
                        session = %id,
                        line = lineno + 1,
                        error = %e,
                        "skipping malformed session record"
                    );
                    continue;
                }
            };
            match record {
                SessionRecord::Message { message } => session.messages.push(message),
                SessionRecord::Meta {
                    id: _,
                    project_root,
                    created_at,
                    updated_at,
                    summary,
                    provider_config,
                } => {
                    if let Some(root) = project_root {
                        session.project_root = PathBuf::from(root);
                    }
                    if let Some(at) = created_at {
                        session.created_at = at;
                    }
                    if let Some(at) = updated_at {
                        session.updated_at = at;
                    }
                    if let Some(s) = summary {
                        session.summary = s;
                    }
                    if let Some(pc) = provider_config {
                        session.provider_config = Some(pc);
                    }
                }
            }
        }

        session.persisted_messages = session.messages.len();
        session.meta_dirty = false;
        Ok(session)
    }

    /// Lightweight stubs for every session in this project, newest first.
    ///
    /// Served from the index when present; rebuilt by scanning session files
    /// when it is missing or unreadable.
    pub fn list_sessions(&self) -> Vec<SessionStub> {
        if let Ok(text) = fs::read_to_string(&self.index_path) {
            if let Ok(mut stubs) = serde_json::from_str::<Vec<SessionStub>>(&text) {
                stubs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
                return stubs;
            }
            warn!(path = %self.index_path.display(), "session index unreadable; rescanning");
        }
        self.scan_sessions()
    }

    pub fn latest_session(&self) -> Option<SessionStub> {
        self.list_sessions().into_iter().next()
    }

    fn scan_sessions(&self) -> Vec<SessionStub> {
        let mut stubs = Vec::new();
        let entries = match fs::read_dir(&self.sessions_dir) {
            Ok(e) => e,
            Err(_) => return stubs,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.load_session(id) {
                Ok(s) => stubs.push(SessionStub {
                    id: s.id,
                    created_at: s.created_at,
                    updated_at: s.updated_at,
                    summary: s.summary,
                    n_messages: s.messages.len(),
                }),
                Err(e) => {
                    // One broken session must not break the listing.
                    warn!(session = %id, error = %e, "failed to load session during scan");
                }
            }
        }
        stubs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        stubs
    }

    /// Replace the index atomically (temp file + rename) so concurrent
    /// readers never observe a partial write.
    fn update_index(&self, session: &Session) -> anyhow::Result<()> {
        let mut stubs: Vec<SessionStub> = fs::read_to_string(&self.index_path)
            .ok()
            .and_then(|t| serde_json::from_str(&t).ok())
            .unwrap_or_default();

        let stub = SessionStub {
            id: session.id.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
            summary: session.summary.clone(),
            n_messages: session.messages.len(),
        };
        match stubs.iter_mut().find(|s| s.id == stub.id) {
            Some(existing) => *existing = stub,
            None => stubs.push(stub),
        }
        stubs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let tmp = tempfile::NamedTempFile::new_in(&self.project_dir)?;
        serde_json::to_writer_pretty(&tmp, &stubs)?;
        tmp.persist(&self.index_path)
            .map_err(|e| anyhow::anyhow!("replacing session index: {e}"))?;
        Ok(())
    }
}

fn append_record(file: &mut fs::File, record: &SessionRecord) -> anyhow::Result<()> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    file.write_all(line.as_bytes())?;
    Ok(())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
