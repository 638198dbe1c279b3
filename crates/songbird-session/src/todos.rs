// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Persistent todo storage, one `todos.json` per project root.
//!
//! Todos live independently of sessions and survive across them.  Writes are
//! read-modify-write with last-writer-wins; callers needing stronger
//! semantics serialize through one orchestrator.
//!
//! Upsert matching: an incoming item without an id is compared against every
//! existing todo by normalized-content similarity (Jaccard over word sets,
//! plus subset containment).  At or above the threshold the existing item is
//! updated in place instead of a duplicate being created.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub content: String,
    pub priority: Priority,
    pub status: TodoStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl TodoItem {
    pub fn new(content: impl Into<String>, priority: Priority, status: TodoStatus) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            priority,
            status,
            created_at: now,
            updated_at: now,
            session_id: None,
        }
    }
}

/// An incoming todo write: fields the model supplies.  Items without an id
/// are matched by similarity before being treated as new.
#[derive(Debug, Clone, Deserialize)]
pub struct TodoWrite {
    #[serde(default)]
    pub id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<TodoStatus>,
}

pub struct TodoStore {
    path: PathBuf,
    similarity_threshold: f64,
}

impl TodoStore {
    pub fn new(project_dir: &Path, similarity_threshold: f64) -> Self {
        Self { path: project_dir.join("todos.json"), similarity_threshold }
    }

    pub fn load(&self) -> anyhow::Result<Vec<TodoItem>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }

    fn save(&self, todos: &[TodoItem]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = tempfile::NamedTempFile::new_in(
            self.path.parent().unwrap_or_else(|| Path::new(".")),
        )?;
        serde_json::to_writer_pretty(&tmp, todos)?;
        tmp.persist(&self.path)
            .map_err(|e| anyhow::anyhow!("replacing todos.json: {e}"))?;
        Ok(())
    }

    /// Apply a batch of writes with upsert semantics and persist.
    ///
    /// Returns the full list after the write.
    pub fn upsert(
        &self,
        writes: Vec<TodoWrite>,
        session_id: Option<&str>,
    ) -> anyhow::Result<Vec<TodoItem>> {
        let mut todos = self.load()?;
        let now = Utc::now();

        for write in writes {
            let target = match &write.id {
                Some(id) => todos.iter_mut().find(|t| &t.id == id),
                None => todos.iter_mut().find(|t| {
                    similarity(&t.content, &write.content) >= self.similarity_threshold
                }),
            };
            match target {
                Some(existing) => {
                    existing.content = write.content;
                    if let Some(p) = write.priority {
                        existing.priority = p;
                    }
                    if let Some(s) = write.status {
                        existing.status = s;
                    }
                    existing.updated_at = now;
                }
                None => {
                    let mut item = TodoItem::new(
                        write.content,
                        write.priority.unwrap_or(Priority::Medium),
                        write.status.unwrap_or(TodoStatus::Pending),
                    );
                    if let Some(id) = write.id {
                        item.id = id;
                    }
                    item.session_id = session_id.map(str::to_string);
                    todos.push(item);
                }
            }
        }

        self.save(&todos)?;
        Ok(todos)
    }
}

fn normalized_words(s: &str) -> HashSet<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalized-content similarity in [0, 1]: the larger of the Jaccard index
/// and the subset-containment ratio of the two word sets.
pub fn similarity(a: &str, b: &str) -> f64 {
    let wa = normalized_words(a);
    let wb = normalized_words(b);
    if wa.is_empty() || wb.is_empty() {
        return if wa == wb { 1.0 } else { 0.0 };
    }
    let intersection = wa.intersection(&wb).count() as f64;
    let union = wa.union(&wb).count() as f64;
    let jaccard = intersection / union;
    let containment = intersection / (wa.len().min(wb.len()) as f64);
    jaccard.max(containment)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, TodoStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TodoStore::new(dir.path(), 0.75);
        (dir, store)
    }

    fn write(content: &str) -> TodoWrite {
        TodoWrite { id: None, content: content.into(), priority: None, status: None }
    }

    #[test]
    fn identical_content_has_similarity_one() {
        assert!((similarity("run the tests", "run the tests") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn case_and_punctuation_are_normalized() {
        assert!((similarity("Run the tests!", "run, the tests") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn subset_counts_as_similar() {
        // Every word of the shorter is contained in the longer.
        let s = similarity("fix the login bug", "fix the login bug in the auth module");
        assert!(s >= 0.75, "containment should push similarity up, got {s}");
    }

    #[test]
    fn unrelated_content_is_dissimilar() {
        assert!(similarity("write documentation", "deploy to production") < 0.25);
    }

    #[test]
    fn upsert_creates_new_items() {
        let (_dir, store) = store();
        let todos = store.upsert(vec![write("add error handling")], Some("sess-1")).unwrap();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].status, TodoStatus::Pending);
        assert_eq!(todos[0].priority, Priority::Medium);
        assert_eq!(todos[0].session_id.as_deref(), Some("sess-1"));
    }

    #[test]
    fn upsert_updates_similar_item_instead_of_duplicating() {
        let (_dir, store) = store();
        store.upsert(vec![write("fix the login bug")], None).unwrap();
        let todos = store
            .upsert(
                vec![TodoWrite {
                    id: None,
                    content: "fix the login bug".into(),
                    priority: None,
                    status: Some(TodoStatus::Completed),
                }],
                None,
            )
            .unwrap();
        assert_eq!(todos.len(), 1, "similar content must update, not duplicate");
        assert_eq!(todos[0].status, TodoStatus::Completed);
    }

    #[test]
    fn upsert_by_explicit_id_updates_that_item() {
        let (_dir, store) = store();
        let todos = store.upsert(vec![write("task one")], None).unwrap();
        let id = todos[0].id.clone();
        let todos = store
            .upsert(
                vec![TodoWrite {
                    id: Some(id.clone()),
                    content: "task one, rephrased entirely".into(),
                    priority: Some(Priority::High),
                    status: None,
                }],
                None,
            )
            .unwrap();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].id, id);
        assert_eq!(todos[0].priority, Priority::High);
    }

    #[test]
    fn dissimilar_content_creates_a_second_item() {
        let (_dir, store) = store();
        store.upsert(vec![write("write the parser")], None).unwrap();
        let todos = store.upsert(vec![write("deploy the service")], None).unwrap();
        assert_eq!(todos.len(), 2);
    }

    #[test]
    fn todos_persist_across_store_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = TodoStore::new(dir.path(), 0.75);
            store.upsert(vec![write("persisted task")], None).unwrap();
        }
        let store = TodoStore::new(dir.path(), 0.75);
        let todos = store.load().unwrap();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].content, "persisted task");
    }

    #[test]
    fn unreadable_todos_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("todos.json"), "not json").unwrap();
        let store = TodoStore::new(dir.path(), 0.75);
        assert!(store.load().unwrap().is_empty());
    }
}
