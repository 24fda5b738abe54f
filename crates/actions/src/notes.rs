// crates/actions/src/notes.rs

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use hisho_core::{HishoError, HishoResult, KeyValueStore};

use crate::NoteService;

pub const NOTES_KEY: &str = "notes";
const MAX_NOTES: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Notes kept newest-first and persisted as JSON under [`NOTES_KEY`].
pub struct NoteStore {
    store: Arc<dyn KeyValueStore>,
    notes: Mutex<Vec<Note>>,
    list_limit: usize,
}

impl NoteStore {
    /// Loads saved notes. Unreadable data starts an empty list.
    pub fn open(store: Arc<dyn KeyValueStore>, list_limit: usize) -> Self {
        let notes = match store.get(NOTES_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Discarding unreadable notes");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load notes");
                Vec::new()
            }
        };
        Self {
            store,
            notes: Mutex::new(notes),
            list_limit: list_limit.max(1),
        }
    }

    pub fn notes(&self) -> Vec<Note> {
        self.notes.lock().clone()
    }

    fn persist(&self, notes: &[Note]) -> HishoResult<()> {
        let raw = serde_json::to_string(notes)?;
        self.store.set(NOTES_KEY, &raw)
    }
}

#[async_trait]
impl NoteService for NoteStore {
    async fn save_note(&self, content: &str) -> HishoResult<String> {
        let content = content.trim();
        if content.is_empty() {
            return Err(HishoError::Action("メモの内容が空です".to_string()));
        }

        let mut notes = self.notes.lock();
        notes.insert(
            0,
            Note {
                content: content.to_string(),
                created_at: Utc::now(),
            },
        );
        notes.truncate(MAX_NOTES);
        self.persist(&notes)?;
        debug!(count = notes.len(), "Note saved");
        Ok(format!("メモを保存しました: {}", content))
    }

    async fn list_notes(&self) -> HishoResult<String> {
        let notes = self.notes.lock();
        if notes.is_empty() {
            return Ok("メモはありません".to_string());
        }

        let mut out = format!("メモ一覧 ({}件):", notes.len());
        for (i, note) in notes.iter().take(self.list_limit).enumerate() {
            let when = note.created_at.with_timezone(&Local).format("%m/%d %H:%M");
            out.push_str(&format!("\n{}. {} ({})", i + 1, note.content, when));
        }
        Ok(out)
    }
}
