// src/history.rs

use std::collections::VecDeque;
use std::sync::Arc;

use hisho_core::{CommandResult, HishoResult, KeyValueStore};
use parking_lot::Mutex;
use tracing::warn;

pub const HISTORY_KEY: &str = "command_history";
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Newest-first log of command results, capped at `limit` entries.
pub struct CommandHistory {
    limit: usize,
    entries: Mutex<VecDeque<CommandResult>>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl CommandHistory {
    /// In-memory only.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            entries: Mutex::new(VecDeque::new()),
            store: None,
        }
    }

    /// Loads the saved log. Unreadable data is discarded with a warning.
    pub fn open(store: Arc<dyn KeyValueStore>, limit: usize) -> Self {
        let limit = limit.max(1);
        let mut entries: VecDeque<CommandResult> = match store.get(HISTORY_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Discarding unreadable command history");
                VecDeque::new()
            }),
            Ok(None) => VecDeque::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load command history");
                VecDeque::new()
            }
        };
        entries.truncate(limit);

        Self {
            limit,
            entries: Mutex::new(entries),
            store: Some(store),
        }
    }

    pub fn push(&self, result: CommandResult) {
        let mut entries = self.entries.lock();
        entries.push_front(result);
        entries.truncate(self.limit);

        if let Err(e) = self.persist(&entries) {
            warn!(error = %e, "Failed to persist command history");
        }
    }

    pub fn entries(&self) -> Vec<CommandResult> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<CommandResult> {
        self.entries.lock().front().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&self) -> HishoResult<()> {
        let mut entries = self.entries.lock();
        entries.clear();
        match &self.store {
            Some(store) => store.remove(HISTORY_KEY),
            None => Ok(()),
        }
    }

    fn persist(&self, entries: &VecDeque<CommandResult>) -> HishoResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let raw = serde_json::to_string(entries)?;
        store.set(HISTORY_KEY, &raw)
    }
}
