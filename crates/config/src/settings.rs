// crates/config/src/settings.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hisho_core::{HishoError, HishoResult, KeyValueStore};
use parking_lot::RwLock;
use tracing::{debug, info};

pub const WAKE_WORD_KEY: &str = "wake_word";
pub const REMOTE_CLASSIFIER_KEY: &str = "remote_classifier_key";
pub const GOOGLE_CLIENT_ID_KEY: &str = "google_client_id";

/// Key-value store persisted as a flat JSON object. Every write rewrites the file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> HishoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| HishoError::Storage(format!("Failed to read settings: {}", e)))?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw).map_err(|e| {
                    HishoError::Storage(format!("Failed to parse {}: {}", path.display(), e))
                })?
            }
        } else {
            BTreeMap::new()
        };

        info!(path = %path.display(), keys = values.len(), "Settings store opened");
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> HishoResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, raw)
            .map_err(|e| HishoError::Storage(format!("Failed to write settings: {}", e)))?;
        debug!(path = %self.path.display(), "Settings flushed");
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> HishoResult<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> HishoResult<()> {
        let mut values = self.values.write();
        values.insert(key.to_string(), value.to_string());
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> HishoResult<()> {
        let mut values = self.values.write();
        if values.remove(key).is_some() {
            self.flush(&values)?;
        }
        Ok(())
    }
}

/// Typed access to the user-editable settings.
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn KeyValueStore>,
}

impl Settings {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        self.store.clone()
    }

    pub fn wake_word(&self) -> HishoResult<Option<String>> {
        self.non_empty(WAKE_WORD_KEY)
    }

    pub fn set_wake_word(&self, wake_word: &str) -> HishoResult<()> {
        self.put(WAKE_WORD_KEY, wake_word)
    }

    pub fn remote_classifier_key(&self) -> HishoResult<Option<String>> {
        self.non_empty(REMOTE_CLASSIFIER_KEY)
    }

    pub fn set_remote_classifier_key(&self, key: &str) -> HishoResult<()> {
        self.put(REMOTE_CLASSIFIER_KEY, key)
    }

    pub fn google_client_id(&self) -> HishoResult<Option<String>> {
        self.non_empty(GOOGLE_CLIENT_ID_KEY)
    }

    pub fn set_google_client_id(&self, client_id: &str) -> HishoResult<()> {
        self.put(GOOGLE_CLIENT_ID_KEY, client_id)
    }

    fn non_empty(&self, key: &str) -> HishoResult<Option<String>> {
        Ok(self
            .store
            .get(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    /// Blank values clear the key.
    fn put(&self, key: &str, value: &str) -> HishoResult<()> {
        let value = value.trim();
        if value.is_empty() {
            self.store.remove(key)
        } else {
            self.store.set(key, value)
        }
    }
}
