// crates/core/src/store.rs
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::result::HishoResult;

/// Small string key-value persistence for settings, history and notes.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> HishoResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> HishoResult<()>;
    fn remove(&self, key: &str) -> HishoResult<()>;
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> HishoResult<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> HishoResult<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> HishoResult<()> {
        self.values.write().remove(key);
        Ok(())
    }
}
