// crates/llm_connector/src/cache.rs

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::CompletionResponse;

const MAX_ENTRIES: usize = 256;

#[derive(Debug, Clone)]
struct Entry {
    value: CompletionResponse,
    expires_at: Instant,
}

/// Time-bounded completion cache keyed by request fingerprint.
#[derive(Debug)]
pub struct LlmCache {
    ttl: Duration,
    store: RwLock<HashMap<String, Entry>>,
}

impl LlmCache {
    pub fn new(ttl_s: u64) -> Self {
        Self::with_ttl(Duration::from_secs(ttl_s))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            store: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<CompletionResponse> {
        {
            let guard = self.store.read();
            match guard.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.value.clone())
                }
                Some(_) => {}
                None => return None,
            }
        }
        self.store.write().remove(key);
        None
    }

    pub fn set(&self, key: String, value: CompletionResponse) {
        let mut guard = self.store.write();
        if guard.len() >= MAX_ENTRIES {
            let now = Instant::now();
            guard.retain(|_, entry| entry.expires_at > now);
        }
        if guard.len() >= MAX_ENTRIES {
            guard.clear();
        }
        guard.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn invalidate_expired(&self) {
        let now = Instant::now();
        self.store.write().retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(text: &str) -> CompletionResponse {
        CompletionResponse {
            content: text.to_string(),
            ..CompletionResponse::default()
        }
    }

    #[test]
    fn returns_live_entries() {
        let cache = LlmCache::new(60);
        cache.set("a".to_string(), response("x"));
        assert_eq!(cache.get("a").map(|r| r.content), Some("x".to_string()));
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn drops_expired_entries() {
        let cache = LlmCache::with_ttl(Duration::ZERO);
        cache.set("a".to_string(), response("x"));
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
    }
}
