use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{Clock, SystemClock};

use super::{read, write};
use crate::{Cache, CacheError};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct InMemoryCacheState {
    entries: HashMap<String, Entry>,
    fail_on_get: bool,
    fail_on_set: bool,
    fail_on_delete: bool,
}

/// In-memory cache with per-entry expiry read from a `Clock`.
#[derive(Clone)]
pub struct InMemoryCache {
    state: Arc<RwLock<InMemoryCacheState>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::default(),
            clock,
        }
    }

    pub fn set_fail_on_get(&self, fail: bool) {
        write(&self.state).fail_on_get = fail;
    }

    pub fn set_fail_on_set(&self, fail: bool) {
        write(&self.state).fail_on_set = fail;
    }

    pub fn set_fail_on_delete(&self, fail: bool) {
        write(&self.state).fail_on_delete = fail;
    }

    /// Returns true if `key` holds an unexpired entry, ignoring failure toggles.
    pub fn contains_key(&self, key: &str) -> bool {
        let now = self.clock.now();
        read(&self.state)
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Stores a raw value, ignoring failure toggles.
    pub fn insert_raw(&self, key: &str, value: impl Into<String>) {
        write(&self.state).entries.insert(
            key.to_string(),
            Entry {
                value: value.into(),
                expires_at: None,
            },
        );
    }

    /// Unexpired keys starting with `prefix`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let now = self.clock.now();
        let mut keys: Vec<String> = read(&self.state)
            .entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), CacheError> {
        let mut state = write(&self.state);
        if state.fail_on_set {
            return Err(CacheError::Backend("simulated set failure".to_string()));
        }

        let expires_at = match ttl_seconds {
            0 => None,
            secs => {
                let ttl = i64::try_from(secs).unwrap_or(i64::MAX);
                self.clock.now().checked_add_signed(Duration::seconds(ttl))
            }
        };
        state
            .entries
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = self.clock.now();
        let mut state = write(&self.state);
        if state.fail_on_get {
            return Err(CacheError::Backend("simulated get failure".to_string()));
        }

        let expired = match state.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => return Ok(None),
        };
        if expired {
            state.entries.remove(key);
            return Ok(None);
        }
        Ok(state.entries.get(key).map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut state = write(&self.state);
        if state.fail_on_delete {
            return Err(CacheError::Backend("simulated delete failure".to_string()));
        }
        state.entries.remove(key);
        Ok(())
    }
}
