use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::CacheError;

/// Ephemeral key/value cache holding serialized copies of store data.
///
/// A missing key is `Ok(None)`, never an error. A `ttl_seconds` of 0 keeps
/// the entry until it is deleted.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// JSON helpers for caches.
#[async_trait]
pub trait CacheExt: Cache {
    /// Reads and decodes a JSON value.
    async fn get_json<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encodes a value as JSON and stores it.
    async fn set_json<T>(&self, key: &str, value: &T, ttl_seconds: u64) -> Result<(), CacheError>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)?;
        self.set(key, raw, ttl_seconds).await
    }
}

impl<T: Cache + ?Sized> CacheExt for T {}
