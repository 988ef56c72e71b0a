use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("storage quota exceeded: need {needed} bytes, limit is {limit}")]
    QuotaExceeded { needed: usize, limit: usize },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

/// Minimal string key/value capability the progress cache persists through.
///
/// Writes are atomic per key; there is no cross-key transaction.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::QuotaExceeded` when the write would exceed the
    /// store's size limit, or other storage errors.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// List every key starting with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Bytes charged for one entry against a quota.
pub(crate) fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

/// In-memory store for tests and ephemeral sessions, with an optional byte
/// quota counted over keys and values.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    quota_bytes: Option<usize>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Bytes currently used by all entries.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn used_bytes(&self) -> Result<usize, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.iter().map(|(k, v)| entry_size(k, v)).sum())
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if let Some(limit) = self.quota_bytes {
            let others: usize = guard
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| entry_size(k, v))
                .sum();
            let needed = others + entry_size(key, value);
            if needed > limit {
                return Err(StorageError::QuotaExceeded { needed, limit });
            }
        }
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut keys: Vec<String> = guard
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// Holds the cache store behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub cache: Arc<dyn KeyValueStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            cache: Arc::new(InMemoryStore::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove_round_trip() {
        let store = InMemoryStore::new();
        store.set("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        store.remove("a").await.unwrap();
    }

    #[tokio::test]
    async fn quota_rejects_oversized_writes() {
        let store = InMemoryStore::with_quota(10);
        store.set("k1", "12345").await.unwrap();
        let err = store.set("k2", "123456").await.unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(store.get("k2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn quota_counts_replacement_not_duplicate() {
        let store = InMemoryStore::with_quota(8);
        store.set("k", "1234567").await.unwrap();
        store.set("k", "7654321").await.unwrap();
        assert_eq!(store.used_bytes().unwrap(), 8);
    }

    #[tokio::test]
    async fn lists_keys_by_prefix() {
        let store = InMemoryStore::new();
        store.set("p_u1_a", "x").await.unwrap();
        store.set("p_u1_b", "x").await.unwrap();
        store.set("p_u2_a", "x").await.unwrap();
        assert_eq!(
            store.keys_with_prefix("p_u1_").await.unwrap(),
            vec!["p_u1_a".to_string(), "p_u1_b".to_string()]
        );
    }
}
