//! Flat string key-value backends.
//!
//! A backend is the "localStorage" the facade writes through: string keys,
//! string values, no structure. Backends may enforce a byte quota; running
//! out of room is reported as [`StorageError::QuotaExceeded`] so the facade
//! can tell it apart from every other failure.

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by backends and the codec.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The write would push the store past its byte quota.
    #[error("storage quota exceeded: need {needed} bytes, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StorageError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

/// Minimal key-value store contract (mirrors the browser `Storage` API).
pub trait KvBackend {
    /// Read a value. `Ok(None)` when the key does not exist.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or overwrite a value.
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key. Deleting a missing key is not an error.
    fn remove_item(&mut self, key: &str) -> Result<(), StorageError>;

    /// All keys currently stored, in no particular order.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Bytes an entry occupies against the quota (key + value, like browsers count it).
pub(crate) fn entry_cost(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

/// In-memory backend with an optional byte quota.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    items: BTreeMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryBackend {
    /// Unbounded in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// In-memory store that rejects writes past `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: BTreeMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Bytes currently used (keys + values).
    pub fn used_bytes(&self) -> usize {
        self.items.iter().map(|(k, v)| entry_cost(k, v)).sum()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl KvBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota_bytes {
            let existing = self
                .items
                .get(key)
                .map(|old| entry_cost(key, old))
                .unwrap_or(0);
            let used = self.used_bytes() - existing;
            let needed = entry_cost(key, value);
            if used + needed > quota {
                return Err(StorageError::QuotaExceeded {
                    needed,
                    available: quota.saturating_sub(used),
                });
            }
        }

        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.items.keys().cloned().collect())
    }
}
