//! Quota recovery policy.
//!
//! When a write runs out of room, the facade evicts the keys listed here.
//! They hold session-only data that the page can rebuild, never anything
//! the user authored. Lower priority values are evicted first.

use serde::{Deserialize, Serialize};

/// A key that may be evicted under quota pressure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisposableKey {
    /// Logical key (without namespace prefix)
    pub key: String,
    /// Eviction priority, lowest first
    #[serde(default)]
    pub priority: u32,
}

impl DisposableKey {
    pub fn new(key: impl Into<String>, priority: u32) -> Self {
        Self {
            key: key.into(),
            priority,
        }
    }
}

/// Table of disposable keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaPolicy {
    pub disposable: Vec<DisposableKey>,
}

/// Default disposable keys with their eviction priorities.
pub fn default_disposable_keys() -> Vec<DisposableKey> {
    vec![
        DisposableKey::new(super::keys::CURRENT_MOD_LIST, 0),
        DisposableKey::new(super::keys::RECENT_SEARCHES, 1),
        DisposableKey::new(super::keys::SESSION_DATA, 2),
        DisposableKey::new(super::keys::UI_PREFERENCES, 3),
    ]
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            disposable: default_disposable_keys(),
        }
    }
}

impl QuotaPolicy {
    pub fn new(disposable: Vec<DisposableKey>) -> Self {
        Self { disposable }
    }

    /// Keys in eviction order (priority, then name).
    pub fn eviction_order(&self) -> Vec<&str> {
        let mut entries: Vec<&DisposableKey> = self.disposable.iter().collect();
        entries.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.key.cmp(&b.key)));
        let mut seen = std::collections::HashSet::new();
        entries
            .into_iter()
            .map(|d| d.key.as_str())
            .filter(|key| seen.insert(*key))
            .collect()
    }

    pub fn is_disposable(&self, key: &str) -> bool {
        self.disposable.iter().any(|d| d.key == key)
    }
}
