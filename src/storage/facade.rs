//! Storage facade - typed get/set over a flat key-value backend.
//!
//! Every logical key `K` occupies two physical entries:
//! - `<namespace>K`: the encoded payload
//! - `<namespace>K_compressed`: `"1"` or `"0"`
//!
//! Both are written and removed together. A missing flag reads as "0".

use super::backend::{KvBackend, StorageError};
use super::bundle::{import_fields, ExportBundle};
use super::codec::{Codec, Encoded};
use super::keys::{self, COMPRESSED_SUFFIX};
use super::quota::QuotaPolicy;
use crate::config::StorageConfig;
use crate::host::{Notice, PageHost};
use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// How many keys `usage()` reports.
pub const TOP_KEYS: usize = 10;

const QUOTA_NOTICE: &str =
    "Local storage is full. Temporary data was cleared - please repeat your last change.";
const CLEAR_PROMPT: &str =
    "This deletes all locally stored data (lists, preferences, history). This cannot be undone. Continue?";

/// Result of a `set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// Value and flag were written.
    Stored { compressed: bool },
    /// The store was full. Disposable keys were evicted; the write was not retried.
    QuotaRecovered { evicted: Vec<String> },
    /// Any other failure. Logged, nothing written.
    Failed { reason: String },
}

impl SetOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, SetOutcome::Stored { .. })
    }
}

/// Size of one stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyUsage {
    pub key: String,
    pub bytes: usize,
}

/// Storage usage summary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UsageSummary {
    /// Sum of value lengths over every key in the backend
    pub total_bytes: usize,
    pub key_count: usize,
    /// Largest entries, descending, at most [`TOP_KEYS`]
    pub top_keys: Vec<KeyUsage>,
}

/// What `import_all` wrote.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportReport {
    pub restored: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Result of `clear_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleared {
    /// The user declined; nothing was deleted.
    Cancelled,
    /// Number of physical entries removed.
    Removed(usize),
}

/// Local-first key-value storage.
pub struct Storage<B: KvBackend> {
    backend: B,
    codec: Codec,
    namespace: String,
    legacy_prefixes: Vec<String>,
    quota: QuotaPolicy,
    host: Arc<dyn PageHost>,
}

impl<B: KvBackend> Storage<B> {
    /// Storage with default namespace, threshold and quota policy.
    pub fn new(backend: B, host: Arc<dyn PageHost>) -> Self {
        Self {
            backend,
            codec: Codec::default(),
            namespace: keys::DEFAULT_NAMESPACE.to_string(),
            legacy_prefixes: Vec::new(),
            quota: QuotaPolicy::default(),
            host,
        }
    }

    /// Storage configured from the `[storage]` config section.
    pub fn from_config(backend: B, host: Arc<dyn PageHost>, config: &StorageConfig) -> Self {
        Self {
            backend,
            codec: Codec::new(config.compression_threshold),
            namespace: config.namespace.clone(),
            legacy_prefixes: config.legacy_prefixes.clone(),
            quota: QuotaPolicy::new(config.disposable.clone()),
            host,
        }
    }

    pub fn with_quota_policy(mut self, quota: QuotaPolicy) -> Self {
        self.quota = quota;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn host(&self) -> &Arc<dyn PageHost> {
        &self.host
    }

    pub fn quota_policy(&self) -> &QuotaPolicy {
        &self.quota
    }

    /// Physical key for a logical key.
    pub fn physical_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    /// Physical key of the compression flag for a logical key.
    pub fn flag_key(&self, key: &str) -> String {
        format!("{}{}{}", self.namespace, key, COMPRESSED_SUFFIX)
    }

    /// Whether clear-all may remove `physical`. An empty prefix claims nothing.
    fn is_namespaced(&self, physical: &str) -> bool {
        (!self.namespace.is_empty() && physical.starts_with(&self.namespace))
            || self
                .legacy_prefixes
                .iter()
                .any(|prefix| !prefix.is_empty() && physical.starts_with(prefix.as_str()))
    }

    /// Logical keys ending in the flag suffix would share a physical key
    /// with another entry's flag.
    fn is_reserved(key: &str) -> bool {
        key.ends_with(COMPRESSED_SUFFIX)
    }

    /// Decoded value for `key`, or `None` if missing or undecodable.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        if Self::is_reserved(key) {
            warn!("Refusing to read reserved key '{}'", key);
            return None;
        }
        let raw = match self.backend.get_item(&self.physical_key(key)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                error!("Cannot read '{}': {}", key, e);
                return None;
            }
        };

        let compressed = match self.backend.get_item(&self.flag_key(key)) {
            Ok(flag) => flag.as_deref() == Some("1"),
            Err(e) => {
                warn!("Cannot read compression flag of '{}': {}", key, e);
                false
            }
        };

        self.codec.decode(&raw, compressed).into_value()
    }

    /// Typed read. Returns `default` when the key is missing, undecodable,
    /// or holds a value of another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.get_value(key) {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("Stored value of '{}' has unexpected shape: {}", key, e);
                default
            }),
            None => default,
        }
    }

    /// Encode and write `value` under `key`.
    pub fn set<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
        force_compress: bool,
    ) -> SetOutcome {
        if Self::is_reserved(key) {
            warn!("Refusing to write reserved key '{}'", key);
            return SetOutcome::Failed {
                reason: format!("key must not end with '{}'", COMPRESSED_SUFFIX),
            };
        }

        let encoded = match self.codec.encode(value, force_compress) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!("Cannot serialize '{}': {}", key, e);
                return SetOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        match self.write_entry(key, &encoded) {
            Ok(()) => {
                debug!(
                    "Stored '{}' ({} bytes, compressed: {})",
                    key,
                    encoded.payload.len(),
                    encoded.compressed
                );
                SetOutcome::Stored {
                    compressed: encoded.compressed,
                }
            }
            Err(e) if e.is_quota_exceeded() => {
                warn!("Quota exceeded writing '{}': {}", key, e);
                let evicted = self.recover_quota();
                self.host.notify(Notice::warning(QUOTA_NOTICE));
                SetOutcome::QuotaRecovered { evicted }
            }
            Err(e) => {
                error!("Cannot write '{}': {}", key, e);
                SetOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Write payload then flag. If the flag write fails, both entries are
    /// removed so no payload survives without its flag.
    fn write_entry(&mut self, key: &str, encoded: &Encoded) -> Result<(), StorageError> {
        let value_key = self.physical_key(key);
        let flag_key = self.flag_key(key);

        self.backend.set_item(&value_key, &encoded.payload)?;
        if let Err(e) = self.backend.set_item(&flag_key, encoded.flag()) {
            let _ = self.backend.remove_item(&value_key);
            let _ = self.backend.remove_item(&flag_key);
            return Err(e);
        }
        Ok(())
    }

    /// Evict every disposable key that is present. Returns the logical keys evicted.
    fn recover_quota(&mut self) -> Vec<String> {
        let order: Vec<String> = self
            .quota
            .eviction_order()
            .into_iter()
            .map(String::from)
            .collect();

        let mut evicted = Vec::new();
        for key in order {
            let present = matches!(self.backend.get_item(&self.physical_key(&key)), Ok(Some(_)));
            self.remove(&key);
            if present {
                evicted.push(key);
            }
        }

        info!("Quota recovery evicted {} key(s): {:?}", evicted.len(), evicted);
        evicted
    }

    /// Remove `key` and its flag. Idempotent.
    pub fn remove(&mut self, key: &str) {
        if Self::is_reserved(key) {
            warn!("Refusing to remove reserved key '{}'", key);
            return;
        }
        for physical in [self.physical_key(key), self.flag_key(key)] {
            if let Err(e) = self.backend.remove_item(&physical) {
                warn!("Cannot remove '{}': {}", physical, e);
            }
        }
    }

    /// Snapshot of the four exportable entries.
    pub fn export_bundle(&self) -> ExportBundle {
        let mut bundle = ExportBundle::new();
        bundle.user_context = self.get_value(keys::USER_CONTEXT);
        bundle.saved_lists = self.get_value(keys::SAVED_LISTS);
        bundle.preferences = self.get_value(keys::PREFERENCES);
        bundle.recent_searches = self.get_value(keys::RECENT_SEARCHES);
        bundle
    }

    /// Export the bundle as a file download through the host.
    pub fn export_all(&self) -> Result<PathBuf> {
        let bundle = self.export_bundle();
        let contents =
            serde_json::to_string_pretty(&bundle).context("Cannot serialize export bundle")?;
        let path = self.host.download(&bundle.file_name(), &contents)?;
        info!("Exported data to {}", path.display());
        Ok(path)
    }

    /// Restore fields from an export file's contents. Fields missing from
    /// the file keep their current stored value.
    pub fn import_all(&mut self, contents: &str) -> Result<ImportReport> {
        let json: Value = serde_json::from_str(contents).context("Import file is not valid JSON")?;
        let Value::Object(object) = json else {
            bail!("Import file must contain a JSON object");
        };
        if let Some(version) = object.get("version") {
            debug!("Importing bundle version {}", version);
        }

        let mut report = ImportReport::default();
        for (key, value) in import_fields(&object) {
            match self.set(key, value, false) {
                SetOutcome::Stored { .. } => report.restored.push(key.to_string()),
                SetOutcome::QuotaRecovered { .. } => report
                    .failed
                    .push((key.to_string(), "storage quota exceeded".to_string())),
                SetOutcome::Failed { reason } => report.failed.push((key.to_string(), reason)),
            }
        }

        if report.failed.is_empty() {
            self.host.notify(Notice::info(format!(
                "Imported {} item(s)",
                report.restored.len()
            )));
        } else {
            self.host.notify(Notice::error(format!(
                "Import incomplete: {} item(s) could not be saved",
                report.failed.len()
            )));
        }
        Ok(report)
    }

    /// Read an export file from disk and import it.
    pub fn import_file(&mut self, path: &Path) -> Result<ImportReport> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read import file: {}", path.display()))?;
        self.import_all(&contents)
    }

    /// Sizes of every stored key, largest first.
    pub fn usage(&self) -> UsageSummary {
        let keys = match self.backend.keys() {
            Ok(keys) => keys,
            Err(e) => {
                error!("Cannot enumerate stored keys: {}", e);
                return UsageSummary::default();
            }
        };

        let mut entries: Vec<KeyUsage> = keys
            .into_iter()
            .filter_map(|key| match self.backend.get_item(&key) {
                Ok(Some(value)) => Some(KeyUsage {
                    bytes: value.len(),
                    key,
                }),
                _ => None,
            })
            .collect();

        let total_bytes = entries.iter().map(|e| e.bytes).sum();
        let key_count = entries.len();
        entries.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.key.cmp(&b.key)));
        entries.truncate(TOP_KEYS);

        UsageSummary {
            total_bytes,
            key_count,
            top_keys: entries,
        }
    }

    /// Delete every key under the application namespace, after confirmation,
    /// then reload the page.
    pub fn clear_all(&mut self) -> Cleared {
        if !self.host.confirm(CLEAR_PROMPT) {
            info!("Clear-all cancelled by user");
            return Cleared::Cancelled;
        }

        let keys = match self.backend.keys() {
            Ok(keys) => keys,
            Err(e) => {
                error!("Cannot enumerate stored keys: {}", e);
                self.host
                    .notify(Notice::error("Could not clear local data. Please try again."));
                return Cleared::Removed(0);
            }
        };

        let owned: Vec<String> = keys.into_iter().filter(|k| self.is_namespaced(k)).collect();

        let mut removed = 0;
        for key in &owned {
            match self.backend.remove_item(key) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Cannot remove '{}': {}", key, e),
            }
        }

        info!("Cleared {} stored entries", removed);
        self.host.reload();
        Cleared::Removed(removed)
    }
}
