//! Export bundle format.
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "exported_at": "2026-10-19T08:00:00Z",
//!   "user_context": {...},
//!   "saved_lists": [...],
//!   "preferences": {...},
//!   "recent_searches": [...]
//! }
//! ```

use super::keys;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current export format version.
pub const BUNDLE_VERSION: &str = "1.0";

/// Storage keys a bundle carries, in export order.
pub const BUNDLE_FIELDS: [&str; 4] = [
    keys::USER_CONTEXT,
    keys::SAVED_LISTS,
    keys::PREFERENCES,
    keys::RECENT_SEARCHES,
];

fn default_bundle_version() -> String {
    BUNDLE_VERSION.to_string()
}

/// Versioned snapshot of the user's exportable data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    #[serde(default = "default_bundle_version")]
    pub version: String,

    #[serde(default = "Utc::now")]
    pub exported_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_context: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_lists: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_searches: Option<Value>,
}

impl ExportBundle {
    /// Empty bundle stamped with the current time.
    pub fn new() -> Self {
        Self {
            version: default_bundle_version(),
            exported_at: Utc::now(),
            user_context: None,
            saved_lists: None,
            preferences: None,
            recent_searches: None,
        }
    }

    /// Download file name for this bundle.
    pub fn file_name(&self) -> String {
        format!("tabvault-export-{}.json", self.exported_at.format("%Y-%m-%d"))
    }
}

/// Data fields present in a parsed import file, `null` counting as absent.
///
/// Only the four data keys are read. `version` and `exported_at` are not
/// checked, so hand-edited or older exports still import.
pub fn import_fields(object: &Map<String, Value>) -> Vec<(&'static str, &Value)> {
    BUNDLE_FIELDS
        .iter()
        .filter_map(|&key| match object.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => Some((key, value)),
        })
        .collect()
}

impl Default for ExportBundle {
    fn default() -> Self {
        Self::new()
    }
}
