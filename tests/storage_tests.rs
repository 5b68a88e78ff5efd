//! Integration tests for the storage facade on a real SQLite store.
//!
//! Covers compression round trips, the threshold boundary, legacy decoding,
//! quota recovery, export/import and usage accounting.

use serde_json::{json, Value};
use std::sync::Arc;
use tabvault::host::RecordingHost;
use tabvault::storage::{
    Cleared, DisposableKey, KvBackend, QuotaPolicy, SetOutcome, SqliteBackend, Storage,
    COMPRESSION_THRESHOLD,
};
use tempfile::TempDir;

fn open_store(dir: &TempDir, quota: Option<usize>) -> (Storage<SqliteBackend>, Arc<RecordingHost>) {
    let backend = SqliteBackend::open(&dir.path().join("store.db"), quota).unwrap();
    let host = Arc::new(RecordingHost::new(true));
    (Storage::new(backend, host.clone()), host)
}

// ===========================================================================
// Codec through the facade
// ===========================================================================

mod compression {
    use super::*;

    #[test]
    fn test_roundtrip_above_and_below_threshold() {
        let dir = TempDir::new().unwrap();
        let (mut storage, _) = open_store(&dir, None);

        let small = json!({"theme": "dark", "density": "compact"});
        let items: Vec<String> = (0..300).map(|i| format!("item-{}", i)).collect();
        let large = json!({ "items": items });
        assert!(serde_json::to_string(&large).unwrap().len() > COMPRESSION_THRESHOLD);

        for force in [false, true] {
            storage.set("small", &small, force);
            storage.set("large", &large, force);
            assert_eq!(storage.get_value("small"), Some(small.clone()));
            assert_eq!(storage.get_value("large"), Some(large.clone()));
        }
    }

    #[test]
    fn test_boundary_exactly_threshold_stays_raw() {
        let dir = TempDir::new().unwrap();
        let (mut storage, _) = open_store(&dir, None);

        let at = Value::String("a".repeat(COMPRESSION_THRESHOLD - 2));
        let over = Value::String("a".repeat(COMPRESSION_THRESHOLD - 1));

        assert_eq!(storage.set("at", &at, false), SetOutcome::Stored { compressed: false });
        assert_eq!(storage.set("over", &over, false), SetOutcome::Stored { compressed: true });

        let backend = storage.backend();
        assert_eq!(
            backend.get_item("tabvault_at_compressed").unwrap().as_deref(),
            Some("0")
        );
        assert_eq!(
            backend.get_item("tabvault_over_compressed").unwrap().as_deref(),
            Some("1")
        );
    }

    #[test]
    fn test_legacy_uncompressed_entry_is_readable() {
        let dir = TempDir::new().unwrap();
        let (mut storage, _) = open_store(&dir, None);

        // Written by an older client: no flag key at all
        storage
            .backend_mut()
            .set_item("tabvault_saved_lists", r#"[{"name":"favourites"}]"#)
            .unwrap();
        assert_eq!(
            storage.get_value("saved_lists"),
            Some(json!([{"name": "favourites"}]))
        );

        // Flag claims compression but the payload is plain JSON
        storage
            .backend_mut()
            .set_item("tabvault_saved_lists_compressed", "1")
            .unwrap();
        assert_eq!(
            storage.get_value("saved_lists"),
            Some(json!([{"name": "favourites"}]))
        );
    }

    #[test]
    fn test_undecodable_entry_returns_default() {
        let dir = TempDir::new().unwrap();
        let (mut storage, _) = open_store(&dir, None);
        storage
            .backend_mut()
            .set_item("tabvault_preferences", "{broken")
            .unwrap();

        assert_eq!(storage.get_value("preferences"), None);
        assert_eq!(storage.get("preferences", json!({"theme": "light"})), json!({"theme": "light"}));
    }
}

// ===========================================================================
// Quota recovery
// ===========================================================================

mod quota {
    use super::*;

    const DISPOSABLE: [&str; 4] = [
        "current_mod_list",
        "recent_searches",
        "session_data",
        "ui_preferences",
    ];

    #[test]
    fn test_quota_exceeded_evicts_disposable_keys_without_retry() {
        let dir = TempDir::new().unwrap();
        let (mut storage, host) = open_store(&dir, Some(2048));

        for key in DISPOSABLE {
            assert!(storage.set(key, &"s".repeat(200), false).is_stored());
        }
        assert!(storage.set("preferences", &json!({"keep": true}), false).is_stored());

        // Below the compression threshold, so stored raw and too big to fit
        match storage.set("saved_lists", &"x".repeat(1000), false) {
            SetOutcome::QuotaRecovered { evicted } => {
                assert_eq!(evicted, DISPOSABLE.map(String::from).to_vec());
            }
            other => panic!("expected QuotaRecovered, got {:?}", other),
        }

        for key in DISPOSABLE {
            assert_eq!(storage.get_value(key), None, "{} should be evicted", key);
            assert_eq!(storage.backend().get_item(&storage.flag_key(key)).unwrap(), None);
        }
        // The write that hit the quota was not retried
        assert_eq!(storage.get_value("saved_lists"), None);
        // User data survives
        assert_eq!(storage.get_value("preferences"), Some(json!({"keep": true})));
        assert_eq!(host.notices().len(), 1);
    }

    #[test]
    fn test_custom_policy_eviction_order() {
        let dir = TempDir::new().unwrap();
        let (storage, _) = open_store(&dir, Some(300));
        let mut storage = storage.with_quota_policy(QuotaPolicy::new(vec![
            DisposableKey::new("thumbnails", 2),
            DisposableKey::new("autocomplete", 1),
        ]));

        storage.set("thumbnails", &"t".repeat(80), false);
        storage.set("autocomplete", &"a".repeat(80), false);

        match storage.set("big", &"b".repeat(200), false) {
            SetOutcome::QuotaRecovered { evicted } => {
                assert_eq!(evicted, vec!["autocomplete".to_string(), "thumbnails".to_string()]);
            }
            other => panic!("expected QuotaRecovered, got {:?}", other),
        }
    }
}

// ===========================================================================
// Export / import
// ===========================================================================

mod bundle {
    use super::*;

    fn seed(storage: &mut Storage<SqliteBackend>) {
        storage.set("user_context", &json!({"name": "Ada", "plan": "pro"}), false);
        storage.set("saved_lists", &json!([{"name": "weekly", "items": [1, 2, 3]}]), false);
        storage.set("preferences", &json!({"theme": "dark"}), false);
        storage.set("recent_searches", &json!(["ore", "copper"]), false);
    }

    #[test]
    fn test_export_then_import_restores_all_fields() {
        let dir = TempDir::new().unwrap();
        let (mut storage, host) = open_store(&dir, None);
        seed(&mut storage);

        storage.export_all().unwrap();
        let downloads = host.downloads();
        assert_eq!(downloads.len(), 1);
        let (file_name, contents) = &downloads[0];
        assert!(file_name.starts_with("tabvault-export-"));

        let before = storage.export_bundle();

        // Import into a fresh store
        let other_dir = TempDir::new().unwrap();
        let (mut restored, _) = open_store(&other_dir, None);
        let report = restored.import_all(contents).unwrap();
        assert_eq!(report.restored.len(), 4);
        assert!(report.failed.is_empty());

        let after = restored.export_bundle();
        assert_eq!(after.user_context, before.user_context);
        assert_eq!(after.saved_lists, before.saved_lists);
        assert_eq!(after.preferences, before.preferences);
        assert_eq!(after.recent_searches, before.recent_searches);

        // Re-importing the same bundle changes nothing
        restored.import_all(contents).unwrap();
        assert_eq!(restored.export_bundle().saved_lists, before.saved_lists);
    }

    #[test]
    fn test_import_missing_field_leaves_existing_value() {
        let dir = TempDir::new().unwrap();
        let (mut storage, _) = open_store(&dir, None);
        seed(&mut storage);

        let report = storage
            .import_all(r#"{"version": "1.0", "preferences": {"theme": "light"}}"#)
            .unwrap();
        assert_eq!(report.restored, vec!["preferences".to_string()]);

        assert_eq!(storage.get_value("preferences"), Some(json!({"theme": "light"})));
        assert_eq!(storage.get_value("recent_searches"), Some(json!(["ore", "copper"])));
        assert_eq!(
            storage.get_value("user_context"),
            Some(json!({"name": "Ada", "plan": "pro"}))
        );
    }

    #[test]
    fn test_import_file_with_foreign_metadata() {
        let dir = TempDir::new().unwrap();
        let (mut storage, _) = open_store(&dir, None);
        let path = dir.path().join("hand-edited.json");
        std::fs::write(
            &path,
            r#"{"version": 2, "exported_at": "2024-01-01", "saved_lists": [{"name": "weekly"}]}"#,
        )
        .unwrap();

        let report = storage.import_file(&path).unwrap();
        assert_eq!(report.restored, vec!["saved_lists".to_string()]);
        assert_eq!(storage.get_value("saved_lists"), Some(json!([{"name": "weekly"}])));
    }

    #[test]
    fn test_import_file_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let (mut storage, _) = open_store(&dir, None);
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(storage.import_file(&path).is_err());
        assert!(storage.import_file(&dir.path().join("missing.json")).is_err());
    }
}

// ===========================================================================
// Usage and clear-all
// ===========================================================================

mod usage {
    use super::*;

    #[test]
    fn test_total_is_sum_of_value_lengths_and_sorted() {
        let dir = TempDir::new().unwrap();
        let (mut storage, _) = open_store(&dir, None);
        for i in 0..12 {
            storage.set(&format!("k{}", i), &"v".repeat(i * 10), false);
        }

        let backend = storage.backend();
        let expected: usize = backend
            .keys()
            .unwrap()
            .iter()
            .map(|k| backend.get_item(k).unwrap().unwrap().len())
            .sum();

        let summary = storage.usage();
        assert_eq!(summary.total_bytes, expected);
        assert_eq!(summary.key_count, 24);
        assert_eq!(summary.top_keys.len(), 10);
        assert!(summary
            .top_keys
            .windows(2)
            .all(|pair| pair[0].bytes >= pair[1].bytes));
        assert_eq!(summary.top_keys[0].key, "tabvault_k11");
    }

    #[test]
    fn test_clear_all_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let (mut storage, host) = open_store(&dir, None);
            storage.set("preferences", &json!({"theme": "dark"}), false);
            storage.backend_mut().set_item("unrelated", "1").unwrap();
            assert_eq!(storage.clear_all(), Cleared::Removed(2));
            assert_eq!(host.reload_count(), 1);
        }

        let (storage, _) = open_store(&dir, None);
        assert_eq!(storage.get_value("preferences"), None);
        assert_eq!(storage.backend().keys().unwrap(), vec!["unrelated".to_string()]);
    }
}
