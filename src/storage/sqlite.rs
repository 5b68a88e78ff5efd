//! SQLite-backed key-value store.
//!
//! One table, `items(key, value)`, which is how browsers lay out
//! localStorage on disk anyway. Quota accounting uses byte lengths of
//! key and value.

use super::backend::{entry_cost, KvBackend, StorageError};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

/// Persistent key-value backend.
pub struct SqliteBackend {
    conn: Connection,
    quota_bytes: Option<usize>,
}

impl SqliteBackend {
    /// Open or create the store at `db_path`.
    pub fn open(db_path: &Path, quota_bytes: Option<usize>) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Cannot open store database: {}", db_path.display()))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        let backend = Self { conn, quota_bytes };
        backend.init_schema()?;
        debug!("[SqliteBackend] Opened {}", db_path.display());
        Ok(backend)
    }

    /// Open store in memory (for testing).
    pub fn open_in_memory(quota_bytes: Option<usize>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let backend = Self { conn, quota_bytes };
        backend.init_schema()?;
        Ok(backend)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS items (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Bytes used by every entry except `exclude`.
    fn used_bytes_excluding(&self, exclude: &str) -> Result<usize, StorageError> {
        let used: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(length(CAST(key AS BLOB)) + length(CAST(value AS BLOB))), 0)
             FROM items WHERE key != ?1",
            params![exclude],
            |row| row.get(0),
        )?;
        Ok(used.max(0) as usize)
    }
}

impl KvBackend for SqliteBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM items WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota_bytes {
            let used = self.used_bytes_excluding(key)?;
            let needed = entry_cost(key, value);
            if used + needed > quota {
                return Err(StorageError::QuotaExceeded {
                    needed,
                    available: quota.saturating_sub(used),
                });
            }
        }

        self.conn.execute(
            "INSERT INTO items (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM items WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT key FROM items")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}
