//! Storage module - local-first key-value storage.
//!
//! This module contains:
//! - Backends: the flat string store (in-memory, SQLite)
//! - Codec: JSON encoding with optional gzip compression
//! - Facade: typed get/set, export/import, usage, clear-all
//! - Quota policy: which keys may be evicted when the store is full

pub mod backend;
pub mod bundle;
pub mod codec;
pub mod facade;
pub mod keys;
pub mod quota;
pub mod sqlite;

pub use backend::{KvBackend, MemoryBackend, StorageError};
pub use bundle::ExportBundle;
pub use codec::{Codec, DecodeStep, Decoded, Encoded, COMPRESSION_THRESHOLD};
pub use facade::{Cleared, ImportReport, KeyUsage, SetOutcome, Storage, UsageSummary};
pub use quota::{DisposableKey, QuotaPolicy};
pub use sqlite::SqliteBackend;
