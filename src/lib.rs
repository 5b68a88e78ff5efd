//! tabvault - local-first storage for web clients
//!
//! Provides the following capabilities:
//! - Key-value storage with transparent compression of large values
//! - Quota recovery that evicts session-only keys when the store is full
//! - Export/import of user data as a versioned JSON bundle
//! - Dirty-flag autosave of in-memory session state
//! - Per-visit session summaries and a thin client for the backend API

pub mod api;
pub mod autosave;
pub mod config;
pub mod host;
pub mod session;
pub mod storage;

// Re-export main types
pub use api::{ApiClient, ApiOutcome, Endpoint};
pub use autosave::{spawn_autosave, AutoSave, AutoSaveHandle, AutoSaveState};
pub use config::Config;
pub use host::{Notice, NoticeLevel, PageHost, RecordingHost, TerminalHost};
pub use session::{Beacon, HttpBeacon, SessionSummary, SessionTracker};
pub use storage::{
    Cleared, ExportBundle, KvBackend, MemoryBackend, SetOutcome, SqliteBackend, Storage,
    StorageError, UsageSummary,
};
