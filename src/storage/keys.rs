//! Logical storage keys used by the web client.

/// Signed-in user's context (name, plan, flags)
pub const USER_CONTEXT: &str = "user_context";
/// Lists the user saved
pub const SAVED_LISTS: &str = "saved_lists";
/// User preferences
pub const PREFERENCES: &str = "preferences";
/// Recent search queries
pub const RECENT_SEARCHES: &str = "recent_searches";
/// List being edited in the current visit
pub const CURRENT_MOD_LIST: &str = "current_mod_list";
/// Autosaved session state
pub const SESSION_DATA: &str = "session_data";
/// Panel layout and other UI state
pub const UI_PREFERENCES: &str = "ui_preferences";

/// Suffix of the sibling key holding the compression flag.
pub const COMPRESSED_SUFFIX: &str = "_compressed";

/// Default namespace prefix for physical keys.
pub const DEFAULT_NAMESPACE: &str = "tabvault_";
