pub mod prefs;

// Re-export common types
pub use prefs::{FilePreferences, MemoryPreferences, Preferences, LAST_RESULT_FILE_KEY};
