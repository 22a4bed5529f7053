//! Centralized path functions for all app storage locations.
//!
//! Single source of truth — keeps `dirs::data_dir().join(...)` out of the other crates.

use std::path::PathBuf;

/// App data root: `~/Library/Application Support/worklog/` (macOS) or `~/.local/share/worklog/` (Linux).
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("worklog"))
}

/// SQLite database file: `<app_data_dir>/worklog.db`.
pub fn db_path() -> Option<PathBuf> {
    app_data_dir().map(|d| d.join("worklog.db"))
}
