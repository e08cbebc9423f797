//! Session Store Core
//!
//! Coordinates the closed history store with its preferences and with
//! SQLite persistence. The service is constructed and owned explicitly by
//! whoever hosts the session; there is no process-wide instance.

mod config;
mod error;
mod prefs;
mod service;

pub use config::Config;
pub use error::CoreError;
pub use prefs::{Preferences, PREF_MAX_TABS_UNDO, PREF_MAX_WINDOWS_UNDO};
pub use service::SessionService;

// Re-export session components
pub use sessionstore_session::{
    ClosedHistoryStore, ClosedTab, Entry, SessionError, SessionState, TabState, UndoLimits,
    WindowState,
};
pub use sessionstore_storage::{Database, Snapshot, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
