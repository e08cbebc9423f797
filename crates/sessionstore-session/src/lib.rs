//! Session Store History
//!
//! Session state model plus the bounded history of closed windows and
//! closed tabs:
//! - Closed windows are kept newest-first, capped by `max_windows_undo`
//! - Each window keeps its own closed tabs, capped by `max_tabs_undo`
//! - Entries can be reopened (undo) or forgotten permanently

mod error;
mod limits;
mod state;
mod store;

pub use error::SessionError;
pub use limits::{cap_closed_tabs, cap_closed_windows, UndoLimits};
pub use state::{ClosedTab, Entry, SessionState, TabState, WindowState};
pub use store::ClosedHistoryStore;

pub type Result<T> = std::result::Result<T, SessionError>;
