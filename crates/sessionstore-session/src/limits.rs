//! Undo history limits
//!
//! Capacity is enforced on write: whenever closed windows or closed tabs
//! are added or a limit is lowered, the oldest entries (the tail) are dropped.

use serde::{Deserialize, Serialize};

use crate::state::{ClosedTab, WindowState};

pub const DEFAULT_MAX_WINDOWS_UNDO: usize = 3;
pub const DEFAULT_MAX_TABS_UNDO: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoLimits {
    /// Maximum number of closed windows retained
    pub max_windows_undo: usize,
    /// Maximum number of closed tabs retained per window
    pub max_tabs_undo: usize,
}

impl Default for UndoLimits {
    fn default() -> Self {
        Self {
            max_windows_undo: DEFAULT_MAX_WINDOWS_UNDO,
            max_tabs_undo: DEFAULT_MAX_TABS_UNDO,
        }
    }
}

/// Trim a newest-first closed window list to `max` entries.
/// Returns the number of windows dropped.
pub fn cap_closed_windows(windows: &mut Vec<WindowState>, max: usize) -> usize {
    let dropped = windows.len().saturating_sub(max);
    if dropped > 0 {
        windows.truncate(max);
        tracing::debug!(dropped, max, "Capped closed windows");
    }
    dropped
}

/// Trim a newest-first closed tab list to `max` entries.
/// Returns the number of tabs dropped.
pub fn cap_closed_tabs(tabs: &mut Vec<ClosedTab>, max: usize) -> usize {
    let dropped = tabs.len().saturating_sub(max);
    tabs.truncate(max);
    dropped
}
