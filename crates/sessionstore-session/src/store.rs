//! Closed History Store
//!
//! Owns the session state together with the undo limits. Every mutating
//! call validates its arguments first and then applies the whole edit under
//! a single write lock, so a failed call leaves the state exactly as it was.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::error::SessionError;
use crate::limits::{cap_closed_tabs, cap_closed_windows, UndoLimits};
use crate::state::{ClosedTab, SessionState, TabState, WindowState};
use crate::Result;

struct Inner {
    state: SessionState,
    limits: UndoLimits,
}

impl Inner {
    fn cap_all(&mut self) {
        let UndoLimits {
            max_windows_undo,
            max_tabs_undo,
        } = self.limits;

        cap_closed_windows(&mut self.state.closed_windows, max_windows_undo);
        for window in self
            .state
            .windows
            .iter_mut()
            .chain(self.state.closed_windows.iter_mut())
        {
            cap_closed_tabs(&mut window.closed_tabs, max_tabs_undo);
        }
    }

    fn window_mut(&mut self, window: usize) -> Result<&mut WindowState> {
        self.state
            .windows
            .get_mut(window)
            .ok_or(SessionError::UnknownWindow(window))
    }

    fn window(&self, window: usize) -> Result<&WindowState> {
        self.state
            .windows
            .get(window)
            .ok_or(SessionError::UnknownWindow(window))
    }
}

/// Resolve an optional history index; `None` addresses the most recent entry
fn resolve_index(index: Option<i64>, len: usize) -> Result<usize> {
    let raw = index.unwrap_or(0);
    match usize::try_from(raw) {
        Ok(i) if i < len => Ok(i),
        _ => Err(SessionError::IllegalValue { index: raw, len }),
    }
}

pub struct ClosedHistoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl ClosedHistoryStore {
    pub fn new(limits: UndoLimits) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                state: SessionState::default(),
                limits,
            })),
        }
    }

    pub fn limits(&self) -> UndoLimits {
        self.inner.read().limits
    }

    /// Change the closed window capacity; an over-full list is trimmed at once
    pub fn set_max_windows_undo(&self, capacity: usize) {
        let mut inner = self.inner.write();
        inner.limits.max_windows_undo = capacity;
        let dropped = cap_closed_windows(&mut inner.state.closed_windows, capacity);

        tracing::info!(max_windows_undo = capacity, dropped, "Updated closed window limit");
    }

    /// Change the per-window closed tab capacity
    pub fn set_max_tabs_undo(&self, capacity: usize) {
        let mut inner = self.inner.write();
        inner.limits.max_tabs_undo = capacity;
        inner.cap_all();

        tracing::info!(max_tabs_undo = capacity, "Updated closed tab limit");
    }

    /// Load a serialized session.
    ///
    /// With `overwrite` the open and closed windows are replaced wholesale.
    /// Otherwise incoming open windows are appended and incoming closed
    /// windows are placed ahead of the existing ones. Limits apply afterwards.
    pub fn import_state(&self, serialized: &str, overwrite: bool) -> Result<()> {
        let incoming = SessionState::from_json(serialized)?;

        let mut inner = self.inner.write();
        if overwrite {
            inner.state = incoming;
        } else {
            let SessionState {
                windows,
                mut closed_windows,
                extra,
            } = incoming;

            inner.state.windows.extend(windows);
            closed_windows.append(&mut inner.state.closed_windows);
            inner.state.closed_windows = closed_windows;
            inner.state.extra.extend(extra);
        }
        inner.cap_all();

        tracing::info!(
            overwrite,
            windows = inner.state.windows.len(),
            closed_windows = inner.state.closed_windows.len(),
            "Imported session state"
        );

        Ok(())
    }

    /// Closed windows as a JSON array, most recently closed first
    pub fn export_closed_windows(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.inner.read().state.closed_windows)?)
    }

    /// The whole session, open and closed windows
    pub fn export_state(&self) -> Result<String> {
        self.inner.read().state.to_json()
    }

    pub fn session_state(&self) -> SessionState {
        self.inner.read().state.clone()
    }

    /// Put back a state and limits taken earlier, without capping
    pub fn restore(&self, state: SessionState, limits: UndoLimits) {
        let mut inner = self.inner.write();
        inner.state = state;
        inner.limits = limits;

        tracing::debug!(
            closed_windows = inner.state.closed_windows.len(),
            "Restored previous session state"
        );
    }

    pub fn closed_window_count(&self) -> usize {
        self.inner.read().state.closed_windows.len()
    }

    pub fn open_window_count(&self) -> usize {
        self.inner.read().state.windows.len()
    }

    /// Permanently drop one closed window
    pub fn forget_closed_window(&self, index: Option<i64>) -> Result<()> {
        let mut inner = self.inner.write();
        let index = resolve_index(index, inner.state.closed_windows.len())?;
        let removed = inner.state.closed_windows.remove(index);

        tracing::info!(
            index,
            title = ?removed.title,
            remaining = inner.state.closed_windows.len(),
            "Forgot closed window"
        );

        Ok(())
    }

    /// Reopen a closed window, appending it to the open windows
    pub fn undo_close_window(&self, index: Option<i64>) -> Result<WindowState> {
        let mut inner = self.inner.write();
        let index = resolve_index(index, inner.state.closed_windows.len())?;
        let window = inner.state.closed_windows.remove(index);
        inner.state.windows.push(window.clone());

        tracing::info!(index, tab_count = window.tabs.len(), "Reopened closed window");

        Ok(window)
    }

    /// Move an open window into the closed window history.
    ///
    /// Windows without tabs are discarded instead of recorded.
    pub fn close_window(&self, window: usize) -> Result<()> {
        let mut inner = self.inner.write();
        if window >= inner.state.windows.len() {
            return Err(SessionError::UnknownWindow(window));
        }

        let closed = inner.state.windows.remove(window);
        if closed.tabs.is_empty() {
            tracing::debug!(window, "Discarded empty window");
            return Ok(());
        }

        inner.state.closed_windows.insert(0, closed);
        let max = inner.limits.max_windows_undo;
        cap_closed_windows(&mut inner.state.closed_windows, max);

        tracing::info!(
            window,
            closed_windows = inner.state.closed_windows.len(),
            "Closed window"
        );

        Ok(())
    }

    pub fn closed_tab_count(&self, window: usize) -> Result<usize> {
        Ok(self.inner.read().window(window)?.closed_tabs.len())
    }

    /// Closed tabs of an open window as a JSON array, most recent first
    pub fn export_closed_tabs(&self, window: usize) -> Result<String> {
        let inner = self.inner.read();
        Ok(serde_json::to_string(&inner.window(window)?.closed_tabs)?)
    }

    /// Permanently drop one closed tab of an open window
    pub fn forget_closed_tab(&self, window: usize, index: Option<i64>) -> Result<()> {
        let mut inner = self.inner.write();
        let target = inner.window_mut(window)?;
        let index = resolve_index(index, target.closed_tabs.len())?;
        target.closed_tabs.remove(index);

        tracing::info!(window, index, "Forgot closed tab");

        Ok(())
    }

    /// Reopen a closed tab at the strip position it was closed from
    pub fn undo_close_tab(&self, window: usize, index: Option<i64>) -> Result<TabState> {
        let mut inner = self.inner.write();
        let target = inner.window_mut(window)?;
        let index = resolve_index(index, target.closed_tabs.len())?;
        let closed = target.closed_tabs.remove(index);

        let pos = closed.pos.unwrap_or(target.tabs.len()).min(target.tabs.len());
        target.tabs.insert(pos, closed.state.clone());
        target.selected = Some(pos + 1);

        tracing::info!(window, index, pos, "Reopened closed tab");

        Ok(closed.state)
    }

    /// Close an open tab, recording it at the front of the window's closed tabs
    pub fn close_tab(&self, window: usize, tab: usize) -> Result<()> {
        let mut inner = self.inner.write();
        let max = inner.limits.max_tabs_undo;
        let target = inner.window_mut(window)?;
        if tab >= target.tabs.len() {
            return Err(SessionError::IllegalValue {
                index: tab as i64,
                len: target.tabs.len(),
            });
        }

        let state = target.tabs.remove(tab);
        target.selected = match target.selected {
            _ if target.tabs.is_empty() => None,
            Some(selected) if selected > tab + 1 || selected > target.tabs.len() => {
                Some(selected - 1)
            }
            other => other,
        };

        target.closed_tabs.insert(0, ClosedTab::new(state, tab));
        cap_closed_tabs(&mut target.closed_tabs, max);

        tracing::info!(window, tab, closed_tabs = target.closed_tabs.len(), "Closed tab");

        Ok(())
    }
}

impl Default for ClosedHistoryStore {
    fn default() -> Self {
        Self::new(UndoLimits::default())
    }
}

impl Clone for ClosedHistoryStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
