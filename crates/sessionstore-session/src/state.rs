//! Session state data structures
//!
//! Field names on the wire follow the session file format
//! (`_closedWindows`, `_closedTabs`). Members that are not
//! interpreted here are kept in `extra` and written back unchanged.
//! A window title is any JSON value, an explicit `null` included.
//! Other optional members treat `null` as absent.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::SessionError;
use crate::Result;

/// A navigable location in a tab's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            extra: Map::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabState {
    pub entries: Vec<Entry>,
    /// 0-based index into `entries`; the last entry when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TabState {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    /// The entry the tab is showing
    pub fn active_entry(&self) -> Option<&Entry> {
        self.pos
            .and_then(|pos| self.entries.get(pos))
            .or_else(|| self.entries.last())
    }

    /// Title override, falling back to the active entry's title, then its URL
    pub fn display_title(&self) -> Option<&str> {
        if let Some(title) = self.title.as_deref() {
            return Some(title);
        }
        let entry = self.active_entry()?;
        Some(entry.title.as_deref().unwrap_or(&entry.url))
    }
}

/// An item of a window's `_closedTabs` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTab {
    pub state: TabState,
    /// Tab-strip position the tab occupied when it was closed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClosedTab {
    pub fn new(state: TabState, pos: usize) -> Self {
        let title = state.display_title().map(str::to_string);
        Self {
            state,
            pos: Some(pos),
            title,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowState {
    pub tabs: Vec<TabState>,
    /// 1-based index of the active tab
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<usize>,
    /// `None` when absent; `Some(Value::Null)` for an explicit null
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<Value>,
    #[serde(rename = "_closedTabs", default)]
    pub closed_tabs: Vec<ClosedTab>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WindowState {
    pub fn new(tabs: Vec<TabState>) -> Self {
        let selected = if tabs.is_empty() { None } else { Some(1) };
        Self {
            tabs,
            selected,
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<Value>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The title when it is a string
    pub fn title_str(&self) -> Option<&str> {
        self.title.as_ref().and_then(Value::as_str)
    }

    /// Resolve the 1-based `selected` index; the first tab when absent
    pub fn selected_tab(&self) -> Option<&TabState> {
        match self.selected {
            Some(0) => None,
            Some(index) => self.tabs.get(index - 1),
            None => self.tabs.first(),
        }
    }
}

/// Keep a member that is present, even when it is `null`
fn present_value<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Root of the serialized session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub windows: Vec<WindowState>,
    /// Newest first
    #[serde(rename = "_closedWindows", default)]
    pub closed_windows: Vec<WindowState>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionState {
    /// Parse a serialized session; any shape mismatch is a malformed state
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SessionError::MalformedState(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
