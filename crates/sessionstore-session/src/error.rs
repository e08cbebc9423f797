//! Session error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    /// Index outside the closed window or closed tab list
    #[error("Illegal value: index {index} is out of range for {len} entries")]
    IllegalValue { index: i64, len: usize },

    #[error("Malformed session state: {0}")]
    MalformedState(String),

    #[error("Unknown window: {0}")]
    UnknownWindow(usize),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
