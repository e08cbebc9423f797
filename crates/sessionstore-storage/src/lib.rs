//! Session Store Storage Layer
//!
//! SQLite-based persistence for session-store preferences and
//! serialized session snapshots.

mod database;
mod error;
mod migrations;

pub use database::{Database, Snapshot};
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
