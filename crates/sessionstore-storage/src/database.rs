//! Database connection and operations

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::migrations::run_migrations;
use crate::Result;

/// A persisted copy of the serialized session state.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: String,
    pub state: String,
    pub closed_window_count: usize,
    pub created_at: DateTime<Utc>,
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for better concurrent performance
        let _: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| {
            let value = conn
                .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(value)
        })
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, updated_at],
            )?;
            Ok(())
        })
    }

    /// Remove a setting. Returns whether a row was deleted.
    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        self.with_connection(|conn| {
            let removed = conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
            Ok(removed > 0)
        })
    }

    /// Store a serialized session state and return the new snapshot ID
    pub fn save_snapshot(&self, state: &str, closed_window_count: usize) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339();

        self.transaction(|conn| {
            let seq: i64 = conn.query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM session_snapshots",
                [],
                |row| row.get(0),
            )?;

            conn.execute(
                "INSERT INTO session_snapshots (id, state, closed_window_count, created_at, seq)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, state, closed_window_count as i64, created_at, seq],
            )?;
            Ok(())
        })?;

        tracing::debug!(snapshot_id = %id, closed_window_count, "Saved session snapshot");

        Ok(id)
    }

    /// Most recently saved snapshot, if any
    pub fn latest_snapshot(&self) -> Result<Option<Snapshot>> {
        self.with_connection(|conn| {
            let snapshot = conn
                .query_row(
                    "SELECT id, state, closed_window_count, created_at
                     FROM session_snapshots ORDER BY seq DESC LIMIT 1",
                    [],
                    |row| {
                        let created_str: String = row.get(3)?;
                        let created_at = DateTime::parse_from_rfc3339(&created_str)
                            .map(|dt| dt.with_timezone(&Utc))
                            .unwrap_or_else(|_| Utc::now());
                        let count: i64 = row.get(2)?;

                        Ok(Snapshot {
                            id: row.get(0)?,
                            state: row.get(1)?,
                            closed_window_count: count.max(0) as usize,
                            created_at,
                        })
                    },
                )
                .optional()?;
            Ok(snapshot)
        })
    }

    /// Delete all but the `keep` newest snapshots. Returns the number removed.
    pub fn prune_snapshots(&self, keep: usize) -> Result<usize> {
        self.with_connection(|conn| {
            let removed = conn.execute(
                "DELETE FROM session_snapshots WHERE seq NOT IN
                 (SELECT seq FROM session_snapshots ORDER BY seq DESC LIMIT ?1)",
                [keep as i64],
            )?;
            Ok(removed)
        })
    }

    pub fn snapshot_count(&self) -> Result<usize> {
        self.with_connection(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM session_snapshots", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}
