//! Session store configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use sessionstore_session::UndoLimits;

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Number of saved session snapshots to retain
    pub snapshots_to_keep: usize,
    /// Limits used until a user preference overrides them
    pub default_limits: UndoLimits,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("sessionstore.db"),
            snapshots_to_keep: 5,
            default_limits: UndoLimits::default(),
        }
    }

    /// Read a JSON configuration file; missing members take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;

        if config.snapshots_to_keep == 0 {
            return Err(CoreError::Config(
                "snapshots_to_keep must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("sessionstore"))
            .unwrap_or_else(|| PathBuf::from(".sessionstore"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config() {
        let config = Config::new(PathBuf::from("/tmp/profile"));
        assert_eq!(
            config.database_path,
            PathBuf::from("/tmp/profile/sessionstore.db")
        );
        assert_eq!(config.default_limits.max_windows_undo, 3);
        assert_eq!(config.default_limits.max_tabs_undo, 10);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "snapshots_to_keep": 2, "default_limits": { "max_windows_undo": 6, "max_tabs_undo": 4 } }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.snapshots_to_keep, 2);
        assert_eq!(config.default_limits.max_windows_undo, 6);
        assert_eq!(config.default_limits.max_tabs_undo, 4);
    }

    #[test]
    fn test_load_rejects_zero_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "snapshots_to_keep": 0 }"#).unwrap();

        assert!(matches!(Config::load(&path), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/sessionstore/config.json"),
            Err(CoreError::Io(_))
        ));
    }
}
