//! Session service
//!
//! Wires the closed history store to its preferences and persists the
//! session after every successful mutation. Mutations from all clones are
//! serialized, and one whose snapshot cannot be saved is rolled back.

use parking_lot::Mutex;
use std::sync::Arc;

use sessionstore_session::{ClosedHistoryStore, TabState, WindowState};
use sessionstore_storage::Database;

use crate::config::Config;
use crate::error::CoreError;
use crate::prefs::{Preferences, PREF_MAX_TABS_UNDO, PREF_MAX_WINDOWS_UNDO};
use crate::Result;

pub struct SessionService {
    /// Configuration
    config: Config,
    /// Database for preferences and snapshots
    db: Database,
    /// User preferences
    prefs: Preferences,
    /// Open and closed window state
    store: ClosedHistoryStore,
    /// Held across mutate, export and save
    write_lock: Arc<Mutex<()>>,
}

impl SessionService {
    /// Open (or create) the database named by the configuration
    pub fn new(config: Config) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&config.database_path)?;
        Ok(Self::with_database(config, db))
    }

    /// Service over a private in-memory database
    pub fn in_memory(config: Config) -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::with_database(config, db))
    }

    fn with_database(config: Config, db: Database) -> Self {
        let prefs = Preferences::new(db.clone(), config.default_limits);
        let store = ClosedHistoryStore::new(config.default_limits);

        Self {
            config,
            db,
            prefs,
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Apply stored preferences and restore the last saved session
    pub fn initialize(&self) -> Result<()> {
        let limits = self.prefs.undo_limits()?;
        self.store.set_max_windows_undo(limits.max_windows_undo);
        self.store.set_max_tabs_undo(limits.max_tabs_undo);

        if let Some(snapshot) = self.db.latest_snapshot()? {
            match self.store.import_state(&snapshot.state, true) {
                Ok(()) => tracing::info!(
                    snapshot_id = %snapshot.id,
                    saved_at = %snapshot.created_at,
                    closed_windows = self.store.closed_window_count(),
                    "Restored session"
                ),
                Err(e) => tracing::error!(
                    snapshot_id = %snapshot.id,
                    error = %e,
                    "Failed to restore session, starting empty"
                ),
            }
        }

        tracing::info!(
            max_windows_undo = limits.max_windows_undo,
            max_tabs_undo = limits.max_tabs_undo,
            "Session service initialized"
        );

        Ok(())
    }

    // === Session state ===

    /// Replace the whole session
    pub fn set_browser_state(&self, state: &str) -> Result<()> {
        self.import_state(state, true)
    }

    pub fn import_state(&self, state: &str, overwrite: bool) -> Result<()> {
        self.mutate(|store| store.import_state(state, overwrite))
    }

    pub fn get_browser_state(&self) -> Result<String> {
        Ok(self.store.export_state()?)
    }

    // === Closed windows ===

    pub fn get_closed_window_data(&self) -> Result<String> {
        Ok(self.store.export_closed_windows()?)
    }

    pub fn get_closed_window_count(&self) -> usize {
        self.store.closed_window_count()
    }

    pub fn forget_closed_window(&self, index: Option<i64>) -> Result<()> {
        self.mutate(|store| store.forget_closed_window(index))
    }

    pub fn undo_close_window(&self, index: Option<i64>) -> Result<WindowState> {
        self.mutate(|store| store.undo_close_window(index))
    }

    pub fn close_window(&self, window: usize) -> Result<()> {
        self.mutate(|store| store.close_window(window))
    }

    // === Closed tabs ===

    pub fn get_closed_tab_count(&self, window: usize) -> Result<usize> {
        Ok(self.store.closed_tab_count(window)?)
    }

    pub fn get_closed_tab_data(&self, window: usize) -> Result<String> {
        Ok(self.store.export_closed_tabs(window)?)
    }

    pub fn forget_closed_tab(&self, window: usize, index: Option<i64>) -> Result<()> {
        self.mutate(|store| store.forget_closed_tab(window, index))
    }

    pub fn undo_close_tab(&self, window: usize, index: Option<i64>) -> Result<TabState> {
        self.mutate(|store| store.undo_close_tab(window, index))
    }

    pub fn close_tab(&self, window: usize, tab: usize) -> Result<()> {
        self.mutate(|store| store.close_tab(window, tab))
    }

    // === Preferences ===

    /// Set a session-store preference and apply it to the store immediately
    pub fn set_int_pref(&self, key: &str, value: i64) -> Result<()> {
        Self::check_pref_key(key)?;
        self.change_pref(key, |prefs| prefs.set_int_pref(key, value))
    }

    /// Revert a session-store preference to its default
    pub fn clear_user_pref(&self, key: &str) -> Result<()> {
        Self::check_pref_key(key)?;
        self.change_pref(key, |prefs| prefs.clear_user_pref(key))
    }

    pub fn store(&self) -> &ClosedHistoryStore {
        &self.store
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn check_pref_key(key: &str) -> Result<()> {
        match key {
            PREF_MAX_WINDOWS_UNDO | PREF_MAX_TABS_UNDO => Ok(()),
            _ => Err(CoreError::Config(format!("Unknown preference: {}", key))),
        }
    }

    /// Run a store edit and save it; a failed save undoes the edit
    fn mutate<T, F>(&self, edit: F) -> Result<T>
    where
        F: FnOnce(&ClosedHistoryStore) -> sessionstore_session::Result<T>,
    {
        let _guard = self.write_lock.lock();
        let before = self.store.session_state();
        let limits = self.store.limits();

        let value = edit(&self.store)?;
        if let Err(e) = self.persist() {
            self.store.restore(before, limits);
            return Err(e);
        }

        Ok(value)
    }

    /// Write a preference and apply it; on failure the preference and the
    /// store go back to their previous values
    fn change_pref<F>(&self, key: &str, write: F) -> Result<()>
    where
        F: FnOnce(&Preferences) -> Result<()>,
    {
        let _guard = self.write_lock.lock();
        let previous = self.db.get_setting(key)?;
        let before = self.store.session_state();
        let limits = self.store.limits();

        write(&self.prefs)?;
        if let Err(e) = self.apply_limits() {
            self.store.restore(before, limits);
            let reverted = match &previous {
                Some(value) => self.db.set_setting(key, value),
                None => self.db.delete_setting(key).map(|_| ()),
            };
            if let Err(revert) = reverted {
                tracing::error!(key, error = %revert, "Failed to revert preference");
            }
            return Err(e);
        }

        Ok(())
    }

    fn apply_limits(&self) -> Result<()> {
        let limits = self.prefs.undo_limits()?;
        let current = self.store.limits();

        if limits.max_windows_undo != current.max_windows_undo {
            self.store.set_max_windows_undo(limits.max_windows_undo);
        }
        if limits.max_tabs_undo != current.max_tabs_undo {
            self.store.set_max_tabs_undo(limits.max_tabs_undo);
        }

        self.persist()
    }

    /// Save the current session (auto-save on mutation)
    fn persist(&self) -> Result<()> {
        let state = self.store.export_state()?;
        self.db.save_snapshot(&state, self.store.closed_window_count())?;

        let pruned = self.db.prune_snapshots(self.config.snapshots_to_keep)?;
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned old session snapshots");
        }

        Ok(())
    }
}

impl Clone for SessionService {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            db: self.db.clone(),
            prefs: self.prefs.clone(),
            store: self.store.clone(),
            write_lock: Arc::clone(&self.write_lock),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionstore_session::SessionError;
    use std::path::PathBuf;

    fn test_config() -> Config {
        Config::new(PathBuf::from("/tmp/sessionstore-test"))
    }

    fn service() -> SessionService {
        let service = SessionService::in_memory(test_config()).unwrap();
        service.initialize().unwrap();
        service
    }

    fn state_with_closed(titles: &[&str]) -> String {
        let closed: Vec<serde_json::Value> = titles
            .iter()
            .map(|title| {
                serde_json::json!({
                    "tabs": [ { "entries": [ { "url": "http://example.com/", "title": "title" } ] } ],
                    "selected": 1,
                    "title": title,
                    "_closedTabs": []
                })
            })
            .collect();

        serde_json::json!({
            "windows": [ { "tabs": [ { "entries": [ { "url": "http://example.com/" } ] } ], "selected": 1 } ],
            "_closedWindows": closed
        })
        .to_string()
    }

    fn closed_titles(service: &SessionService) -> Vec<String> {
        let data: Vec<serde_json::Value> =
            serde_json::from_str(&service.get_closed_window_data().unwrap()).unwrap();
        data.iter()
            .filter_map(|w| w["title"].as_str().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_forget_through_service() {
        let service = service();
        service.set_int_pref(PREF_MAX_WINDOWS_UNDO, 3).unwrap();
        service
            .set_browser_state(&state_with_closed(&["FORGET", "REMEMBER", "FORGET"]))
            .unwrap();
        assert_eq!(service.get_closed_window_count(), 3);

        for index in [-1, 4] {
            assert!(matches!(
                service.forget_closed_window(Some(index)),
                Err(CoreError::Session(SessionError::IllegalValue { .. }))
            ));
        }

        service.forget_closed_window(Some(2)).unwrap();
        service.forget_closed_window(None).unwrap();
        assert_eq!(closed_titles(&service), vec!["REMEMBER"]);

        service.clear_user_pref(PREF_MAX_WINDOWS_UNDO).unwrap();
        assert_eq!(service.store().limits().max_windows_undo, 3);
    }

    #[test]
    fn test_lower_pref_caps_history() {
        let service = service();
        service
            .set_browser_state(&state_with_closed(&["A", "B", "C"]))
            .unwrap();

        service.set_int_pref(PREF_MAX_WINDOWS_UNDO, 1).unwrap();
        assert_eq!(closed_titles(&service), vec!["A"]);

        // Raising the limit again does not bring forgotten windows back
        service.clear_user_pref(PREF_MAX_WINDOWS_UNDO).unwrap();
        assert_eq!(closed_titles(&service), vec!["A"]);
    }

    #[test]
    fn test_unknown_pref_rejected() {
        let service = service();
        assert!(matches!(
            service.set_int_pref("browser.sessionstore.interval", 15000),
            Err(CoreError::Config(_))
        ));
        assert!(matches!(
            service.clear_user_pref("browser.startup.page"),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn test_malformed_state_keeps_session() {
        let service = service();
        service
            .set_browser_state(&state_with_closed(&["A"]))
            .unwrap();

        assert!(matches!(
            service.set_browser_state("{ broken"),
            Err(CoreError::Session(SessionError::MalformedState(_)))
        ));
        assert_eq!(closed_titles(&service), vec!["A"]);
    }

    #[test]
    fn test_session_restored_on_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf());

        {
            let service = SessionService::new(config.clone()).unwrap();
            service.initialize().unwrap();
            service.set_int_pref(PREF_MAX_WINDOWS_UNDO, 2).unwrap();
            service
                .set_browser_state(&state_with_closed(&["A", "B", "C"]))
                .unwrap();
            service.forget_closed_window(None).unwrap();
        }

        let service = SessionService::new(config).unwrap();
        service.initialize().unwrap();
        assert_eq!(service.store().limits().max_windows_undo, 2);
        assert_eq!(closed_titles(&service), vec!["B"]);
        assert!(service.database().snapshot_count().unwrap() <= 5);
    }

    #[test]
    fn test_corrupt_snapshot_starts_empty() {
        let service = SessionService::in_memory(test_config()).unwrap();
        service.database().save_snapshot("not a session", 0).unwrap();

        service.initialize().unwrap();
        assert_eq!(service.get_closed_window_count(), 0);
    }

    #[test]
    fn test_closed_tabs_through_service() {
        let service = service();
        service.set_browser_state(&state_with_closed(&[])).unwrap();

        service.close_tab(0, 0).unwrap();
        assert_eq!(service.get_closed_tab_count(0).unwrap(), 1);
        assert!(service.get_closed_tab_data(0).unwrap().contains("http://example.com/"));

        let tab = service.undo_close_tab(0, None).unwrap();
        assert_eq!(tab.entries[0].url, "http://example.com/");

        service.close_window(0).unwrap();
        assert_eq!(service.get_closed_window_count(), 1);
        let window = service.undo_close_window(None).unwrap();
        assert_eq!(window.tabs.len(), 1);
        assert_eq!(service.get_closed_window_count(), 0);

        service.close_tab(0, 0).unwrap();
        service.forget_closed_tab(0, Some(0)).unwrap();
        assert_eq!(service.get_closed_tab_count(0).unwrap(), 0);
    }

    #[test]
    fn test_snapshots_pruned() {
        let service = service();
        for _ in 0..8 {
            service
                .set_browser_state(&state_with_closed(&["A"]))
                .unwrap();
        }
        assert_eq!(
            service.database().snapshot_count().unwrap(),
            service.config().snapshots_to_keep
        );
    }

    fn drop_snapshots(service: &SessionService) {
        service
            .database()
            .with_connection(|conn| {
                conn.execute_batch("DROP TABLE session_snapshots")?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_failed_save_rolls_back_forget() {
        let service = service();
        service
            .set_browser_state(&state_with_closed(&["A", "B"]))
            .unwrap();
        drop_snapshots(&service);

        assert!(matches!(
            service.forget_closed_window(None),
            Err(CoreError::Storage(_))
        ));
        assert_eq!(service.get_closed_window_count(), 2);
        assert_eq!(closed_titles(&service), vec!["A", "B"]);

        assert!(service.close_window(0).is_err());
        assert_eq!(service.store().open_window_count(), 1);
    }

    #[test]
    fn test_failed_save_rolls_back_pref() {
        let service = service();
        service
            .set_browser_state(&state_with_closed(&["A", "B", "C"]))
            .unwrap();
        drop_snapshots(&service);

        assert!(service.set_int_pref(PREF_MAX_WINDOWS_UNDO, 1).is_err());
        assert_eq!(closed_titles(&service), vec!["A", "B", "C"]);
        assert_eq!(service.store().limits().max_windows_undo, 3);
        let prefs = service.preferences();
        assert_eq!(prefs.get_int_pref(PREF_MAX_WINDOWS_UNDO).unwrap(), None);
    }

    #[test]
    fn test_clones_save_latest_state() {
        let service = service();
        service.set_browser_state(&state_with_closed(&[])).unwrap();

        let handles: Vec<_> = ["A", "B", "C", "D"]
            .into_iter()
            .map(|title| {
                let service = service.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        service
                            .set_browser_state(&state_with_closed(&[title]))
                            .unwrap();
                        service.forget_closed_window(None).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = service.database().latest_snapshot().unwrap().unwrap();
        assert_eq!(snapshot.state, service.get_browser_state().unwrap());
    }
}
