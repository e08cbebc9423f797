//! Integer preferences backed by the settings table
//!
//! A user value overrides the configured default until it is cleared.

use sessionstore_session::UndoLimits;
use sessionstore_storage::Database;

use crate::error::CoreError;
use crate::Result;

pub const PREF_MAX_WINDOWS_UNDO: &str = "browser.sessionstore.max_windows_undo";
pub const PREF_MAX_TABS_UNDO: &str = "browser.sessionstore.max_tabs_undo";

pub struct Preferences {
    db: Database,
    defaults: UndoLimits,
}

impl Preferences {
    pub fn new(db: Database, defaults: UndoLimits) -> Self {
        Self { db, defaults }
    }

    /// The user value for `key`, if one is set and readable
    pub fn get_int_pref(&self, key: &str) -> Result<Option<i64>> {
        let Some(raw) = self.db.get_setting(key)? else {
            return Ok(None);
        };

        match raw.trim().parse::<i64>() {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, value = %raw, error = %e, "Ignoring unreadable preference");
                Ok(None)
            }
        }
    }

    pub fn set_int_pref(&self, key: &str, value: i64) -> Result<()> {
        if value < 0 {
            return Err(CoreError::Config(format!(
                "{} must not be negative (got {})",
                key, value
            )));
        }

        self.db.set_setting(key, &value.to_string())?;
        tracing::info!(key, value, "Set preference");
        Ok(())
    }

    /// Drop the user value so the default applies again
    pub fn clear_user_pref(&self, key: &str) -> Result<()> {
        if self.db.delete_setting(key)? {
            tracing::info!(key, "Cleared preference");
        }
        Ok(())
    }

    /// Effective undo limits: user values where set, defaults elsewhere
    pub fn undo_limits(&self) -> Result<UndoLimits> {
        Ok(UndoLimits {
            max_windows_undo: self
                .non_negative(PREF_MAX_WINDOWS_UNDO)?
                .unwrap_or(self.defaults.max_windows_undo),
            max_tabs_undo: self
                .non_negative(PREF_MAX_TABS_UNDO)?
                .unwrap_or(self.defaults.max_tabs_undo),
        })
    }

    fn non_negative(&self, key: &str) -> Result<Option<usize>> {
        Ok(self
            .get_int_pref(key)?
            .and_then(|value| usize::try_from(value).ok()))
    }
}

impl Clone for Preferences {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            defaults: self.defaults,
        }
    }
}
