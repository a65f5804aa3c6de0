//! Settings repository implementation
//!
//! A small key-value table for subsystem knobs. Full application
//! configuration lives in the configuration layer outside this crate.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

/// Sync-subsystem settings persisted in the replica
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Stable name for this device, used in remote audit trails
    pub device_name: String,
    /// Base URL of the remote store, when configured
    pub remote_endpoint: Option<String>,
    /// Whether mutations trigger a sync cycle automatically while online
    pub auto_sync: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            device_name: "front-desk".to_string(),
            remote_endpoint: None,
            auto_sync: true,
        }
    }
}

/// Trait for settings storage operations
pub trait SettingsRepository {
    /// Load settings from the database
    fn load(&self) -> Result<SyncSettings>;

    /// Save settings to the database
    fn save(&self, settings: &SyncSettings) -> Result<()>;
}

/// `SQLite` implementation of `SettingsRepository`
pub struct SqliteSettingsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSettingsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn load(&self) -> Result<SyncSettings> {
        let mut settings = SyncSettings::default();

        if let Some(value) = self.get_setting("device_name")? {
            settings.device_name = value;
        }
        settings.remote_endpoint = self
            .get_setting("remote_endpoint")?
            .filter(|value| !value.trim().is_empty());
        if let Some(value) = self.get_setting("auto_sync")? {
            settings.auto_sync = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        Ok(settings)
    }

    fn save(&self, settings: &SyncSettings) -> Result<()> {
        self.set_setting("device_name", &settings.device_name)?;
        self.set_setting(
            "remote_endpoint",
            settings.remote_endpoint.as_deref().unwrap_or(""),
        )?;
        self.set_setting("auto_sync", if settings.auto_sync { "true" } else { "false" })?;
        Ok(())
    }
}
