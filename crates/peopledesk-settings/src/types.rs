//! Settings types. Field names are camelCase on disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Root settings object (`~/.peopledesk/settings.json`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeopleDeskSettings {
    /// Embedded store settings.
    pub database: DatabaseSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// Embedded store location and connection behaviour.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Database name; the file is `<directory>/<name>.db`.
    pub name: String,
    /// Data directory. Relative paths resolve against the settings home.
    pub directory: String,
    /// Keep the store in memory (tests, demos). Nothing is written to disk.
    pub in_memory: bool,
    /// Maximum pooled connections for a file-backed store.
    pub pool_size: u32,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
    /// How long an upgrade or delete waits on other open sessions before failing.
    pub blocked_timeout_ms: u64,
    /// Close this session's handle automatically when another session
    /// needs to upgrade or delete the store.
    pub yield_on_version_change: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            name: "peopledesk".to_string(),
            directory: "data".to_string(),
            in_memory: false,
            pool_size: 8,
            busy_timeout_ms: 5_000,
            blocked_timeout_ms: 30_000,
            yield_on_version_change: false,
        }
    }
}

impl DatabaseSettings {
    /// Resolve the data directory against `home` (the settings directory).
    pub fn resolve_directory(&self, home: &Path) -> PathBuf {
        let dir = Path::new(&self.directory);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            home.join(dir)
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of the compact human format.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}
