//! Settings loading.
//!
//! Compiled defaults, then the settings file merged over them key by key
//! (JSON `null` keeps the default), then `PEOPLEDESK_*` environment
//! variables. The merged result is validated before it is returned.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::PeopleDeskSettings;

const ENV_PREFIX: &str = "PEOPLEDESK_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

type Apply = fn(&mut PeopleDeskSettings, &str) -> Option<()>;

/// Environment overrides, by suffix after [`ENV_PREFIX`]. An override
/// returning `None` rejected its value.
const ENV_OVERRIDES: &[(&str, Apply)] = &[
    ("DB_NAME", |s, v| {
        s.database.name = v.to_string();
        Some(())
    }),
    ("DB_DIR", |s, v| {
        s.database.directory = v.to_string();
        Some(())
    }),
    ("DB_IN_MEMORY", |s, v| {
        s.database.in_memory = flag(v)?;
        Some(())
    }),
    ("DB_POOL_SIZE", |s, v| {
        s.database.pool_size = bounded(v, 1, 64)?;
        Some(())
    }),
    ("DB_BUSY_TIMEOUT_MS", |s, v| {
        s.database.busy_timeout_ms = bounded(v, 0, 600_000)?;
        Some(())
    }),
    ("DB_BLOCKED_TIMEOUT_MS", |s, v| {
        s.database.blocked_timeout_ms = bounded(v, 0, 3_600_000)?;
        Some(())
    }),
    ("DB_YIELD_ON_VERSION_CHANGE", |s, v| {
        s.database.yield_on_version_change = flag(v)?;
        Some(())
    }),
    ("LOG_LEVEL", |s, v| {
        s.logging.level = log_level(v)?;
        Some(())
    }),
    ("LOG_JSON", |s, v| {
        s.logging.json = flag(v)?;
        Some(())
    }),
];

/// Settings home directory (`~/.peopledesk`).
pub fn settings_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".peopledesk")
}

/// Path to the settings file (`~/.peopledesk/settings.json`).
pub fn settings_path() -> PathBuf {
    settings_home().join("settings.json")
}

/// Load settings from the default path.
pub fn load_settings() -> Result<PeopleDeskSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path`, then apply the process environment.
///
/// A missing file yields defaults; an unreadable or malformed one is an error.
pub fn load_settings_from_path(path: &Path) -> Result<PeopleDeskSettings> {
    load_with_env(path, |key| std::env::var(key).ok())
}

fn load_with_env(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<PeopleDeskSettings> {
    let mut settings = read_file_layer(path)?;
    for (suffix, apply) in ENV_OVERRIDES {
        let key = format!("{ENV_PREFIX}{suffix}");
        let Some(raw) = env(&key).filter(|v| !v.is_empty()) else {
            continue;
        };
        if apply(&mut settings, raw.trim()).is_none() {
            warn!(key = %key, value = %raw, "ignoring invalid environment override");
        }
    }
    validate(&settings)?;
    Ok(settings)
}

fn read_file_layer(path: &Path) -> Result<PeopleDeskSettings> {
    let parse_err = |source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let mut merged = serde_json::to_value(PeopleDeskSettings::default()).map_err(parse_err)?;

    match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(path = %path.display(), "merging settings file");
            let overlay: Value = serde_json::from_str(&content).map_err(parse_err)?;
            merge_into(&mut merged, overlay);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    }

    serde_json::from_value(merged).map_err(parse_err)
}

/// Merge `overlay` into `target`: objects per key, anything else replaced.
fn merge_into(target: &mut Value, overlay: Value) {
    match (target, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                if value.is_null() {
                    continue;
                }
                match base.get_mut(&key) {
                    Some(slot) => merge_into(slot, value),
                    None => {
                        let _ = base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn validate(settings: &PeopleDeskSettings) -> Result<()> {
    let name = &settings.database.name;
    let starts_ok = name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
    if !starts_ok || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(SettingsError::Invalid {
            field: "database.name",
            message: format!("'{name}' must be alphanumeric (with '-' or '_')"),
        });
    }
    if settings.database.pool_size == 0 {
        return Err(SettingsError::Invalid {
            field: "database.poolSize",
            message: "must be at least 1".to_string(),
        });
    }
    if log_level(&settings.logging.level).is_none() {
        return Err(SettingsError::Invalid {
            field: "logging.level",
            message: format!(
                "'{}' is not one of {}",
                settings.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }
    Ok(())
}

fn flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn bounded<T: FromStr + PartialOrd>(raw: &str, min: T, max: T) -> Option<T> {
    raw.parse().ok().filter(|n| *n >= min && *n <= max)
}

fn log_level(raw: &str) -> Option<String> {
    let level = raw.to_ascii_lowercase();
    LOG_LEVELS.contains(&level.as_str()).then_some(level)
}
