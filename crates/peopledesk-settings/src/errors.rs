//! Settings errors.

use std::path::PathBuf;

use thiserror::Error;

/// Why the settings could not be produced.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The settings file is not valid JSON, or does not fit the settings shape.
    #[error("malformed settings in {}: {source}", path.display())]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying parse failure.
        source: serde_json::Error,
    },
    /// A merged value breaks a rule.
    #[error("invalid setting {field}: {message}")]
    Invalid {
        /// camelCase path of the setting, e.g. `database.poolSize`.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
