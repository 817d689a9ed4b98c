//! # peopledesk-settings
//!
//! Configuration with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`PeopleDeskSettings::default()`]
//! 2. **User file**: `~/.peopledesk/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PEOPLEDESK_*` overrides (highest priority)
//!
//! Settings are loaded explicitly by the binary and handed down; there is no
//! process-wide settings singleton.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_home, settings_path};
pub use types::{DatabaseSettings, LoggingSettings, PeopleDeskSettings};
