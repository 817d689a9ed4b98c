//! # peopledesk
//!
//! Administration CLI for the PeopleDesk store: inspect versions and
//! collections, run migrations, clear data and reset the store.

#![deny(unsafe_code)]

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use peopledesk_settings::PeopleDeskSettings;
use peopledesk_store::{ConnectionManager, DatabaseConfig, StoreError};

/// PeopleDesk store administration.
#[derive(Parser, Debug)]
#[command(name = "peopledesk", about = "PeopleDesk store administration")]
struct Cli {
    /// Settings file (default: `~/.peopledesk/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Data directory, overriding settings.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level, overriding settings.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print machine-readable JSON where supported.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Show store location, versions and record counts.
    Status,
    /// Apply pending schema migrations.
    Migrate,
    /// List collections.
    Collections,
    /// Count the records of one collection.
    Count {
        /// Collection name.
        collection: String,
    },
    /// Remove every record of one collection.
    Clear {
        /// Collection name.
        collection: String,
    },
    /// Remove every record of every collection.
    ClearAll {
        /// Confirm the irreversible wipe.
        #[arg(long)]
        yes: bool,
    },
    /// Delete the store and recreate it empty.
    Reset {
        /// Confirm deletion.
        #[arg(long)]
        yes: bool,
    },
    /// Show applied migration steps.
    History,
    /// Show collections, indexes and declared fields as JSON.
    Schema,
}

impl Cli {
    fn load_settings(&self) -> Result<PeopleDeskSettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(peopledesk_settings::settings_path);
        let mut settings = peopledesk_settings::load_settings_from_path(&path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?;
        if let Some(dir) = &self.data_dir {
            settings.database.directory = dir.display().to_string();
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        Ok(settings)
    }
}

fn database_config(settings: &PeopleDeskSettings) -> DatabaseConfig {
    DatabaseConfig::from_settings(&settings.database, &peopledesk_settings::settings_home())
}

async fn run(cli: Cli) -> Result<()> {
    let settings = cli.load_settings()?;
    if settings.logging.json {
        peopledesk_core::init_json_subscriber(&settings.logging.level);
    } else {
        peopledesk_core::init_subscriber(&settings.logging.level);
    }

    let migrations = peopledesk_records::app_migrations()?;
    let manager = ConnectionManager::new(database_config(&settings), migrations);
    let mut out = std::io::stdout().lock();

    let result = match &cli.command {
        Command::Status => commands::status(&manager, cli.json, &mut out).await,
        Command::Migrate => commands::migrate(&manager, &mut out).await,
        Command::Collections => commands::collections(&manager, cli.json, &mut out).await,
        Command::Count { collection } => commands::count(&manager, collection, &mut out).await,
        Command::Clear { collection } => commands::clear(&manager, collection, &mut out).await,
        Command::ClearAll { yes } => commands::clear_all(&manager, *yes, &mut out).await,
        Command::Reset { yes } => commands::reset(&manager, *yes, &mut out).await,
        Command::History => commands::history(&manager, cli.json, &mut out).await,
        Command::Schema => commands::schema(&manager, &mut out).await,
    };
    manager.close_db().await;
    result
}

/// Exit code 2 marks a store that cannot be used by this build (failed
/// upgrade or newer schema); 1 is any other failure.
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.chain().find_map(|e| e.downcast_ref::<StoreError>()) {
        Some(store) if store.is_fatal() || matches!(store, StoreError::VersionMismatch { .. }) => 2,
        _ => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "command failed");
            eprintln!("error: {err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}
