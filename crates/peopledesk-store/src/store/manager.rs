//! Connection manager: the single owner of a store's live handle.
//!
//! `get_db()` opens lazily, runs pending migrations and caches the handle;
//! `reset_db()` and `delete_database()` tear it down explicitly. There is at
//! most one live handle per manager.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use peopledesk_settings::DatabaseSettings;
use rusqlite::TransactionBehavior;
use tokio::sync::{Mutex, broadcast};
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::contention::{ConnectionEvent, ContentionRegistry};
use super::database::Database;
use crate::errors::{Result, StoreError};
use crate::sqlite::catalog;
use crate::sqlite::connection::{
    ConnectionConfig, ConnectionPool, StoreLocation, checkout, is_busy, open_pool,
};
use crate::sqlite::migrations::{self, Migrations, UpgradeReport};

const BUSY_RETRY: Duration = Duration::from_millis(100);

/// How and where to open a store.
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    /// Database name.
    pub name: String,
    /// Where the data lives.
    pub location: StoreLocation,
    /// Pool settings.
    pub connection: ConnectionConfig,
    /// How long an open or delete waits on other sessions before failing.
    pub blocked_timeout: Duration,
    /// Close the live handle automatically when another session needs the
    /// store for an upgrade or delete.
    pub yield_on_version_change: bool,
    /// Schema version to open at; defaults to the newest migration.
    pub target_version: Option<u32>,
}

impl DatabaseConfig {
    /// File-backed store at `<directory>/<name>.db`.
    pub fn file(directory: impl AsRef<Path>, name: impl Into<String>) -> Self {
        let name = name.into();
        let path = directory.as_ref().join(format!("{name}.db"));
        Self::with_location(name, StoreLocation::File(path))
    }

    /// In-memory store. Stores with the same name share data while open.
    pub fn in_memory(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::with_location(name.clone(), StoreLocation::Memory(name))
    }

    fn with_location(name: String, location: StoreLocation) -> Self {
        Self {
            name,
            location,
            connection: ConnectionConfig::default(),
            blocked_timeout: Duration::from_secs(30),
            yield_on_version_change: false,
            target_version: None,
        }
    }

    /// Map the `database` settings section; relative directories resolve
    /// against `home`.
    pub fn from_settings(settings: &DatabaseSettings, home: &Path) -> Self {
        let base = if settings.in_memory {
            Self::in_memory(settings.name.clone())
        } else {
            Self::file(settings.resolve_directory(home), settings.name.clone())
        };
        base.pool_size(settings.pool_size)
            .busy_timeout_ms(settings.busy_timeout_ms)
            .blocked_timeout(Duration::from_millis(settings.blocked_timeout_ms))
            .yield_on_version_change(settings.yield_on_version_change)
    }

    /// Set the pool size.
    #[must_use]
    pub fn pool_size(mut self, size: u32) -> Self {
        self.connection.pool_size = size;
        self
    }

    /// Set the `SQLite` busy timeout.
    #[must_use]
    pub fn busy_timeout_ms(mut self, ms: u32) -> Self {
        self.connection.busy_timeout_ms = ms;
        self
    }

    /// Set the blocked timeout.
    #[must_use]
    pub fn blocked_timeout(mut self, timeout: Duration) -> Self {
        self.blocked_timeout = timeout;
        self
    }

    /// Yield the live handle to other sessions' upgrades and deletes.
    #[must_use]
    pub fn yield_on_version_change(mut self, enabled: bool) -> Self {
        self.yield_on_version_change = enabled;
        self
    }

    /// Open at a specific schema version.
    #[must_use]
    pub fn target_version(mut self, version: u32) -> Self {
        self.target_version = Some(version);
        self
    }

    /// Store file path, for file-backed stores.
    pub fn path(&self) -> Option<&PathBuf> {
        match &self.location {
            StoreLocation::File(path) => Some(path),
            StoreLocation::Memory(_) => None,
        }
    }
}

/// Owns the live [`Database`] for one store.
pub struct ConnectionManager {
    config: DatabaseConfig,
    migrations: Arc<Migrations>,
    registry: ContentionRegistry,
    events: broadcast::Sender<ConnectionEvent>,
    current: Mutex<Option<Database>>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.config)
            .field("target_version", &self.target_version())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Manager with its own contention registry.
    pub fn new(config: DatabaseConfig, migrations: Migrations) -> Self {
        Self::with_registry(config, migrations, ContentionRegistry::new())
    }

    /// Manager that sees (and is seen by) every other manager sharing
    /// `registry`.
    pub fn with_registry(
        config: DatabaseConfig,
        migrations: Migrations,
        registry: ContentionRegistry,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            config,
            migrations: Arc::new(migrations),
            registry,
            events,
            current: Mutex::new(None),
        }
    }

    /// Receive lifecycle and contention events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Configuration this manager opens with.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Version the store is migrated to on open.
    pub fn target_version(&self) -> u32 {
        self.config
            .target_version
            .unwrap_or_else(|| self.migrations.latest_version())
    }

    /// The live handle, opening (and migrating) the store if needed.
    ///
    /// A cached handle that was closed from outside is re-opened.
    ///
    /// When an upgrade is pending and other sessions still hold the store,
    /// subscribers first receive [`ConnectionEvent::Blocked`] and the open
    /// waits. If the holders have not released once the configured
    /// `blocked_timeout` elapses (30 s by default), the
    /// open fails with [`StoreError::Connection`] and the store keeps its
    /// prior version. The same applies to a lock held by another process.
    ///
    /// A configured target above the newest migration is a
    /// [`StoreError::Constraint`]; a store newer than the target is a
    /// [`StoreError::VersionMismatch`].
    pub async fn get_db(&self) -> Result<Database> {
        let mut current = self.current.lock().await;
        if let Some(db) = current.as_ref().filter(|db| !db.is_closed()) {
            return Ok(db.clone());
        }
        let db = self.open().await?;
        *current = Some(db.clone());
        Ok(db)
    }

    /// Close the live handle; the next [`get_db`](Self::get_db) re-opens.
    pub async fn close_db(&self) {
        if let Some(db) = self.current.lock().await.take() {
            db.close();
        }
    }

    /// Alias of [`close_db`](Self::close_db).
    pub async fn reset_db(&self) {
        self.close_db().await;
    }

    /// Whether a live, open handle is cached.
    pub async fn is_connected(&self) -> bool {
        self.current
            .lock()
            .await
            .as_ref()
            .is_some_and(|db| !db.is_closed())
    }

    /// Schema version of the live handle; `None` when disconnected.
    pub async fn db_version(&self) -> Option<u32> {
        self.current
            .lock()
            .await
            .as_ref()
            .filter(|db| !db.is_closed())
            .map(Database::version)
    }

    /// Close the live handle, wait for other sessions to release the store
    /// and remove its files. In-memory stores simply lose their data.
    pub async fn delete_database(&self) -> Result<()> {
        let mut current = self.current.lock().await;
        if let Some(db) = current.take() {
            db.close();
        }
        let key = self.config.location.key();
        self.registry
            .wait_for_release(&key, None, &self.events, self.config.blocked_timeout)
            .await?;

        for file in self.config.location.files() {
            match std::fs::remove_file(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StoreError::connection(
                        format!("failed to remove {}", file.display()),
                        Some(Box::new(e)),
                    ));
                }
            }
        }
        info!(name = %self.config.name, store = %key, "database deleted");
        Ok(())
    }

    /// Delete the store and open a fresh one at the target version.
    pub async fn delete_and_recreate_db(&self) -> Result<Database> {
        self.delete_database().await?;
        self.get_db().await
    }

    async fn open(&self) -> Result<Database> {
        let target = self.target_version();
        self.migrations.check_target(target)?;
        let location = self.config.location.clone();
        let connection = self.config.connection.clone();
        let pool = tokio::task::spawn_blocking(move || open_pool(&location, &connection))
            .await
            .map_err(|e| StoreError::connection("store open task failed", Some(Box::new(e))))??;

        let stored = read_version(&pool).await?;
        if stored > target {
            error!(
                name = %self.config.name,
                stored,
                target,
                "store was written by a newer schema"
            );
            return Err(StoreError::VersionMismatch {
                expected: target,
                found: stored,
            });
        }

        let version = if stored < target {
            self.registry
                .wait_for_release(
                    &self.config.location.key(),
                    Some(target),
                    &self.events,
                    self.config.blocked_timeout,
                )
                .await?;
            let report = self.upgrade(&pool, stored, target).await?;
            let _ = self.events.send(ConnectionEvent::Upgraded {
                from: report.from,
                to: report.to,
            });
            report.to
        } else {
            stored
        };

        info!(
            name = %self.config.name,
            store = %self.config.location.key(),
            version,
            "database opened"
        );
        Ok(Database::register(
            pool,
            &self.config.name,
            self.config.location.clone(),
            version,
            self.events.clone(),
            self.registry.clone(),
            self.config.yield_on_version_change,
        ))
    }

    /// Run the migrations in one exclusive transaction, retrying while
    /// another process holds the store lock.
    async fn upgrade(&self, pool: &ConnectionPool, stored: u32, target: u32) -> Result<UpgradeReport> {
        let deadline = Instant::now() + self.config.blocked_timeout;
        loop {
            let pool = pool.clone();
            let migrations = Arc::clone(&self.migrations);
            let attempt = tokio::task::spawn_blocking(move || -> Result<Option<UpgradeReport>> {
                let mut conn = checkout(&pool)?;
                let tx = match conn.transaction_with_behavior(TransactionBehavior::Exclusive) {
                    Ok(tx) => tx,
                    Err(e) if is_busy(&e) => return Ok(None),
                    Err(e) => {
                        return Err(StoreError::connection(
                            "failed to begin upgrade transaction",
                            Some(Box::new(e)),
                        ));
                    }
                };
                let stored = migrations::current_version(&tx).map_err(|e| StoreError::Upgrade {
                    version: target,
                    message: "failed to read schema version".to_string(),
                    source: Some(Box::new(e)),
                })?;
                let report = migrations.upgrade(&tx, stored, target)?;
                tx.commit().map_err(|e| StoreError::Upgrade {
                    version: target,
                    message: "failed to commit upgrade".to_string(),
                    source: Some(Box::new(e)),
                })?;
                Ok(Some(report))
            })
            .await
            .map_err(|e| StoreError::Upgrade {
                version: target,
                message: "upgrade task failed".to_string(),
                source: Some(Box::new(e)),
            })?;

            match attempt {
                Ok(Some(report)) => return Ok(report),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        return Err(StoreError::connection(
                            format!(
                                "store '{}' stayed locked by another process",
                                self.config.location.key()
                            ),
                            None,
                        ));
                    }
                    warn!(name = %self.config.name, stored, target, "store locked, retrying upgrade");
                    let _ = self.events.send(ConnectionEvent::Blocked {
                        current_version: stored,
                        requested_version: Some(target),
                        holders: 0,
                    });
                    tokio::time::sleep(BUSY_RETRY).await;
                }
                Err(e) => {
                    if e.is_fatal() {
                        error!(name = %self.config.name, error = %e, "schema upgrade failed");
                    }
                    return Err(e);
                }
            }
        }
    }
}

async fn read_version(pool: &ConnectionPool) -> Result<u32> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = checkout(&pool)?;
        catalog::ensure_catalog(&conn)
            .and_then(|()| migrations::current_version(&conn))
            .map_err(|e| {
                StoreError::connection("failed to read the store's schema version", Some(Box::new(e)))
            })
    })
    .await
    .map_err(|e| StoreError::connection("store open task failed", Some(Box::new(e))))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::catalog::IndexDef;
    use crate::sqlite::migrations::Migration;

    fn table() -> Migrations {
        Migrations::new(vec![
            Migration::new(1, "departments").create_collection("departments"),
            Migration::new(2, "department codes")
                .create_index("departments", IndexDef::on("code").unique()),
        ])
        .unwrap()
    }

    #[test]
    fn config_from_settings() {
        let settings = DatabaseSettings {
            name: "hr".into(),
            directory: "db".into(),
            pool_size: 2,
            blocked_timeout_ms: 250,
            yield_on_version_change: true,
            ..DatabaseSettings::default()
        };
        let config = DatabaseConfig::from_settings(&settings, Path::new("/home/me/.peopledesk"));
        assert_eq!(
            config.path(),
            Some(&PathBuf::from("/home/me/.peopledesk/db/hr.db"))
        );
        assert_eq!(config.connection.pool_size, 2);
        assert_eq!(config.blocked_timeout, Duration::from_millis(250));
        assert!(config.yield_on_version_change);

        let memory = DatabaseConfig::from_settings(
            &DatabaseSettings {
                in_memory: true,
                ..DatabaseSettings::default()
            },
            Path::new("/tmp"),
        );
        assert_eq!(memory.location, StoreLocation::Memory("peopledesk".into()));
    }

    #[tokio::test]
    async fn get_db_caches_the_handle() {
        let manager = ConnectionManager::new(DatabaseConfig::in_memory("mgr-cache"), table());
        assert!(!manager.is_connected().await);
        assert_eq!(manager.db_version().await, None);

        let first = manager.get_db().await.unwrap();
        let second = manager.get_db().await.unwrap();
        assert!(Arc::ptr_eq(&first.inner, &second.inner));
        assert_eq!(manager.db_version().await, Some(2));
        assert_eq!(manager.target_version(), 2);
    }

    #[tokio::test]
    async fn closed_handle_is_reopened() {
        let manager = ConnectionManager::new(DatabaseConfig::in_memory("mgr-reopen"), table());
        let first = manager.get_db().await.unwrap();
        first.close();
        assert!(!manager.is_connected().await);

        let second = manager.get_db().await.unwrap();
        assert!(!second.is_closed());
        assert!(first.is_closed());
    }

    #[tokio::test]
    async fn target_above_the_newest_migration_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::file(dir.path(), "hr");
        let manager = ConnectionManager::new(config.clone().target_version(7), table());
        let err = manager.get_db().await.unwrap_err();
        assert_eq!(err.code(), crate::errors::ErrorCode::Constraint);
        assert!(!manager.is_connected().await);

        let db = ConnectionManager::new(config, table()).get_db().await.unwrap();
        assert_eq!(db.version(), 2);
    }

    #[tokio::test]
    async fn opening_at_an_older_target_is_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::file(dir.path(), "hr");
        let manager = ConnectionManager::new(config.clone(), table());
        let _ = manager.get_db().await.unwrap();
        manager.close_db().await;

        let older = ConnectionManager::new(config.target_version(1), table());
        let err = older.get_db().await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionMismatch {
                expected: 1,
                found: 2
            }
        ));
    }
}
