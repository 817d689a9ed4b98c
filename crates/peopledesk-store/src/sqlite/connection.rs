//! `SQLite` connection pool for one store.
//!
//! Uses `r2d2` pooling over `r2d2_sqlite`. [`PragmaCustomizer`] runs on each
//! new connection so WAL mode, the busy timeout and foreign keys are always
//! set. In-memory stores use a named shared-cache URI with a single pooled
//! connection, so the data lives exactly as long as the pool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};

use crate::errors::{Result, StoreError};

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Alias for a pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Where a store keeps its data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreLocation {
    /// A database file (plus `-wal`/`-shm` side files).
    File(PathBuf),
    /// A named in-memory database, gone once its pool is dropped.
    Memory(String),
}

impl StoreLocation {
    /// Identity used to detect other sessions on the same store.
    pub fn key(&self) -> String {
        match self {
            Self::File(path) => {
                let absolute = std::path::absolute(path).unwrap_or_else(|_| path.clone());
                format!("file:{}", absolute.display())
            }
            Self::Memory(name) => format!("memory:{name}"),
        }
    }

    /// Files that make up the store on disk. Empty for in-memory stores.
    pub fn files(&self) -> Vec<PathBuf> {
        match self {
            Self::File(path) => vec![
                path.clone(),
                sibling(path, "-wal"),
                sibling(path, "-shm"),
                sibling(path, "-journal"),
            ],
            Self::Memory(_) => Vec::new(),
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Pool-level configuration.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pool size for file-backed stores (default: 8).
    pub pool_size: u32,
    /// Busy timeout in milliseconds (default: 5000).
    pub busy_timeout_ms: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u32,
    wal: bool,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA foreign_keys = ON;",
            self.busy_timeout_ms
        ))?;
        if self.wal {
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        }
        Ok(())
    }
}

/// Build the pool for `location`, creating the parent directory if needed.
///
/// Any failure is a [`StoreError::Connection`].
pub fn open_pool(location: &StoreLocation, config: &ConnectionConfig) -> Result<ConnectionPool> {
    let (manager, max_size, wal) = match location {
        StoreLocation::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::connection(
                        format!("failed to create data directory {}", parent.display()),
                        Some(Box::new(e)),
                    )
                })?;
            }
            (
                SqliteConnectionManager::file(path),
                config.pool_size.max(1),
                true,
            )
        }
        StoreLocation::Memory(name) => {
            let uri = format!("file:{name}?mode=memory&cache=shared");
            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            (SqliteConnectionManager::file(uri).with_flags(flags), 1, false)
        }
    };

    Pool::builder()
        .max_size(max_size)
        .min_idle(Some(1))
        .idle_timeout(None)
        .max_lifetime(None)
        .connection_timeout(Duration::from_secs(5))
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
            wal,
        }))
        .build(manager)
        .map_err(|e| {
            StoreError::connection(
                format!("failed to open store at {}", location.key()),
                Some(Box::new(e)),
            )
        })
}

/// Check a connection out of the pool.
pub fn checkout(pool: &ConnectionPool) -> Result<PooledConnection> {
    pool.get().map_err(|e| {
        StoreError::connection("no connection available from the pool", Some(Box::new(e)))
    })
}

/// Begin a transaction that takes the write lock up front.
///
/// A deferred transaction that reads before writing cannot wait for the
/// lock when another writer commits first; `BEGIN IMMEDIATE` waits under
/// the busy timeout instead.
pub fn write_transaction(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

/// Whether a `SQLite` error means another connection holds the lock.
pub fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}
