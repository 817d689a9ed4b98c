//! The live database handle.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::contention::{ConnectionEvent, ContentionRegistry};
use crate::errors::{Result, StoreError};
use crate::sqlite::catalog::{self, SchemaSnapshot};
use crate::sqlite::connection::{ConnectionPool, PooledConnection, StoreLocation, checkout};
use crate::sqlite::migrations::{self, AppliedMigration};

/// Handle to an open store.
///
/// Clones share one underlying pool. Once the handle is closed (by its
/// manager, by a reset or delete, or by yielding to another session), every
/// operation on every clone fails with [`StoreError::Connection`].
#[derive(Clone)]
pub struct Database {
    pub(crate) inner: Arc<DatabaseInner>,
}

pub(crate) struct DatabaseInner {
    pool: RwLock<Option<ConnectionPool>>,
    name: String,
    location: StoreLocation,
    version: u32,
    events: broadcast::Sender<ConnectionEvent>,
    registry: ContentionRegistry,
    key: String,
    slot: RwLock<Option<u64>>,
}

impl DatabaseInner {
    /// Drop the pool and release the contention slot. Returns whether the
    /// handle was open.
    pub(crate) fn close(&self) -> bool {
        let Some(pool) = self.pool.write().take() else {
            return false;
        };
        drop(pool);
        if let Some(slot) = self.slot.write().take() {
            self.registry.release(&self.key, slot);
        }
        info!(name = %self.name, version = self.version, "database closed");
        let _ = self.events.send(ConnectionEvent::Closed);
        true
    }
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.get_mut().take() {
            self.registry.release(&self.key, slot);
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.inner.name)
            .field("location", &self.inner.location)
            .field("version", &self.inner.version)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Database {
    /// Wrap an opened, migrated pool and register it as a live session.
    pub(crate) fn register(
        pool: ConnectionPool,
        name: &str,
        location: StoreLocation,
        version: u32,
        events: broadcast::Sender<ConnectionEvent>,
        registry: ContentionRegistry,
        yield_on_version_change: bool,
    ) -> Self {
        let key = location.key();
        let inner = Arc::new(DatabaseInner {
            pool: RwLock::new(Some(pool)),
            name: name.to_string(),
            location,
            version,
            events: events.clone(),
            registry: registry.clone(),
            key: key.clone(),
            slot: RwLock::new(None),
        });
        let slot = registry.register(
            &key,
            version,
            events,
            yield_on_version_change,
            Arc::downgrade(&inner),
        );
        *inner.slot.write() = Some(slot);
        Self { inner }
    }

    /// Database name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Where the data lives.
    pub fn location(&self) -> &StoreLocation {
        &self.inner.location
    }

    /// Schema version this handle was opened at.
    pub fn version(&self) -> u32 {
        self.inner.version
    }

    /// Whether the handle has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.pool.read().is_none()
    }

    /// Close the handle. Idempotent.
    pub fn close(&self) {
        let _ = self.inner.close();
    }

    fn pool(&self) -> Result<ConnectionPool> {
        self.inner.pool.read().clone().ok_or_else(|| {
            StoreError::connection(
                format!("database '{}' has been closed", self.inner.name),
                None,
            )
        })
    }

    /// Run `f` with a pooled connection on the blocking thread pool.
    pub(crate) async fn run<R, F>(
        &self,
        collection: Option<&str>,
        operation: &'static str,
        f: F,
    ) -> Result<R>
    where
        F: FnOnce(&mut PooledConnection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let pool = self.pool()?;
        debug!(collection, operation, "store operation");
        let owned = collection.map(str::to_owned);
        tokio::task::spawn_blocking(move || {
            let mut conn = checkout(&pool)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::transaction(owned.as_deref(), operation, e))?
    }

    /// Collections, indexes and declared fields currently in the store.
    pub async fn schema(&self) -> Result<SchemaSnapshot> {
        self.run(None, "schema", |conn| {
            catalog::snapshot(conn).map_err(|e| StoreError::transaction(None, "schema", e))
        })
        .await
    }

    /// Names of every collection, sorted.
    pub async fn collections(&self) -> Result<Vec<String>> {
        self.run(None, "collections", |conn| {
            catalog::list_collections(conn)
                .map_err(|e| StoreError::transaction(None, "collections", e))
        })
        .await
    }

    /// Applied migration steps, oldest first.
    pub async fn history(&self) -> Result<Vec<AppliedMigration>> {
        self.run(None, "history", |conn| {
            migrations::history(conn).map_err(|e| StoreError::transaction(None, "history", e))
        })
        .await
    }
}
