//! Bulk and whole-collection operations. Each runs in one transaction.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use super::collection::{Collection, encode, require_collection};
use super::database::Database;
use crate::errors::{Result, StoreError};
use crate::record::{RecordId, Stored, format_timestamp, now};
use crate::sqlite::catalog;
use crate::sqlite::connection::write_transaction;
use crate::sqlite::repositories::RecordRepo;

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Insert every record or none. All records share one timestamp.
    pub async fn batch_create(&self, records: Vec<T>) -> Result<Vec<Stored<T>>> {
        let name = Arc::clone(&self.name);
        let bodies = records
            .iter()
            .map(|data| encode(&name, data))
            .collect::<Result<Vec<_>>>()?;
        self.db
            .run(Some(self.name()), "batch_create", move |conn| {
                let fail = |e| StoreError::from_sqlite(&name, "batch_create", e);
                let tx = write_transaction(conn).map_err(fail)?;
                require_collection(&tx, &name)?;
                let ts = now();
                let stamp = format_timestamp(ts);
                let ids = bodies
                    .iter()
                    .map(|body| RecordRepo::insert(&tx, &name, &stamp, body).map_err(fail))
                    .collect::<Result<Vec<_>>>()?;
                tx.commit().map_err(fail)?;
                Ok(ids
                    .into_iter()
                    .zip(records)
                    .map(|(id, data)| Stored {
                        id,
                        created_at: ts,
                        updated_at: ts,
                        data,
                    })
                    .collect())
            })
            .await
    }

    /// Delete every listed record that exists; absent ids are skipped.
    /// Returns how many records were removed.
    pub async fn batch_delete(&self, ids: &[RecordId]) -> Result<usize> {
        let name = Arc::clone(&self.name);
        let ids = ids.to_vec();
        self.db
            .run(Some(self.name()), "batch_delete", move |conn| {
                let fail = |e| StoreError::from_sqlite(&name, "batch_delete", e);
                let tx = write_transaction(conn).map_err(fail)?;
                require_collection(&tx, &name)?;
                let mut removed = 0;
                for id in ids {
                    removed += RecordRepo::delete(&tx, &name, id).map_err(fail)?;
                }
                tx.commit().map_err(fail)?;
                Ok(removed)
            })
            .await
    }
}

impl Database {
    /// Number of records in `collection`.
    pub async fn count_records(&self, collection: &str) -> Result<u64> {
        catalog::validate_identifier("collection", collection)?;
        let name = collection.to_string();
        self.run(Some(collection), "count_records", move |conn| {
            let fail = |e| StoreError::from_sqlite(&name, "count_records", e);
            let tx = conn.transaction().map_err(fail)?;
            require_collection(&tx, &name)?;
            RecordRepo::count(&tx, &name).map_err(fail)
        })
        .await
    }

    /// Remove every record of `collection`. Returns how many were removed.
    pub async fn clear_store(&self, collection: &str) -> Result<usize> {
        catalog::validate_identifier("collection", collection)?;
        let name = collection.to_string();
        let removed = self
            .run(Some(collection), "clear_store", move |conn| {
                let fail = |e| StoreError::from_sqlite(&name, "clear_store", e);
                let tx = write_transaction(conn).map_err(fail)?;
                require_collection(&tx, &name)?;
                let removed = RecordRepo::clear(&tx, &name).map_err(fail)?;
                tx.commit().map_err(fail)?;
                Ok(removed)
            })
            .await?;
        info!(collection, removed, "collection cleared");
        Ok(removed)
    }

    /// Remove every record of every collection in one transaction.
    /// Irreversible. Returns how many records were removed.
    pub async fn clear_all_data(&self) -> Result<usize> {
        let removed = self
            .run(None, "clear_all_data", |conn| {
                let fail = |e: rusqlite::Error| StoreError::transaction(None, "clear_all_data", e);
                let tx = write_transaction(conn).map_err(fail)?;
                let mut removed = 0;
                for name in catalog::list_collections(&tx).map_err(fail)? {
                    removed += RecordRepo::clear(&tx, &name)
                        .map_err(|e| StoreError::from_sqlite(&name, "clear_all_data", e))?;
                }
                tx.commit().map_err(fail)?;
                Ok(removed)
            })
            .await?;
        warn!(database = %self.name(), removed, "all data cleared");
        Ok(removed)
    }
}
