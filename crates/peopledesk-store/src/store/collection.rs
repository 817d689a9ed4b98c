//! Generic CRUD over one collection.
//!
//! [`Collection<T>`] is the factory every entity module instantiates: bind a
//! record shape `T` to a collection name on a live [`Database`] and get the
//! full set of operations, each in its own short transaction on the
//! blocking pool.

use std::marker::PhantomData;
use std::sync::Arc;

use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::database::Database;
use crate::errors::{Result, StoreError};
use crate::record::{
    RecordId, Stored, format_timestamp, next_timestamp, now, parse_timestamp, to_document,
    to_patch,
};
use crate::sqlite::catalog;
use crate::sqlite::connection::write_transaction;
use crate::sqlite::repositories::RecordRepo;

/// Typed access to one collection.
pub struct Collection<T> {
    pub(crate) db: Database,
    pub(crate) name: Arc<str>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            name: Arc::clone(&self.name),
            _record: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("database", &self.db.name())
            .finish()
    }
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Bind `name` on `db`. The name must be a valid collection identifier;
    /// whether the collection exists is checked per operation.
    pub fn new(db: &Database, name: &str) -> Result<Self> {
        catalog::validate_identifier("collection", name)?;
        Ok(Self {
            db: db.clone(),
            name: Arc::from(name),
            _record: PhantomData,
        })
    }

    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle this collection runs on.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Insert a record; `createdAt` and `updatedAt` are both set to now.
    ///
    /// A unique-index clash is [`StoreError::DuplicateRecord`].
    pub async fn create(&self, data: T) -> Result<Stored<T>> {
        let name = Arc::clone(&self.name);
        let body = encode(&name, &data)?;
        self.db
            .run(Some(self.name()), "create", move |conn| {
                let fail = |e| StoreError::from_sqlite(&name, "create", e);
                let tx = write_transaction(conn).map_err(fail)?;
                require_collection(&tx, &name)?;
                let ts = now();
                let id = RecordRepo::insert(&tx, &name, &format_timestamp(ts), &body).map_err(fail)?;
                tx.commit().map_err(fail)?;
                Ok(Stored {
                    id,
                    created_at: ts,
                    updated_at: ts,
                    data,
                })
            })
            .await
    }

    /// Every record, newest first.
    pub async fn get_all(&self) -> Result<Vec<Stored<T>>> {
        let name = Arc::clone(&self.name);
        self.db
            .run(Some(self.name()), "get_all", move |conn| {
                let fail = |e| StoreError::from_sqlite(&name, "get_all", e);
                let tx = conn.transaction().map_err(fail)?;
                require_collection(&tx, &name)?;
                let rows = RecordRepo::list_desc(&tx, &name).map_err(fail)?;
                rows.iter().map(|row| row.decode(&name)).collect()
            })
            .await
    }

    /// One record, or `None` if no record has `id`.
    pub async fn get_by_id(&self, id: RecordId) -> Result<Option<Stored<T>>> {
        let name = Arc::clone(&self.name);
        self.db
            .run(Some(self.name()), "get_by_id", move |conn| {
                let fail = |e| StoreError::from_sqlite(&name, "get_by_id", e);
                let tx = conn.transaction().map_err(fail)?;
                require_collection(&tx, &name)?;
                RecordRepo::get(&tx, &name, id)
                    .map_err(fail)?
                    .map(|row| row.decode(&name))
                    .transpose()
            })
            .await
    }

    /// Shallow-merge `patch` over an existing record.
    ///
    /// `patch` must serialize to an object; `id`, `createdAt` and
    /// `updatedAt` keys in it are ignored. The merged record must still be
    /// a valid `T`. `updatedAt` always moves forward.
    pub async fn update<P: Serialize>(&self, id: RecordId, patch: &P) -> Result<Stored<T>> {
        let name = Arc::clone(&self.name);
        let patch = to_patch(&name, patch)?;
        self.db
            .run(Some(self.name()), "update", move |conn| {
                let fail = |e| StoreError::from_sqlite(&name, "update", e);
                let tx = write_transaction(conn).map_err(fail)?;
                require_collection(&tx, &name)?;
                let Some(row) = RecordRepo::get(&tx, &name, id).map_err(fail)? else {
                    return Err(StoreError::RecordNotFound {
                        collection: name.to_string(),
                        id,
                    });
                };

                let mut document: serde_json::Map<String, Value> = serde_json::from_str(&row.data)
                    .map_err(|e| StoreError::transaction(Some(&*name), "update", e))?;
                document.extend(patch);
                let merged = Value::Object(document);
                let data: T = serde_json::from_value(merged.clone()).map_err(|e| {
                    StoreError::validation(
                        Some(&*name),
                        "patch",
                        format!("updated record no longer matches its shape: {e}"),
                    )
                })?;

                let created_at = parse_timestamp(&name, &row.created_at)?;
                let updated_at = next_timestamp(parse_timestamp(&name, &row.updated_at)?);
                let _ = RecordRepo::update(
                    &tx,
                    &name,
                    id,
                    &format_timestamp(updated_at),
                    &merged.to_string(),
                )
                .map_err(fail)?;
                tx.commit().map_err(fail)?;
                Ok(Stored {
                    id,
                    created_at,
                    updated_at,
                    data,
                })
            })
            .await
    }

    /// Remove a record. Missing ids are [`StoreError::RecordNotFound`].
    pub async fn delete(&self, id: RecordId) -> Result<()> {
        let name = Arc::clone(&self.name);
        self.db
            .run(Some(self.name()), "delete", move |conn| {
                let fail = |e| StoreError::from_sqlite(&name, "delete", e);
                let tx = write_transaction(conn).map_err(fail)?;
                require_collection(&tx, &name)?;
                if !RecordRepo::exists(&tx, &name, id).map_err(fail)? {
                    return Err(StoreError::RecordNotFound {
                        collection: name.to_string(),
                        id,
                    });
                }
                let _ = RecordRepo::delete(&tx, &name, id).map_err(fail)?;
                tx.commit().map_err(fail)?;
                Ok(())
            })
            .await
    }

    /// Records whose `index` key equals `value`, ascending id.
    ///
    /// An index the collection does not declare is a
    /// [`StoreError::Constraint`].
    pub async fn get_by_index<V: Serialize>(&self, index: &str, value: &V) -> Result<Vec<Stored<T>>> {
        let name = Arc::clone(&self.name);
        let index = index.to_string();
        let key = index_key(&name, value)?;
        self.db
            .run(Some(self.name()), "get_by_index", move |conn| {
                let fail = |e| StoreError::from_sqlite(&name, "get_by_index", e);
                let tx = conn.transaction().map_err(fail)?;
                require_collection(&tx, &name)?;
                let Some(def) = catalog::find_index(&tx, &name, &index).map_err(fail)? else {
                    return Err(StoreError::constraint(
                        Some(&*name),
                        format!("collection '{name}' has no index '{index}'"),
                    ));
                };
                let expression = catalog::key_expression(&def.key_path);
                let rows = RecordRepo::find_by_key(&tx, &name, &expression, key).map_err(fail)?;
                rows.iter().map(|row| row.decode(&name)).collect()
            })
            .await
    }
}

/// Serialize a new record's fields into the stored JSON text.
pub(crate) fn encode<T: Serialize>(collection: &str, data: &T) -> Result<String> {
    let document = to_document(collection, data)?;
    Ok(Value::Object(document).to_string())
}

/// Fail with [`StoreError::Constraint`] unless `name` is a catalogued
/// collection.
pub(crate) fn require_collection(conn: &Connection, name: &str) -> Result<()> {
    let exists = catalog::collection_exists(conn, name)
        .map_err(|e| StoreError::transaction(Some(name), "lookup", e))?;
    if exists {
        Ok(())
    } else {
        Err(StoreError::constraint(
            Some(name),
            format!("collection '{name}' does not exist"),
        ))
    }
}

/// Convert an index lookup value to the scalar `json_extract` yields.
fn index_key<V: Serialize>(collection: &str, value: &V) -> Result<SqlValue> {
    let value = serde_json::to_value(value)
        .map_err(|e| StoreError::validation(Some(collection), "index key", e.to_string()))?;
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(b))),
        Value::String(s) => Ok(SqlValue::Text(s)),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .ok_or_else(|| {
                StoreError::validation(Some(collection), "index key", format!("{n} is out of range"))
            }),
        Value::Array(_) | Value::Object(_) => Err(StoreError::validation(
            Some(collection),
            "index key",
            "index keys must be scalar values",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_keys_are_scalars() {
        assert_eq!(index_key("emp", &"E1").unwrap(), SqlValue::Text("E1".into()));
        assert_eq!(index_key("emp", &7).unwrap(), SqlValue::Integer(7));
        assert_eq!(index_key("emp", &true).unwrap(), SqlValue::Integer(1));
        assert_eq!(index_key("emp", &2.5).unwrap(), SqlValue::Real(2.5));
        assert_eq!(index_key("emp", &Option::<u8>::None).unwrap(), SqlValue::Null);
        assert!(index_key("emp", &vec![1]).is_err());
    }

    #[test]
    fn encode_rejects_reserved_fields() {
        let err = encode("emp", &serde_json::json!({"createdAt": "now"})).unwrap_err();
        assert_eq!(err.code(), crate::errors::ErrorCode::Validation);
    }
}
