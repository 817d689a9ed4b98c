//! Binding record shapes to their collections.

use peopledesk_store::{Collection, Database, RecordId, Result, Stored};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Entity-level checks run before a write.
pub trait Validate {
    /// Fail with a validation error if the value is unacceptable.
    fn validate(&self) -> Result<()>;
}

/// A record shape stored in a fixed collection.
pub trait Record: Validate + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection name.
    const COLLECTION: &'static str;

    /// Typed collection for this record on `db`.
    fn collection(db: &Database) -> Result<Collection<Self>> {
        Collection::new(db, Self::COLLECTION)
    }
}

/// Validate, then insert.
pub async fn create_record<R: Record>(collection: &Collection<R>, record: R) -> Result<Stored<R>> {
    record.validate()?;
    let stored = collection.create(record).await?;
    debug!(collection = R::COLLECTION, id = stored.id, "record created");
    Ok(stored)
}

/// Validate every record, then insert them all in one transaction.
pub async fn create_records<R: Record>(
    collection: &Collection<R>,
    records: Vec<R>,
) -> Result<Vec<Stored<R>>> {
    for record in &records {
        record.validate()?;
    }
    collection.batch_create(records).await
}

/// Validate the patch and the merged record, then update.
///
/// The merged record is checked before the write by applying the patch to
/// the current value; a concurrent writer between the read and the update
/// is not re-checked.
pub async fn update_record<R, P>(collection: &Collection<R>, id: RecordId, patch: &P) -> Result<Stored<R>>
where
    R: Record,
    P: Validate + Serialize,
{
    patch.validate()?;
    if let Some(current) = collection.get_by_id(id).await? {
        let merged = merged_preview::<R, P>(R::COLLECTION, &current.data, patch)?;
        merged.validate()?;
    }
    collection.update(id, patch).await
}

fn merged_preview<R, P>(collection: &str, current: &R, patch: &P) -> Result<R>
where
    R: Serialize + DeserializeOwned,
    P: Serialize,
{
    let shape_error =
        |e: serde_json::Error| peopledesk_store::StoreError::validation(Some(collection), "patch", e.to_string());
    let mut value = serde_json::to_value(current).map_err(shape_error)?;
    let patch = serde_json::to_value(patch).map_err(shape_error)?;
    if let (Some(target), serde_json::Value::Object(fields)) = (value.as_object_mut(), patch) {
        for (key, field) in fields {
            if !peopledesk_store::RESERVED_FIELDS.contains(&key.as_str()) {
                let _ = target.insert(key, field);
            }
        }
    }
    serde_json::from_value(value).map_err(shape_error)
}
