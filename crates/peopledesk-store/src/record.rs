//! The stored-record envelope.
//!
//! Callers describe only their domain fields (`T`); the persistence layer
//! owns the identifier and both timestamps through [`Stored<T>`]. Because
//! `T` never carries `id`, `createdAt` or `updatedAt`, callers cannot set
//! them.

use std::ops::{Deref, DerefMut};

use chrono::{DateTime, SecondsFormat, SubsecRound, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, StoreError};

/// Auto-assigned numeric record identifier. Never reused within a collection.
pub type RecordId = i64;

/// Field names owned by the persistence layer.
pub const RESERVED_FIELDS: [&str; 3] = ["id", "createdAt", "updatedAt"];

/// A record as stored: identifier, timestamps and the domain fields.
///
/// Serializes flat (`{"id":1,"createdAt":..,"updatedAt":..,"name":"A"}`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stored<T> {
    /// Identifier assigned on creation.
    pub id: RecordId,
    /// Creation time, set once.
    pub created_at: DateTime<Utc>,
    /// Last modification time, rewritten by every update.
    pub updated_at: DateTime<Utc>,
    /// Domain fields.
    #[serde(flatten)]
    pub data: T,
}

impl<T> Stored<T> {
    /// Drop the envelope and keep the domain fields.
    pub fn into_inner(self) -> T {
        self.data
    }
}

impl<T> Deref for Stored<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for Stored<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

/// Raw row of a collection table.
#[derive(Clone, Debug)]
pub struct RecordRow {
    /// Primary key.
    pub id: RecordId,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 modification timestamp.
    pub updated_at: String,
    /// Domain fields as a JSON object.
    pub data: String,
}

impl RecordRow {
    /// Decode into a typed record.
    pub fn decode<T: DeserializeOwned>(&self, collection: &str) -> Result<Stored<T>> {
        let data: T = serde_json::from_str(&self.data).map_err(|e| StoreError::Validation {
            collection: Some(collection.to_string()),
            field: "record".to_string(),
            message: format!("stored record {} does not match the requested shape: {e}", self.id),
        })?;
        Ok(Stored {
            id: self.id,
            created_at: parse_timestamp(collection, &self.created_at)?,
            updated_at: parse_timestamp(collection, &self.updated_at)?,
            data,
        })
    }
}

/// Serialize domain fields into the JSON object stored in the `data` column.
///
/// Rejects non-object shapes and any attempt to write a reserved field.
pub(crate) fn to_document<T: Serialize>(collection: &str, data: &T) -> Result<Map<String, Value>> {
    let value = serde_json::to_value(data)
        .map_err(|e| StoreError::validation(Some(collection), "record", e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(StoreError::validation(
            Some(collection),
            "record",
            "records must serialize to a JSON object",
        ));
    };
    if let Some(reserved) = RESERVED_FIELDS.iter().find(|f| map.contains_key(**f)) {
        return Err(StoreError::validation(
            Some(collection),
            *reserved,
            "field is owned by the persistence layer",
        ));
    }
    Ok(map)
}

/// Serialize a partial update. Reserved keys are silently dropped.
pub(crate) fn to_patch<P: Serialize>(collection: &str, patch: &P) -> Result<Map<String, Value>> {
    let value = serde_json::to_value(patch)
        .map_err(|e| StoreError::validation(Some(collection), "patch", e.to_string()))?;
    let Value::Object(mut map) = value else {
        return Err(StoreError::validation(
            Some(collection),
            "patch",
            "updates must serialize to a JSON object",
        ));
    };
    for reserved in RESERVED_FIELDS {
        let _ = map.remove(reserved);
    }
    Ok(map)
}

/// Current time truncated to the stored (microsecond) precision.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A timestamp strictly after `previous`, normally "now".
pub(crate) fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now();
    if now > previous {
        now
    } else {
        previous + TimeDelta::microseconds(1)
    }
}

/// Fixed-width RFC 3339 with microseconds, so lexical order is time order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(collection: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::transaction(Some(collection), "decode", e))
}
