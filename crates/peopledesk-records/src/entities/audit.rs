//! Audit log entries.

use peopledesk_store::{Collection, RecordId, Result, Stored};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{Record, Validate, create_record};
use crate::validate;

/// Who did what to which record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// User or process that acted.
    pub actor: String,
    /// Verb, e.g. `create`, `approve`.
    pub action: String,
    /// Collection acted on.
    pub collection: String,
    /// Record acted on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<RecordId>,
    /// Free-form detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl AuditEntry {
    /// Entry for `action` on record `id` of `R`'s collection.
    pub fn on<R: Record>(actor: impl Into<String>, action: impl Into<String>, id: RecordId) -> Self {
        Self {
            actor: actor.into(),
            action: action.into(),
            collection: R::COLLECTION.to_string(),
            record_id: Some(id),
            detail: None,
        }
    }

    /// Attach detail.
    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Append this entry to the log.
    pub async fn append(self, log: &Collection<Self>) -> Result<Stored<Self>> {
        create_record(log, self).await
    }
}

impl Validate for AuditEntry {
    fn validate(&self) -> Result<()> {
        validate::non_empty(Self::COLLECTION, "actor", &self.actor)?;
        validate::non_empty(Self::COLLECTION, "action", &self.action)?;
        validate::non_empty(Self::COLLECTION, "collection", &self.collection)
    }
}

impl Record for AuditEntry {
    const COLLECTION: &'static str = "audit_log";
}
