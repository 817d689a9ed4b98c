//! Training records and compliance documents.

use chrono::NaiveDate;
use peopledesk_store::{RecordId, Result};
use serde::{Deserialize, Serialize};

use crate::record::{Record, Validate};
use crate::validate;

/// A course an employee took.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRecord {
    /// Trained employee.
    pub employee_id: RecordId,
    /// Course name.
    pub course: String,
    /// Completion date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_on: Option<NaiveDate>,
    /// Certification expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<NaiveDate>,
    /// Score out of 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
}

impl Validate for TrainingRecord {
    fn validate(&self) -> Result<()> {
        validate::non_empty(Self::COLLECTION, "course", &self.course)?;
        if let Some(completed) = self.completed_on {
            validate::date_order(Self::COLLECTION, "expiresOn", completed, self.expires_on)?;
        }
        match self.score {
            Some(score) => validate::in_range(Self::COLLECTION, "score", i64::from(score), 0, 100),
            None => Ok(()),
        }
    }
}

impl Record for TrainingRecord {
    const COLLECTION: &'static str = "training_records";
}

/// A document held for regulatory purposes (right to work, certificates,
/// signed policies).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceDocument {
    /// Employee the document concerns; `None` for organisation-wide documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<RecordId>,
    /// Title.
    pub title: String,
    /// Category, e.g. `right_to_work`.
    pub kind: String,
    /// Issue date.
    pub issued_on: NaiveDate,
    /// Expiry date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<NaiveDate>,
    /// External reference number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl ComplianceDocument {
    /// Whether the document has expired as of `today`.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expires_on.is_some_and(|expiry| expiry < today)
    }
}

impl Validate for ComplianceDocument {
    fn validate(&self) -> Result<()> {
        validate::non_empty(Self::COLLECTION, "title", &self.title)?;
        validate::non_empty(Self::COLLECTION, "kind", &self.kind)?;
        validate::date_order(Self::COLLECTION, "expiresOn", self.issued_on, self.expires_on)
    }
}

impl Record for ComplianceDocument {
    const COLLECTION: &'static str = "compliance_documents";
}
