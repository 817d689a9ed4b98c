//! Onboarding tasks, leave requests and appraisals: records that move
//! through states and are updated in place.

use chrono::NaiveDate;
use peopledesk_store::{RecordId, Result};
use serde::{Deserialize, Serialize};

use crate::record::{Record, Validate};
use crate::validate;

/// A step in a new hire's onboarding checklist.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingTask {
    /// Employee being onboarded.
    pub employee_id: RecordId,
    /// What needs doing.
    pub title: String,
    /// Who does it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<RecordId>,
    /// Deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Done.
    #[serde(default)]
    pub completed: bool,
}

impl Validate for OnboardingTask {
    fn validate(&self) -> Result<()> {
        validate::non_empty(Self::COLLECTION, "title", &self.title)
    }
}

impl Record for OnboardingTask {
    const COLLECTION: &'static str = "onboarding_tasks";
}

/// Partial update of an [`OnboardingTask`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct OnboardingTaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl Validate for OnboardingTaskPatch {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Kind of leave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum LeaveKind {
    Annual,
    Sick,
    Parental,
    Unpaid,
}

/// Approval state of a leave request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum LeaveStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

/// A request for time off.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    /// Requesting employee.
    pub employee_id: RecordId,
    /// Kind of leave.
    pub kind: LeaveKind,
    /// First day off.
    pub start_date: NaiveDate,
    /// Last day off.
    pub end_date: NaiveDate,
    /// Approval state.
    #[serde(default)]
    pub status: LeaveStatus,
    /// Free-text reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Validate for LeaveRequest {
    fn validate(&self) -> Result<()> {
        validate::date_order(Self::COLLECTION, "endDate", self.start_date, Some(self.end_date))
    }
}

impl Record for LeaveRequest {
    const COLLECTION: &'static str = "leave_requests";
}

/// Partial update of a [`LeaveRequest`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct LeaveRequestPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LeaveStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Validate for LeaveRequestPatch {
    fn validate(&self) -> Result<()> {
        match (self.start_date, self.end_date) {
            (Some(start), end @ Some(_)) => {
                validate::date_order(LeaveRequest::COLLECTION, "endDate", start, end)
            }
            _ => Ok(()),
        }
    }
}

/// A performance review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appraisal {
    /// Reviewed employee.
    pub employee_id: RecordId,
    /// Reviewer.
    pub reviewer_id: RecordId,
    /// Review period, `YYYY-MM`.
    pub period: String,
    /// Rating from 1 to 5, once given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    /// Written summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

fn check_rating(rating: Option<u8>) -> Result<()> {
    match rating {
        Some(r) => validate::in_range(Appraisal::COLLECTION, "rating", i64::from(r), 1, 5),
        None => Ok(()),
    }
}

impl Validate for Appraisal {
    fn validate(&self) -> Result<()> {
        validate::period(Self::COLLECTION, "period", &self.period)?;
        check_rating(self.rating)
    }
}

impl Record for Appraisal {
    const COLLECTION: &'static str = "appraisals";
}

/// Partial update of an [`Appraisal`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct AppraisalPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl Validate for AppraisalPatch {
    fn validate(&self) -> Result<()> {
        check_rating(self.rating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn leave_dates_must_be_ordered() {
        let mut leave = LeaveRequest {
            employee_id: 1,
            kind: LeaveKind::Annual,
            start_date: date(2026, 8, 3),
            end_date: date(2026, 8, 14),
            status: LeaveStatus::Pending,
            reason: None,
        };
        assert!(leave.validate().is_ok());
        leave.end_date = date(2026, 8, 1);
        assert!(leave.validate().is_err());
    }

    #[test]
    fn status_serializes_snake_case() {
        let patch = LeaveRequestPatch {
            status: Some(LeaveStatus::Approved),
            ..LeaveRequestPatch::default()
        };
        assert_eq!(
            serde_json::to_value(patch).unwrap(),
            serde_json::json!({"status": "approved"})
        );
    }

    #[test]
    fn ratings_are_one_to_five() {
        assert!(AppraisalPatch { rating: Some(5), summary: None }.validate().is_ok());
        assert!(AppraisalPatch { rating: Some(6), summary: None }.validate().is_err());
        let appraisal = Appraisal {
            employee_id: 1,
            reviewer_id: 2,
            period: "2026-06".into(),
            rating: Some(0),
            summary: None,
        };
        assert!(appraisal.validate().is_err());
    }
}
