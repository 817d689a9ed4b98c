//! Employees and departments.

use chrono::NaiveDate;
use peopledesk_store::{RecordId, Result};
use serde::{Deserialize, Serialize};

use crate::record::{Record, Validate};
use crate::validate;

/// Where an employee stands with the organisation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    /// Working.
    #[default]
    Active,
    /// On extended leave.
    OnLeave,
    /// No longer employed.
    Terminated,
}

/// A person employed by the organisation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    /// Human-facing employee number, unique.
    pub employee_code: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Work email, unique.
    pub email: String,
    /// Department the employee belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<RecordId>,
    /// Role title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    /// First working day.
    pub hire_date: NaiveDate,
    /// Employment status.
    #[serde(default)]
    pub status: EmploymentStatus,
    /// Middle name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    /// Preferred pronouns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronouns: Option<String>,
}

impl Employee {
    /// Display name.
    pub fn full_name(&self) -> String {
        match &self.middle_name {
            Some(middle) => format!("{} {middle} {}", self.first_name, self.last_name),
            None => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

impl Validate for Employee {
    fn validate(&self) -> Result<()> {
        validate::non_empty(Self::COLLECTION, "employeeCode", &self.employee_code)?;
        validate::non_empty(Self::COLLECTION, "firstName", &self.first_name)?;
        validate::non_empty(Self::COLLECTION, "lastName", &self.last_name)?;
        validate::email(Self::COLLECTION, "email", &self.email)
    }
}

impl Record for Employee {
    const COLLECTION: &'static str = "employees";
}

/// Partial update of an [`Employee`]. Unset fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct EmployeePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EmploymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pronouns: Option<String>,
}

impl Validate for EmployeePatch {
    fn validate(&self) -> Result<()> {
        if let Some(email) = &self.email {
            validate::email(Employee::COLLECTION, "email", email)?;
        }
        if let Some(name) = &self.first_name {
            validate::non_empty(Employee::COLLECTION, "firstName", name)?;
        }
        if let Some(name) = &self.last_name {
            validate::non_empty(Employee::COLLECTION, "lastName", name)?;
        }
        Ok(())
    }
}

/// An organisational unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    /// Display name.
    pub name: String,
    /// Short code, unique.
    pub code: String,
    /// Head of department.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<RecordId>,
    /// Finance cost center.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_center: Option<String>,
}

impl Validate for Department {
    fn validate(&self) -> Result<()> {
        validate::non_empty(Self::COLLECTION, "name", &self.name)?;
        validate::non_empty(Self::COLLECTION, "code", &self.code)
    }
}

impl Record for Department {
    const COLLECTION: &'static str = "departments";
}

/// Partial update of a [`Department`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct DepartmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_center: Option<String>,
}

impl Validate for DepartmentPatch {
    fn validate(&self) -> Result<()> {
        match &self.name {
            Some(name) => validate::non_empty(Department::COLLECTION, "name", name),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee() -> Employee {
        Employee {
            employee_code: "E-001".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@peopledesk.io".into(),
            department_id: None,
            job_title: None,
            hire_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            status: EmploymentStatus::Active,
            middle_name: None,
            pronouns: None,
        }
    }

    #[test]
    fn employee_serializes_camel_case_without_unset_fields() {
        let value = serde_json::to_value(employee()).unwrap();
        assert_eq!(value["employeeCode"], "E-001");
        assert_eq!(value["hireDate"], "2026-01-05");
        assert_eq!(value["status"], "active");
        assert!(value.get("middleName").is_none());
    }

    #[test]
    fn employee_written_before_additive_fields_still_reads() {
        let old: Employee = serde_json::from_value(serde_json::json!({
            "employeeCode": "E-001",
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@peopledesk.io",
            "hireDate": "2026-01-05"
        }))
        .unwrap();
        assert_eq!(old.pronouns, None);
        assert_eq!(old.status, EmploymentStatus::Active);
    }

    #[test]
    fn validators() {
        assert!(employee().validate().is_ok());
        let mut bad = employee();
        bad.email = "ada".into();
        assert!(bad.validate().is_err());

        let patch = EmployeePatch {
            last_name: Some(String::new()),
            ..EmployeePatch::default()
        };
        assert!(patch.validate().is_err());
        assert!(EmployeePatch::default().validate().is_ok());
    }

    #[test]
    fn full_name_includes_middle_name() {
        let mut e = employee();
        assert_eq!(e.full_name(), "Ada Lovelace");
        e.middle_name = Some("King".into());
        assert_eq!(e.full_name(), "Ada King Lovelace");
    }

    #[test]
    fn empty_patch_serializes_to_empty_object() {
        let value = serde_json::to_value(DepartmentPatch::default()).unwrap();
        assert_eq!(value, serde_json::json!({}));
    }
}
