//! Schema history of the HR application.
//!
//! Append-only: released steps are never edited. New collections, indexes
//! and fields go in a new step with the next version.

use peopledesk_store::{IndexDef, Migration, Migrations, Result};

use crate::entities::{
    Appraisal, AuditEntry, ComplianceDocument, Contract, Department, Employee, LeaveRequest,
    OnboardingTask, PayrollDistribution, TrainingRecord,
};
use crate::record::Record;

/// Version the current build opens stores at.
pub const SCHEMA_VERSION: u32 = 5;

fn by_employee() -> IndexDef {
    IndexDef::new("byEmployee", "employeeId")
}

/// Every migration step, oldest first.
pub fn steps() -> Vec<Migration> {
    vec![
        Migration::new(1, "employees and departments")
            .create_collection(Employee::COLLECTION)
            .create_index(Employee::COLLECTION, IndexDef::on("employeeCode").unique())
            .create_index(Employee::COLLECTION, IndexDef::on("email").unique())
            .create_index(Employee::COLLECTION, IndexDef::new("byDepartment", "departmentId"))
            .create_collection(Department::COLLECTION)
            .create_index(Department::COLLECTION, IndexDef::on("code").unique()),
        Migration::new(2, "payroll distributions and contracts")
            .create_collection(PayrollDistribution::COLLECTION)
            .create_index(PayrollDistribution::COLLECTION, by_employee())
            .create_index(PayrollDistribution::COLLECTION, IndexDef::new("byPeriod", "period"))
            .create_collection(Contract::COLLECTION)
            .create_index(Contract::COLLECTION, by_employee()),
        Migration::new(3, "onboarding, leave and employee name fields")
            .create_collection(OnboardingTask::COLLECTION)
            .create_index(OnboardingTask::COLLECTION, by_employee())
            .create_collection(LeaveRequest::COLLECTION)
            .create_index(LeaveRequest::COLLECTION, by_employee())
            .create_index(LeaveRequest::COLLECTION, IndexDef::new("byStatus", "status"))
            .add_fields(Employee::COLLECTION, ["middleName", "pronouns"]),
        Migration::new(4, "training, compliance and appraisals")
            .create_collection(TrainingRecord::COLLECTION)
            .create_index(TrainingRecord::COLLECTION, by_employee())
            .create_collection(ComplianceDocument::COLLECTION)
            .create_index(ComplianceDocument::COLLECTION, by_employee())
            .create_index(ComplianceDocument::COLLECTION, IndexDef::new("byKind", "kind"))
            .create_collection(Appraisal::COLLECTION)
            .create_index(Appraisal::COLLECTION, by_employee())
            .create_index(Appraisal::COLLECTION, IndexDef::new("byReviewer", "reviewerId")),
        Migration::new(5, "audit log and department cost centers")
            .create_collection(AuditEntry::COLLECTION)
            .create_index(AuditEntry::COLLECTION, IndexDef::new("byCollection", "collection"))
            .create_index(AuditEntry::COLLECTION, IndexDef::new("byActor", "actor"))
            .add_fields(Department::COLLECTION, ["costCenter"]),
    ]
}

/// The validated migration table.
pub fn app_migrations() -> Result<Migrations> {
    Migrations::new(steps())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_valid_and_current() {
        let migrations = app_migrations().unwrap();
        assert_eq!(migrations.latest_version(), SCHEMA_VERSION);
    }

    #[test]
    fn every_record_type_gets_a_collection() {
        let created: Vec<String> = steps()
            .into_iter()
            .flat_map(|m| m.ops)
            .filter_map(|op| match op {
                peopledesk_store::SchemaOp::CreateCollection { name } => Some(name),
                _ => None,
            })
            .collect();
        for expected in [
            Employee::COLLECTION,
            Department::COLLECTION,
            PayrollDistribution::COLLECTION,
            OnboardingTask::COLLECTION,
            Contract::COLLECTION,
            LeaveRequest::COLLECTION,
            TrainingRecord::COLLECTION,
            ComplianceDocument::COLLECTION,
            Appraisal::COLLECTION,
            AuditEntry::COLLECTION,
        ] {
            assert!(created.iter().any(|c| c == expected), "{expected}");
        }
    }
}
