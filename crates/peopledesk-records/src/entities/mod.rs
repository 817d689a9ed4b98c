//! Record shapes, one per collection.

pub mod audit;
pub mod development;
pub mod payroll;
pub mod people;
pub mod workflow;

pub use audit::AuditEntry;
pub use development::{ComplianceDocument, TrainingRecord};
pub use payroll::{Contract, ContractKind, PayrollDistribution};
pub use people::{Department, DepartmentPatch, Employee, EmployeePatch, EmploymentStatus};
pub use workflow::{
    Appraisal, AppraisalPatch, LeaveKind, LeaveRequest, LeaveRequestPatch, LeaveStatus,
    OnboardingTask, OnboardingTaskPatch,
};
