#![allow(missing_docs, unused_results)]

use chrono::NaiveDate;
use peopledesk_records::{
    AuditEntry, Department, Employee, EmployeePatch, EmploymentStatus, LeaveKind, LeaveRequest,
    LeaveRequestPatch, LeaveStatus, Record, SCHEMA_VERSION, app_migrations, create_record,
    create_records, schema, update_record,
};
use peopledesk_store::{ConnectionManager, Database, DatabaseConfig, ErrorCode, Migrations};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn employee(code: &str, email: &str) -> Employee {
    Employee {
        employee_code: code.into(),
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
        email: email.into(),
        department_id: None,
        job_title: Some("Engineer".into()),
        hire_date: date(2026, 2, 2),
        status: EmploymentStatus::Active,
        middle_name: None,
        pronouns: None,
    }
}

async fn open(name: &str) -> (ConnectionManager, Database) {
    let manager = ConnectionManager::new(DatabaseConfig::in_memory(name), app_migrations().unwrap());
    let db = manager.get_db().await.unwrap();
    (manager, db)
}

#[tokio::test]
async fn fresh_store_has_every_collection() {
    let (_manager, db) = open("hr-fresh").await;
    assert_eq!(db.version(), SCHEMA_VERSION);

    let schema = db.schema().await.unwrap();
    assert_eq!(schema.collections.len(), 10);
    let employees = schema.collection("employees").unwrap();
    assert!(employees.fields.contains("pronouns"));
    assert_eq!(employees.indexes.len(), 3);
    assert!(schema.collection("departments").unwrap().fields.contains("costCenter"));
}

#[tokio::test]
async fn stepwise_upgrade_matches_fresh_install() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig::file(dir.path(), "hr");
    {
        let v1 = Migrations::new(schema::steps().into_iter().take(1).collect()).unwrap();
        let manager = ConnectionManager::new(config.clone(), v1);
        let db = manager.get_db().await.unwrap();
        create_record(&Employee::collection(&db).unwrap(), employee("E-1", "g@hr.io"))
            .await
            .unwrap();
    }
    let upgraded = ConnectionManager::new(config, app_migrations().unwrap())
        .get_db()
        .await
        .unwrap();
    let (_manager, fresh) = open("hr-stepwise").await;

    assert_eq!(upgraded.schema().await.unwrap(), fresh.schema().await.unwrap());
    let employees = Employee::collection(&upgraded).unwrap().get_all().await.unwrap();
    assert_eq!(employees.len(), 1);
    assert_eq!(employees[0].pronouns, None);
}

#[tokio::test]
async fn validators_run_before_writes() {
    let (_manager, db) = open("hr-validate").await;
    let employees = Employee::collection(&db).unwrap();

    let err = create_record(&employees, employee("E-1", "not-an-email"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Validation);
    assert_eq!(db.count_records("employees").await.unwrap(), 0);

    let err = create_records(
        &employees,
        vec![employee("E-1", "a@hr.io"), employee("", "b@hr.io")],
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Validation);
    assert_eq!(db.count_records("employees").await.unwrap(), 0);
}

#[tokio::test]
async fn unique_employee_email() {
    let (_manager, db) = open("hr-unique").await;
    let employees = Employee::collection(&db).unwrap();
    create_record(&employees, employee("E-1", "g@hr.io")).await.unwrap();

    let err = create_record(&employees, employee("E-2", "g@hr.io"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicateRecord);
}

#[tokio::test]
async fn employee_patch_updates_in_place() {
    let (_manager, db) = open("hr-patch").await;
    let departments = Department::collection(&db).unwrap();
    let employees = Employee::collection(&db).unwrap();
    let ops = create_record(
        &departments,
        Department {
            name: "Operations".into(),
            code: "OPS".into(),
            manager_id: None,
            cost_center: Some("CC-100".into()),
        },
    )
    .await
    .unwrap();
    let grace = create_record(&employees, employee("E-1", "g@hr.io")).await.unwrap();

    let moved = update_record(
        &employees,
        grace.id,
        &EmployeePatch {
            department_id: Some(ops.id),
            pronouns: Some("she/her".into()),
            ..EmployeePatch::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(moved.department_id, Some(ops.id));
    assert_eq!(moved.email, "g@hr.io");

    let in_ops = employees.get_by_index("byDepartment", &ops.id).await.unwrap();
    assert_eq!(in_ops.len(), 1);

    let err = update_record(
        &employees,
        grace.id,
        &EmployeePatch {
            email: Some("nope".into()),
            ..EmployeePatch::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Validation);

    let err = update_record(&employees, 999, &EmployeePatch::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::RecordNotFound);
}

#[tokio::test]
async fn leave_workflow_by_status() {
    let (_manager, db) = open("hr-leave").await;
    let leave = LeaveRequest::collection(&db).unwrap();
    let request = |employee_id| LeaveRequest {
        employee_id,
        kind: LeaveKind::Annual,
        start_date: date(2026, 8, 3),
        end_date: date(2026, 8, 7),
        status: LeaveStatus::Pending,
        reason: None,
    };
    let stored = create_records(&leave, vec![request(1), request(2)]).await.unwrap();

    update_record(
        &leave,
        stored[0].id,
        &LeaveRequestPatch {
            status: Some(LeaveStatus::Approved),
            ..LeaveRequestPatch::default()
        },
    )
    .await
    .unwrap();

    let approved = leave.get_by_index("byStatus", &LeaveStatus::Approved).await.unwrap();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].employee_id, 1);
    let pending = leave.get_by_index("byStatus", &LeaveStatus::Pending).await.unwrap();
    assert_eq!(pending.len(), 1);

    // moving the end before the stored start is caught on the merged record
    let err = update_record(
        &leave,
        stored[1].id,
        &LeaveRequestPatch {
            end_date: Some(date(2026, 7, 1)),
            ..LeaveRequestPatch::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Validation);
}

#[tokio::test]
async fn audit_entries_are_indexed_by_collection() {
    let (_manager, db) = open("hr-audit").await;
    let log = AuditEntry::collection(&db).unwrap();

    AuditEntry::on::<Employee>("admin", "create", 1)
        .append(&log)
        .await
        .unwrap();
    AuditEntry::on::<LeaveRequest>("manager", "approve", 4)
        .with_detail(serde_json::json!({"days": 5}))
        .append(&log)
        .await
        .unwrap();

    let leave_events = log.get_by_index("byCollection", &"leave_requests").await.unwrap();
    assert_eq!(leave_events.len(), 1);
    assert_eq!(leave_events[0].detail, Some(serde_json::json!({"days": 5})));
}
