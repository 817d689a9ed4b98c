#![allow(missing_docs, unused_results)]

use peopledesk_store::{
    Collection, ConnectionManager, Database, DatabaseConfig, Migration, Migrations,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Emp {
    name: String,
    #[serde(default)]
    visits: u32,
}

fn emp(i: usize) -> Emp {
    Emp {
        name: format!("e{i}"),
        visits: 0,
    }
}

async fn open_file_store(dir: &tempfile::TempDir) -> (ConnectionManager, Database, Collection<Emp>) {
    let migrations =
        Migrations::new(vec![Migration::new(1, "employees").create_collection("emp")]).unwrap();
    let manager = ConnectionManager::new(DatabaseConfig::file(dir.path(), "hr"), migrations);
    let db = manager.get_db().await.unwrap();
    let emps = Collection::new(&db, "emp").unwrap();
    (manager, db, emps)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_and_updates_all_commit() {
    let dir = tempfile::tempdir().unwrap();
    let (_manager, db, emps) = open_file_store(&dir).await;

    let creates: Vec<_> = (0..200)
        .map(|i| {
            let emps = emps.clone();
            tokio::spawn(async move { emps.create(emp(i)).await })
        })
        .collect();
    for task in creates {
        task.await.unwrap().unwrap();
    }
    assert_eq!(db.count_records("emp").await.unwrap(), 200);

    let updates: Vec<_> = (1..=200_u32)
        .map(|i| {
            let emps = emps.clone();
            tokio::spawn(async move { emps.update(1, &json!({ "visits": i })).await })
        })
        .collect();
    for task in updates {
        task.await.unwrap().unwrap();
    }

    let first = emps.get_by_id(1).await.unwrap().unwrap();
    assert!(first.updated_at > first.created_at);
    assert!((1..=200).contains(&first.visits));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_batches_and_deletes_serialize() {
    let dir = tempfile::tempdir().unwrap();
    let (_manager, db, emps) = open_file_store(&dir).await;
    emps.batch_create((0..100).map(emp).collect()).await.unwrap();

    let mut tasks = Vec::new();
    for id in 1..=100 {
        let emps = emps.clone();
        tasks.push(tokio::spawn(async move { emps.delete(id).await.map(|()| 1) }));
    }
    for batch in 0..20 {
        let emps = emps.clone();
        tasks.push(tokio::spawn(async move {
            emps.batch_create((0..5).map(|i| emp(1_000 + batch * 5 + i)).collect())
                .await
                .map(|stored| stored.len())
        }));
    }
    let mut touched = 0;
    for task in tasks {
        touched += task.await.unwrap().unwrap();
    }

    assert_eq!(touched, 200);
    assert_eq!(db.count_records("emp").await.unwrap(), 100);
    assert!(emps.get_all().await.unwrap().iter().all(|e| e.id > 100));
}
