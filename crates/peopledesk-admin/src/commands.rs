//! Command implementations. Output goes to the given writer so the
//! commands can be exercised without a terminal.

use std::io::Write;

use anyhow::{Context, Result, bail};
use peopledesk_store::{ConnectionEvent, ConnectionManager, StoreLocation};
use serde::Serialize;
use tracing::info;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    name: String,
    location: String,
    version: u32,
    target_version: u32,
    collections: Vec<CollectionCount>,
}

#[derive(Serialize)]
struct CollectionCount {
    name: String,
    records: u64,
}

fn describe(location: &StoreLocation) -> String {
    match location {
        StoreLocation::File(path) => path.display().to_string(),
        StoreLocation::Memory(name) => format!("memory:{name}"),
    }
}

fn emit<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Store identity, versions and per-collection record counts.
pub async fn status(manager: &ConnectionManager, json: bool, out: &mut impl Write) -> Result<()> {
    let db = manager.get_db().await.context("failed to open the store")?;
    let mut collections = Vec::new();
    for name in db.collections().await? {
        let records = db.count_records(&name).await?;
        collections.push(CollectionCount { name, records });
    }
    let status = Status {
        name: db.name().to_string(),
        location: describe(db.location()),
        version: db.version(),
        target_version: manager.target_version(),
        collections,
    };

    if json {
        return emit(out, &status);
    }
    writeln!(out, "store:    {} ({})", status.name, status.location)?;
    writeln!(out, "version:  {} (target {})", status.version, status.target_version)?;
    for c in &status.collections {
        writeln!(out, "  {:<24} {:>8}", c.name, c.records)?;
    }
    Ok(())
}

/// Open the store, applying any pending migrations.
pub async fn migrate(manager: &ConnectionManager, out: &mut impl Write) -> Result<()> {
    let mut events = manager.subscribe();
    let db = manager.get_db().await.context("failed to open the store")?;

    let mut upgraded = false;
    while let Ok(event) = events.try_recv() {
        if let ConnectionEvent::Upgraded { from, to } = event {
            writeln!(out, "migrated v{from} -> v{to}")?;
            upgraded = true;
        }
    }
    if !upgraded {
        writeln!(out, "already at v{}", db.version())?;
    }
    Ok(())
}

/// Collection names, one per line.
pub async fn collections(manager: &ConnectionManager, json: bool, out: &mut impl Write) -> Result<()> {
    let names = manager.get_db().await?.collections().await?;
    if json {
        return emit(out, &names);
    }
    for name in names {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

/// Record count of one collection.
pub async fn count(manager: &ConnectionManager, collection: &str, out: &mut impl Write) -> Result<()> {
    let records = manager.get_db().await?.count_records(collection).await?;
    writeln!(out, "{records}")?;
    Ok(())
}

/// Remove every record of one collection.
pub async fn clear(manager: &ConnectionManager, collection: &str, out: &mut impl Write) -> Result<()> {
    let removed = manager.get_db().await?.clear_store(collection).await?;
    writeln!(out, "removed {removed} record(s) from {collection}")?;
    Ok(())
}

/// Remove every record of every collection.
pub async fn clear_all(manager: &ConnectionManager, confirmed: bool, out: &mut impl Write) -> Result<()> {
    if !confirmed {
        bail!("clear-all removes every record in the store; pass --yes to confirm");
    }
    let removed = manager.get_db().await?.clear_all_data().await?;
    writeln!(out, "removed {removed} record(s)")?;
    Ok(())
}

/// Delete the store and recreate it empty at the current schema.
pub async fn reset(manager: &ConnectionManager, confirmed: bool, out: &mut impl Write) -> Result<()> {
    if !confirmed {
        bail!("reset deletes the store and all its data; pass --yes to confirm");
    }
    let db = manager
        .delete_and_recreate_db()
        .await
        .context("failed to recreate the store")?;
    info!(name = db.name(), version = db.version(), "store reset");
    writeln!(out, "recreated {} at v{}", db.name(), db.version())?;
    Ok(())
}

/// Applied migration steps.
pub async fn history(manager: &ConnectionManager, json: bool, out: &mut impl Write) -> Result<()> {
    let steps = manager.get_db().await?.history().await?;
    if json {
        return emit(out, &steps);
    }
    for step in steps {
        writeln!(out, "v{:<4} {}  {}", step.version, step.applied_at, step.description)?;
    }
    Ok(())
}

/// Collections with their indexes and declared fields.
pub async fn schema(manager: &ConnectionManager, out: &mut impl Write) -> Result<()> {
    let snapshot = manager.get_db().await?.schema().await?;
    emit(out, &snapshot)
}
