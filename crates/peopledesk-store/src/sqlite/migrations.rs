//! Versioned schema migration engine.
//!
//! The application supplies an ordered, append-only table of [`Migration`]
//! steps. Opening a store whose recorded version is behind the target folds
//! every pending step over one exclusive transaction: either all steps land
//! and `PRAGMA user_version` moves to the target, or nothing changes.
//!
//! The applied-step log lives in `_schema_history`; the version itself is
//! the one `SQLite` records in the file header.

use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{Result, StoreError};
use crate::record::{format_timestamp, now};
use crate::sqlite::catalog::{self, IndexDef, SchemaOp};

/// One schema step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Migration {
    /// Version this step upgrades to.
    pub version: u32,
    /// Human-readable summary.
    pub description: String,
    /// Declarative schema operations, applied in order.
    pub ops: Vec<SchemaOp>,
}

impl Migration {
    /// Empty step for `version`.
    pub fn new(version: u32, description: impl Into<String>) -> Self {
        Self {
            version,
            description: description.into(),
            ops: Vec::new(),
        }
    }

    /// Add a collection.
    #[must_use]
    pub fn create_collection(mut self, name: impl Into<String>) -> Self {
        self.ops.push(SchemaOp::CreateCollection { name: name.into() });
        self
    }

    /// Add a secondary index.
    #[must_use]
    pub fn create_index(mut self, collection: impl Into<String>, index: IndexDef) -> Self {
        self.ops.push(SchemaOp::CreateIndex {
            collection: collection.into(),
            index,
        });
        self
    }

    /// Declare additive fields.
    #[must_use]
    pub fn add_fields<I, S>(mut self, collection: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ops.push(SchemaOp::AddFields {
            collection: collection.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        });
        self
    }
}

/// Validated, ordered migration table.
#[derive(Clone, Debug, Default)]
pub struct Migrations {
    steps: Vec<Migration>,
}

impl Migrations {
    /// Validate `steps`: versions start at 1 and strictly ascend.
    pub fn new(steps: Vec<Migration>) -> Result<Self> {
        let mut previous = 0;
        for step in &steps {
            if step.version == 0 {
                return Err(StoreError::constraint(
                    None,
                    "migration versions start at 1",
                ));
            }
            if step.version <= previous {
                return Err(StoreError::constraint(
                    None,
                    format!(
                        "migration v{} listed after v{previous}; versions must strictly ascend",
                        step.version
                    ),
                ));
            }
            previous = step.version;
        }
        Ok(Self { steps })
    }

    /// Highest version defined, or 0 for an empty table.
    pub fn latest_version(&self) -> u32 {
        self.steps.last().map_or(0, |m| m.version)
    }

    /// All steps in version order.
    pub fn steps(&self) -> &[Migration] {
        &self.steps
    }

    /// Steps needed to move from `stored` to `target`.
    ///
    /// Empty when already current. A store newer than `target` is a
    /// [`StoreError::VersionMismatch`]; there are no downgrades.
    pub fn plan(&self, stored: u32, target: u32) -> Result<Vec<&Migration>> {
        self.check_target(target)?;
        if stored > target {
            return Err(StoreError::VersionMismatch {
                expected: target,
                found: stored,
            });
        }
        if stored == target {
            return Ok(Vec::new());
        }
        Ok(self
            .steps
            .iter()
            .filter(|m| m.version > stored && m.version <= target)
            .collect())
    }

    /// Reject a target no step reaches.
    pub fn check_target(&self, target: u32) -> Result<()> {
        let latest = self.latest_version();
        if target > latest {
            return Err(StoreError::constraint(
                None,
                format!("target version {target} is above the newest migration (v{latest})"),
            ));
        }
        Ok(())
    }

    /// Apply every pending step on `conn`.
    ///
    /// `conn` must already be inside an exclusive transaction; the caller
    /// commits on success and rolls back on error, so a failed step leaves
    /// the store at `stored`.
    pub fn upgrade(&self, conn: &Connection, stored: u32, target: u32) -> Result<UpgradeReport> {
        let plan = self.plan(stored, target)?;
        catalog::ensure_catalog(conn).map_err(|e| StoreError::Upgrade {
            version: target,
            message: "failed to create catalog tables".to_string(),
            source: Some(Box::new(e)),
        })?;

        for skipped in self.steps.iter().filter(|m| m.version <= stored) {
            debug!(
                version = skipped.version,
                description = %skipped.description,
                "migration already applied, skipping"
            );
        }

        let applied = plan.into_iter().try_fold(Vec::new(), |mut applied, step| {
            info!(
                version = step.version,
                description = %step.description,
                "applying migration"
            );
            apply_step(conn, step)?;
            applied.push(step.version);
            Ok::<_, StoreError>(applied)
        })?;

        conn.pragma_update(None, "user_version", target)
            .map_err(|e| StoreError::Upgrade {
                version: target,
                message: "failed to record schema version".to_string(),
                source: Some(Box::new(e)),
            })?;

        if !applied.is_empty() {
            info!(from = stored, to = target, applied = applied.len(), "migrations complete");
        }

        Ok(UpgradeReport {
            from: stored,
            to: target,
            applied,
        })
    }
}

fn apply_step(conn: &Connection, step: &Migration) -> Result<()> {
    for op in &step.ops {
        catalog::apply(conn, op).map_err(|e| StoreError::Upgrade {
            version: step.version,
            message: format!("migration v{} ({}) failed", step.version, step.description),
            source: Some(Box::new(e)),
        })?;
    }
    let _ = conn
        .execute(
            "INSERT OR REPLACE INTO _schema_history (version, description, applied_at)
             VALUES (?1, ?2, ?3)",
            params![step.version, step.description, format_timestamp(now())],
        )
        .map_err(|e| StoreError::Upgrade {
            version: step.version,
            message: format!("failed to record v{} in the schema history", step.version),
            source: Some(Box::new(e)),
        })?;
    Ok(())
}

/// Outcome of [`Migrations::upgrade`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpgradeReport {
    /// Version before the upgrade.
    pub from: u32,
    /// Version after the upgrade.
    pub to: u32,
    /// Versions of the steps that ran.
    pub applied: Vec<u32>,
}

/// A row of the applied-step log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMigration {
    /// Step version.
    pub version: u32,
    /// Step description.
    pub description: String,
    /// RFC 3339 time the step was applied.
    pub applied_at: String,
}

/// Version recorded in the store (`PRAGMA user_version`); 0 for a new store.
pub fn current_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

/// Applied steps, oldest first.
pub fn history(conn: &Connection) -> rusqlite::Result<Vec<AppliedMigration>> {
    catalog::ensure_catalog(conn)?;
    let mut stmt = conn.prepare(
        "SELECT version, description, applied_at FROM _schema_history ORDER BY version",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(AppliedMigration {
            version: row.get(0)?,
            description: row.get(1)?,
            applied_at: row.get(2)?,
        })
    })?;
    rows.collect()
}
