//! Record repository: row-level SQL over one collection table.
//!
//! Collection names are validated identifiers (see
//! [`catalog::validate_identifier`](crate::sqlite::catalog::validate_identifier))
//! and are quoted when interpolated.

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::record::{RecordId, RecordRow};

/// Record repository, stateless.
pub struct RecordRepo;

impl RecordRepo {
    /// Insert a record and return its assigned id.
    pub fn insert(
        conn: &Connection,
        collection: &str,
        timestamp: &str,
        data: &str,
    ) -> rusqlite::Result<RecordId> {
        let _ = conn.execute(
            &format!(
                "INSERT INTO \"{collection}\" (created_at, updated_at, data) VALUES (?1, ?1, ?2)"
            ),
            params![timestamp, data],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Fetch one row.
    pub fn get(conn: &Connection, collection: &str, id: RecordId) -> rusqlite::Result<Option<RecordRow>> {
        conn.query_row(
            &format!(
                "SELECT id, created_at, updated_at, data FROM \"{collection}\" WHERE id = ?1"
            ),
            params![id],
            Self::map_row,
        )
        .optional()
    }

    /// Every row, newest first (ties broken by id, highest first).
    pub fn list_desc(conn: &Connection, collection: &str) -> rusqlite::Result<Vec<RecordRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT id, created_at, updated_at, data FROM \"{collection}\"
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map([], Self::map_row)?;
        rows.collect()
    }

    /// Rows whose key expression equals `key`, ascending id.
    ///
    /// Uses `IS` so a `NULL` key matches records where the field is unset.
    pub fn find_by_key(
        conn: &Connection,
        collection: &str,
        key_expression: &str,
        key: Value,
    ) -> rusqlite::Result<Vec<RecordRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT id, created_at, updated_at, data FROM \"{collection}\"
             WHERE {key_expression} IS ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![key], Self::map_row)?;
        rows.collect()
    }

    /// Overwrite a row's fields and modification time. Returns rows changed.
    pub fn update(
        conn: &Connection,
        collection: &str,
        id: RecordId,
        updated_at: &str,
        data: &str,
    ) -> rusqlite::Result<usize> {
        conn.execute(
            &format!("UPDATE \"{collection}\" SET updated_at = ?1, data = ?2 WHERE id = ?3"),
            params![updated_at, data, id],
        )
    }

    /// Delete a row. Returns rows removed (0 or 1).
    pub fn delete(conn: &Connection, collection: &str, id: RecordId) -> rusqlite::Result<usize> {
        conn.execute(
            &format!("DELETE FROM \"{collection}\" WHERE id = ?1"),
            params![id],
        )
    }

    /// Whether a row exists.
    pub fn exists(conn: &Connection, collection: &str, id: RecordId) -> rusqlite::Result<bool> {
        conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM \"{collection}\" WHERE id = ?1)"),
            params![id],
            |row| row.get(0),
        )
    }

    /// Number of rows.
    pub fn count(conn: &Connection, collection: &str) -> rusqlite::Result<u64> {
        conn.query_row(&format!("SELECT COUNT(*) FROM \"{collection}\""), [], |row| {
            row.get(0)
        })
    }

    /// Remove every row. Returns rows removed.
    pub fn clear(conn: &Connection, collection: &str) -> rusqlite::Result<usize> {
        conn.execute(&format!("DELETE FROM \"{collection}\""), [])
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
        Ok(RecordRow {
            id: row.get(0)?,
            created_at: row.get(1)?,
            updated_at: row.get(2)?,
            data: row.get(3)?,
        })
    }
}
