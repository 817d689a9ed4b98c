//! Schema catalog: collections, secondary indexes and declared fields.
//!
//! Collections are tables with a fixed physical layout; the catalog tables
//! (`_collections`, `_indexes`, `_fields`) record the logical schema so it
//! can be queried and compared independently of how many migration steps
//! produced it. Every operation here is idempotent.

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::errors::{Result, StoreError};
use crate::record::RESERVED_FIELDS;

/// DDL for the catalog tables.
pub const CATALOG_DDL: &str = "
CREATE TABLE IF NOT EXISTS _collections (
    name TEXT PRIMARY KEY NOT NULL
);
CREATE TABLE IF NOT EXISTS _indexes (
    collection TEXT NOT NULL,
    name       TEXT NOT NULL,
    key_path   TEXT NOT NULL,
    is_unique  INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (collection, name)
);
CREATE TABLE IF NOT EXISTS _fields (
    collection TEXT NOT NULL,
    field      TEXT NOT NULL,
    PRIMARY KEY (collection, field)
);
CREATE TABLE IF NOT EXISTS _schema_history (
    version     INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at  TEXT NOT NULL
);";

/// A secondary index over one record field.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDef {
    /// Index name used by `get_by_index`.
    pub name: String,
    /// Dotted path of the indexed field (`email`, `address.city`, `createdAt`).
    pub key_path: String,
    /// Reject two records with the same key.
    pub unique: bool,
}

impl IndexDef {
    /// Non-unique index `name` over `key_path`.
    pub fn new(name: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            unique: false,
        }
    }

    /// Index named after the field it covers.
    pub fn on(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(field.clone(), field)
    }

    /// Mark the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// One declarative schema change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchemaOp {
    /// Create a collection keyed by an auto-incrementing id.
    CreateCollection {
        /// Collection name.
        name: String,
    },
    /// Add a secondary index to an existing collection.
    CreateIndex {
        /// Target collection.
        collection: String,
        /// Index definition.
        index: IndexDef,
    },
    /// Declare new optional record fields. Existing records are not
    /// rewritten; absent fields read as unset.
    AddFields {
        /// Target collection.
        collection: String,
        /// New field names.
        fields: Vec<String>,
    },
}

/// Logical schema of one collection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CollectionSchema {
    /// Secondary indexes, ordered by name.
    pub indexes: Vec<IndexDef>,
    /// Declared additive fields.
    pub fields: BTreeSet<String>,
}

/// Logical schema of the whole store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SchemaSnapshot {
    /// Collections by name.
    pub collections: BTreeMap<String, CollectionSchema>,
}

impl SchemaSnapshot {
    /// Schema of one collection, if it exists.
    pub fn collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.get(name)
    }
}

/// Create the catalog tables if missing.
pub fn ensure_catalog(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CATALOG_DDL)
}

/// Validate a collection, index or field name.
///
/// Names are interpolated into SQL, so only `[A-Za-z][A-Za-z0-9_]*` (at most
/// 64 chars) is accepted; `sqlite_` names are reserved by `SQLite`.
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !starts_alpha || !rest_ok || name.len() > 64 {
        return Err(StoreError::constraint(
            None,
            format!("invalid {kind} name '{name}'"),
        ));
    }
    if name.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(StoreError::constraint(
            None,
            format!("{kind} name '{name}' is reserved"),
        ));
    }
    Ok(())
}

fn validate_key_path(collection: &str, key_path: &str) -> Result<()> {
    if key_path.split('.').all(|seg| validate_identifier("key path", seg).is_ok()) {
        Ok(())
    } else {
        Err(StoreError::constraint(
            Some(collection),
            format!("invalid key path '{key_path}'"),
        ))
    }
}

/// SQL expression that yields the index key of a row.
pub fn key_expression(key_path: &str) -> String {
    match key_path {
        "id" => "id".to_string(),
        "createdAt" => "created_at".to_string(),
        "updatedAt" => "updated_at".to_string(),
        path => format!("json_extract(data, '$.{path}')"),
    }
}

/// Physical name of a secondary index. `:` never appears in an identifier,
/// so distinct (collection, index) pairs never share a name.
fn physical_index_name(collection: &str, index: &str) -> String {
    format!("idx:{collection}:{index}")
}

/// Apply one schema operation.
pub fn apply(conn: &Connection, op: &SchemaOp) -> Result<()> {
    match op {
        SchemaOp::CreateCollection { name } => create_collection(conn, name),
        SchemaOp::CreateIndex { collection, index } => create_index(conn, collection, index),
        SchemaOp::AddFields { collection, fields } => add_fields(conn, collection, fields),
    }
}

fn sql_err(collection: &str) -> impl Fn(rusqlite::Error) -> StoreError + '_ {
    move |e| StoreError::Constraint {
        collection: Some(collection.to_string()),
        message: "schema change rejected by the store".to_string(),
        source: Some(Box::new(e)),
    }
}

fn create_collection(conn: &Connection, name: &str) -> Result<()> {
    validate_identifier("collection", name)?;
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS \"{name}\" (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            data       TEXT NOT NULL CHECK (json_valid(data))
         );
         CREATE INDEX IF NOT EXISTS \"{name}:created\" ON \"{name}\"(created_at DESC, id DESC);"
    ))
    .map_err(sql_err(name))?;
    let _ = conn
        .execute(
            "INSERT OR IGNORE INTO _collections (name) VALUES (?1)",
            params![name],
        )
        .map_err(sql_err(name))?;
    Ok(())
}

fn create_index(conn: &Connection, collection: &str, index: &IndexDef) -> Result<()> {
    validate_identifier("collection", collection)?;
    validate_identifier("index", &index.name)?;
    validate_key_path(collection, &index.key_path)?;
    if !collection_exists(conn, collection).map_err(sql_err(collection))? {
        return Err(StoreError::constraint(
            Some(collection),
            format!(
                "cannot add index '{}' to missing collection '{collection}'",
                index.name
            ),
        ));
    }

    if let Some(existing) = find_index(conn, collection, &index.name).map_err(sql_err(collection))?
    {
        if existing == *index {
            return Ok(());
        }
        return Err(StoreError::constraint(
            Some(collection),
            format!(
                "index '{}' already exists with a different definition",
                index.name
            ),
        ));
    }

    let unique = if index.unique { "UNIQUE " } else { "" };
    conn.execute_batch(&format!(
        "CREATE {unique}INDEX \"{physical}\" ON \"{collection}\"({expr});",
        physical = physical_index_name(collection, &index.name),
        expr = key_expression(&index.key_path),
    ))
    .map_err(sql_err(collection))?;
    let _ = conn
        .execute(
            "INSERT INTO _indexes (collection, name, key_path, is_unique) VALUES (?1, ?2, ?3, ?4)",
            params![collection, index.name, index.key_path, index.unique],
        )
        .map_err(sql_err(collection))?;
    Ok(())
}

fn add_fields(conn: &Connection, collection: &str, fields: &[String]) -> Result<()> {
    if !collection_exists(conn, collection).map_err(sql_err(collection))? {
        return Err(StoreError::constraint(
            Some(collection),
            format!("cannot add fields to missing collection '{collection}'"),
        ));
    }
    for field in fields {
        validate_identifier("field", field)?;
        if RESERVED_FIELDS.contains(&field.as_str()) {
            return Err(StoreError::constraint(
                Some(collection),
                format!("field '{field}' is owned by the persistence layer"),
            ));
        }
        let _ = conn
            .execute(
                "INSERT OR IGNORE INTO _fields (collection, field) VALUES (?1, ?2)",
                params![collection, field],
            )
            .map_err(sql_err(collection))?;
    }
    Ok(())
}

/// Whether `name` is a catalogued collection.
pub fn collection_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM _collections WHERE name = ?1)",
        params![name],
        |row| row.get(0),
    )
}

/// Look up an index definition by logical name.
pub fn find_index(
    conn: &Connection,
    collection: &str,
    name: &str,
) -> rusqlite::Result<Option<IndexDef>> {
    conn.query_row(
        "SELECT name, key_path, is_unique FROM _indexes WHERE collection = ?1 AND name = ?2",
        params![collection, name],
        |row| {
            Ok(IndexDef {
                name: row.get(0)?,
                key_path: row.get(1)?,
                unique: row.get(2)?,
            })
        },
    )
    .optional()
}

/// All catalogued collection names, sorted.
pub fn list_collections(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM _collections ORDER BY name")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

/// Read the full logical schema.
pub fn snapshot(conn: &Connection) -> rusqlite::Result<SchemaSnapshot> {
    let mut collections: BTreeMap<String, CollectionSchema> = list_collections(conn)?
        .into_iter()
        .map(|name| (name, CollectionSchema::default()))
        .collect();

    let mut stmt = conn.prepare(
        "SELECT collection, name, key_path, is_unique FROM _indexes ORDER BY collection, name",
    )?;
    let indexes = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            IndexDef {
                name: row.get(1)?,
                key_path: row.get(2)?,
                unique: row.get(3)?,
            },
        ))
    })?;
    for entry in indexes {
        let (collection, index) = entry?;
        collections.entry(collection).or_default().indexes.push(index);
    }

    let mut stmt = conn.prepare("SELECT collection, field FROM _fields")?;
    let fields = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for entry in fields {
        let (collection, field) = entry?;
        let _ = collections.entry(collection).or_default().fields.insert(field);
    }

    Ok(SchemaSnapshot { collections })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        ensure_catalog(&conn).unwrap();
        conn
    }

    fn create(conn: &Connection, name: &str) {
        apply(conn, &SchemaOp::CreateCollection { name: name.into() }).unwrap();
    }

    #[test]
    fn identifiers() {
        assert!(validate_identifier("collection", "employees").is_ok());
        assert!(validate_identifier("collection", "payroll_v2").is_ok());
        assert!(validate_identifier("collection", "").is_err());
        assert!(validate_identifier("collection", "_collections").is_err());
        assert!(validate_identifier("collection", "2fa").is_err());
        assert!(validate_identifier("collection", "emp\"; DROP").is_err());
        assert!(validate_identifier("collection", "sqlite_master").is_err());
    }

    #[test]
    fn create_collection_is_idempotent() {
        let conn = open();
        create(&conn, "employees");
        create(&conn, "employees");
        assert_eq!(list_collections(&conn).unwrap(), vec!["employees"]);
    }

    #[test]
    fn index_on_missing_collection_is_rejected() {
        let conn = open();
        let err = apply(
            &conn,
            &SchemaOp::CreateIndex {
                collection: "ghosts".into(),
                index: IndexDef::on("name"),
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), crate::errors::ErrorCode::Constraint);
    }

    #[test]
    fn index_redefinition_is_rejected_but_repeat_is_fine() {
        let conn = open();
        create(&conn, "employees");
        let op = SchemaOp::CreateIndex {
            collection: "employees".into(),
            index: IndexDef::on("email").unique(),
        };
        apply(&conn, &op).unwrap();
        apply(&conn, &op).unwrap();

        let changed = SchemaOp::CreateIndex {
            collection: "employees".into(),
            index: IndexDef::new("email", "contact.email"),
        };
        assert!(apply(&conn, &changed).is_err());
    }

    #[test]
    fn underscored_names_get_distinct_physical_indexes() {
        let conn = open();
        create(&conn, "pay_run");
        create(&conn, "pay");
        for (collection, index) in [
            ("pay_run", IndexDef::on("code")),
            ("pay", IndexDef::new("run_code", "code").unique()),
        ] {
            apply(
                &conn,
                &SchemaOp::CreateIndex {
                    collection: collection.into(),
                    index,
                },
            )
            .unwrap();
        }

        let physical: Vec<(String, String)> = conn
            .prepare("SELECT name, tbl_name FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx:%' ORDER BY name")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(
            physical,
            vec![
                ("idx:pay:run_code".to_string(), "pay".to_string()),
                ("idx:pay_run:code".to_string(), "pay_run".to_string()),
            ]
        );

        conn.execute_batch(
            "INSERT INTO pay (created_at, updated_at, data) VALUES ('t', 't', '{\"code\":\"A\"}');",
        )
        .unwrap();
        assert!(
            conn.execute_batch(
                "INSERT INTO pay (created_at, updated_at, data) VALUES ('t', 't', '{\"code\":\"A\"}');",
            )
            .is_err()
        );
    }

    #[test]
    fn stray_physical_index_is_not_silently_reused() {
        let conn = open();
        create(&conn, "pay");
        conn.execute_batch("CREATE INDEX \"idx:pay:code\" ON pay(id);")
            .unwrap();
        let err = apply(
            &conn,
            &SchemaOp::CreateIndex {
                collection: "pay".into(),
                index: IndexDef::on("code").unique(),
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), crate::errors::ErrorCode::Constraint);
        assert!(find_index(&conn, "pay", "code").unwrap().is_none());
    }

    #[test]
    fn unique_index_over_duplicates_fails() {
        let conn = open();
        create(&conn, "employees");
        conn.execute_batch(
            "INSERT INTO employees (created_at, updated_at, data) VALUES ('t', 't', '{\"code\":\"E1\"}');
             INSERT INTO employees (created_at, updated_at, data) VALUES ('t', 't', '{\"code\":\"E1\"}');",
        )
        .unwrap();
        let err = apply(
            &conn,
            &SchemaOp::CreateIndex {
                collection: "employees".into(),
                index: IndexDef::on("code").unique(),
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), crate::errors::ErrorCode::Constraint);
    }

    #[test]
    fn reserved_fields_cannot_be_declared() {
        let conn = open();
        create(&conn, "employees");
        let err = apply(
            &conn,
            &SchemaOp::AddFields {
                collection: "employees".into(),
                fields: vec!["updatedAt".into()],
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("owned by the persistence layer"));
    }

    #[test]
    fn snapshot_collects_everything() {
        let conn = open();
        create(&conn, "employees");
        create(&conn, "contracts");
        apply(
            &conn,
            &SchemaOp::CreateIndex {
                collection: "contracts".into(),
                index: IndexDef::new("byEmployee", "employeeId"),
            },
        )
        .unwrap();
        apply(
            &conn,
            &SchemaOp::AddFields {
                collection: "employees".into(),
                fields: vec!["middleName".into(), "pronouns".into()],
            },
        )
        .unwrap();

        let snap = snapshot(&conn).unwrap();
        assert_eq!(snap.collections.len(), 2);
        let contracts = snap.collection("contracts").unwrap();
        assert_eq!(contracts.indexes, vec![IndexDef::new("byEmployee", "employeeId")]);
        let employees = snap.collection("employees").unwrap();
        assert!(employees.fields.contains("pronouns"));
        assert!(employees.indexes.is_empty());
    }

    #[test]
    fn key_expressions() {
        assert_eq!(key_expression("createdAt"), "created_at");
        assert_eq!(
            key_expression("address.city"),
            "json_extract(data, '$.address.city')"
        );
    }
}
