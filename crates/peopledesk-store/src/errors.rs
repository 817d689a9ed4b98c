//! Error taxonomy for the persistence layer.
//!
//! [`StoreError`] is the only error type that crosses the store boundary.
//! `rusqlite`, `r2d2` and `serde_json` failures are always wrapped into the
//! narrowest applicable variant, with the original error kept as the
//! [`std::error::Error::source`] for diagnostics.

use std::fmt;

use rusqlite::ErrorCode as SqliteCode;
use thiserror::Error;

use crate::record::RecordId;

/// Boxed underlying cause carried by infrastructure variants.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Machine-readable failure code, one per [`StoreError`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// An operation targeted an id that does not exist.
    RecordNotFound,
    /// Caller-supplied data failed a domain or shape rule.
    Validation,
    /// Observed schema version differs from the expected one.
    VersionMismatch,
    /// A unique index was violated.
    DuplicateRecord,
    /// Infrastructure failure during a read/write transaction.
    Transaction,
    /// The store could not be opened, closed or deleted.
    Connection,
    /// A migration step failed.
    Upgrade,
    /// A structural constraint (catalog, index) was violated.
    Constraint,
}

impl ErrorCode {
    /// Stable string form, e.g. `RECORD_NOT_FOUND`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::Validation => "VALIDATION_ERROR",
            Self::VersionMismatch => "VERSION_MISMATCH",
            Self::DuplicateRecord => "DUPLICATE_RECORD",
            Self::Transaction => "TRANSACTION_ERROR",
            Self::Connection => "CONNECTION_ERROR",
            Self::Upgrade => "UPGRADE_ERROR",
            Self::Constraint => "CONSTRAINT_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by every store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The targeted record does not exist.
    #[error("record {id} not found in '{collection}'")]
    RecordNotFound {
        /// Collection that was searched.
        collection: String,
        /// Missing identifier.
        id: RecordId,
    },

    /// Caller-supplied data failed a rule.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Collection the data was destined for, when known.
        collection: Option<String>,
        /// Offending field (or `record` for whole-document problems).
        field: String,
        /// Human-readable reason.
        message: String,
    },

    /// The stored schema version is not the one this build expects.
    #[error("schema version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version this build targets.
        expected: u32,
        /// Version found in the store.
        found: u32,
    },

    /// A unique index rejected a write.
    #[error("duplicate value for unique index '{index}' in '{collection}'")]
    DuplicateRecord {
        /// Collection written to.
        collection: String,
        /// Name of the violated index.
        index: String,
        /// Underlying `SQLite` error.
        #[source]
        source: Option<Cause>,
    },

    /// Infrastructure failure inside a read/write transaction.
    #[error("{operation} failed on '{}': {source}", .collection.as_deref().unwrap_or("<database>"))]
    Transaction {
        /// Collection involved, `None` for database-wide operations.
        collection: Option<String>,
        /// Operation name (`create`, `batch_delete`, ...).
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Cause,
    },

    /// Opening, closing or deleting the store failed.
    #[error("connection error: {message}")]
    Connection {
        /// What went wrong.
        message: String,
        /// Underlying failure, if any.
        #[source]
        source: Option<Cause>,
    },

    /// A migration step failed; the store stays at its prior version.
    #[error("upgrade to v{version} failed: {message}")]
    Upgrade {
        /// Version of the failing step.
        version: u32,
        /// What went wrong.
        message: String,
        /// Underlying failure, if any.
        #[source]
        source: Option<Cause>,
    },

    /// A structural constraint was violated.
    #[error("constraint violated: {message}")]
    Constraint {
        /// Collection involved, when known.
        collection: Option<String>,
        /// What went wrong.
        message: String,
        /// Underlying failure, if any.
        #[source]
        source: Option<Cause>,
    },
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Machine-readable code of this failure.
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::RecordNotFound { .. } => ErrorCode::RecordNotFound,
            Self::Validation { .. } => ErrorCode::Validation,
            Self::VersionMismatch { .. } => ErrorCode::VersionMismatch,
            Self::DuplicateRecord { .. } => ErrorCode::DuplicateRecord,
            Self::Transaction { .. } => ErrorCode::Transaction,
            Self::Connection { .. } => ErrorCode::Connection,
            Self::Upgrade { .. } => ErrorCode::Upgrade,
            Self::Constraint { .. } => ErrorCode::Constraint,
        }
    }

    /// Collection the failure relates to, if any.
    pub fn collection(&self) -> Option<&str> {
        match self {
            Self::RecordNotFound { collection, .. } | Self::DuplicateRecord { collection, .. } => {
                Some(collection)
            }
            Self::Validation { collection, .. }
            | Self::Transaction { collection, .. }
            | Self::Constraint { collection, .. } => collection.as_deref(),
            Self::VersionMismatch { .. } | Self::Connection { .. } | Self::Upgrade { .. } => None,
        }
    }

    /// Whether the application cannot continue (partial schema states are
    /// not supported).
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Upgrade { .. })
    }

    /// Shorthand for a [`StoreError::Connection`].
    pub fn connection(message: impl Into<String>, source: Option<Cause>) -> Self {
        Self::Connection {
            message: message.into(),
            source,
        }
    }

    /// Shorthand for a [`StoreError::Constraint`].
    pub fn constraint(collection: Option<&str>, message: impl Into<String>) -> Self {
        Self::Constraint {
            collection: collection.map(str::to_owned),
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`StoreError::Validation`].
    pub fn validation(
        collection: Option<&str>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            collection: collection.map(str::to_owned),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wrap an arbitrary infrastructure failure as a transaction error.
    pub fn transaction(
        collection: Option<&str>,
        operation: &'static str,
        source: impl Into<Cause>,
    ) -> Self {
        Self::Transaction {
            collection: collection.map(str::to_owned),
            operation,
            source: source.into(),
        }
    }

    /// Classify a `SQLite` failure into the narrowest variant.
    ///
    /// Unique/primary-key violations become [`StoreError::DuplicateRecord`],
    /// other constraint violations [`StoreError::Constraint`], everything
    /// else [`StoreError::Transaction`].
    pub fn from_sqlite(collection: &str, operation: &'static str, err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ffi_err, message) = &err {
            if ffi_err.code == SqliteCode::ConstraintViolation {
                let unique = ffi_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || ffi_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY;
                if unique {
                    let index = message
                        .as_deref()
                        .map_or_else(|| "unknown".to_string(), |m| violated_index(collection, m));
                    return Self::DuplicateRecord {
                        collection: collection.to_string(),
                        index,
                        source: Some(Box::new(err)),
                    };
                }
                return Self::Constraint {
                    collection: Some(collection.to_string()),
                    message: format!("{operation} violated a constraint"),
                    source: Some(Box::new(err)),
                };
            }
        }
        Self::transaction(Some(collection), operation, err)
    }
}

/// Extract the logical index name from a `SQLite` unique-violation message.
///
/// Expression indexes report `UNIQUE constraint failed: index 'idx:<c>:<name>'`.
fn violated_index(collection: &str, message: &str) -> String {
    let Some(start) = message.find("index '") else {
        return message
            .rsplit_once('.')
            .map_or_else(|| "unknown".to_string(), |(_, col)| col.to_string());
    };
    let quoted = &message[start + "index '".len()..];
    let physical = quoted.split('\'').next().unwrap_or(quoted);
    let prefix = format!("idx:{collection}:");
    physical
        .strip_prefix(&prefix)
        .unwrap_or(physical)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_violation() -> rusqlite::Error {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE employees (id INTEGER PRIMARY KEY, data TEXT NOT NULL);
             CREATE UNIQUE INDEX \"idx:employees:email\" ON employees(json_extract(data, '$.email'));
             INSERT INTO employees (data) VALUES ('{\"email\":\"a@x.io\"}');",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO employees (data) VALUES ('{\"email\":\"a@x.io\"}')",
            [],
        )
        .unwrap_err()
    }

    #[test]
    fn codes_are_stable() {
        let err = StoreError::RecordNotFound {
            collection: "emp".into(),
            id: 7,
        };
        assert_eq!(err.code(), ErrorCode::RecordNotFound);
        assert_eq!(err.code().as_str(), "RECORD_NOT_FOUND");
        assert_eq!(err.collection(), Some("emp"));
        assert_eq!(err.to_string(), "record 7 not found in 'emp'");
    }

    #[test]
    fn transaction_display_includes_cause() {
        let err = StoreError::transaction(None, "clear_all_data", "disk I/O error");
        assert_eq!(
            err.to_string(),
            "clear_all_data failed on '<database>': disk I/O error"
        );
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.collection(), None);
    }

    #[test]
    fn only_upgrade_is_fatal() {
        let upgrade = StoreError::Upgrade {
            version: 4,
            message: "index on missing collection".into(),
            source: None,
        };
        assert!(upgrade.is_fatal());
        assert!(!StoreError::connection("closed", None).is_fatal());
        assert_eq!(upgrade.to_string(), "upgrade to v4 failed: index on missing collection");
    }

    #[test]
    fn unique_violation_becomes_duplicate_record() {
        let err = StoreError::from_sqlite("employees", "create", unique_violation());
        match err {
            StoreError::DuplicateRecord {
                collection, index, ..
            } => {
                assert_eq!(collection, "employees");
                assert_eq!(index, "email");
            }
            other => panic!("expected DuplicateRecord, got {other:?}"),
        }
    }

    #[test]
    fn other_sqlite_errors_become_transaction() {
        let err = StoreError::from_sqlite(
            "employees",
            "get_by_id",
            rusqlite::Error::QueryReturnedNoRows,
        );
        assert_eq!(err.code(), ErrorCode::Transaction);
        assert_eq!(err.collection(), Some("employees"));
    }

    #[test]
    fn not_null_violation_becomes_constraint() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT NOT NULL);")
            .unwrap();
        let raw = conn
            .execute("INSERT INTO t (v) VALUES (NULL)", [])
            .unwrap_err();
        let err = StoreError::from_sqlite("t", "create", raw);
        assert_eq!(err.code(), ErrorCode::Constraint);
    }

    #[test]
    fn violated_index_handles_column_form() {
        assert_eq!(
            violated_index("employees", "UNIQUE constraint failed: employees.code"),
            "code"
        );
        assert_eq!(
            violated_index("employees", "UNIQUE constraint failed: index 'idx:employees:email'"),
            "email"
        );
    }
}
