//! # peopledesk-store
//!
//! Versioned embedded object store for the PeopleDesk HR application.
//!
//! - **Connection manager**: [`ConnectionManager`] owns a single live
//!   [`Database`] handle, opens lazily, migrates on open and surfaces
//!   contention with other sessions as [`ConnectionEvent`]s.
//! - **Migrations**: an ordered, append-only table of [`Migration`] steps
//!   applied in one exclusive transaction.
//! - **Collections**: [`Collection<T>`] gives any serde record shape create,
//!   read, update, delete, index lookup and batch operations.
//! - **Errors**: every failure crossing the crate boundary is a
//!   [`StoreError`] with a stable [`ErrorCode`].

#![deny(unsafe_code)]

pub mod errors;
pub mod record;
pub mod sqlite;
pub mod store;

pub use errors::{ErrorCode, Result, StoreError};
pub use record::{RESERVED_FIELDS, RecordId, Stored};
pub use sqlite::{
    AppliedMigration, CollectionSchema, ConnectionConfig, IndexDef, Migration, Migrations,
    SchemaOp, SchemaSnapshot, StoreLocation, UpgradeReport,
};
pub use store::{
    Collection, ConnectionEvent, ConnectionManager, ContentionRegistry, Database, DatabaseConfig,
};
