//! `SQLite` backend for the store.
//!
//! - **[`connection`]**: `r2d2` pool with WAL mode, busy timeout and foreign
//!   keys applied to every connection.
//! - **[`catalog`]**: collections, secondary indexes and declared fields.
//! - **[`migrations`]**: versioned schema evolution over one exclusive
//!   transaction.
//! - **[`repositories`]**: stateless row-level SQL over collection tables.

pub mod catalog;
pub mod connection;
pub mod migrations;
pub mod repositories;

pub use catalog::{CollectionSchema, IndexDef, SchemaOp, SchemaSnapshot};
pub use connection::{ConnectionConfig, ConnectionPool, PooledConnection, StoreLocation};
pub use migrations::{AppliedMigration, Migration, Migrations, UpgradeReport};
