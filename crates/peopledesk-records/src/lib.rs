//! # peopledesk-records
//!
//! The HR application's record shapes on top of `peopledesk-store`.
//!
//! - **[`entities`]**: one struct per collection plus patch types for the
//!   records that are edited in place.
//! - **[`record`]**: the [`Record`] trait binding a shape to its collection,
//!   and validated create/update helpers.
//! - **[`validate`]**: field checks that raise `ValidationError`.
//! - **[`schema`]**: the ordered migration table for every collection.

#![deny(unsafe_code)]

pub mod entities;
pub mod record;
pub mod schema;
pub mod validate;

pub use entities::*;
pub use record::{Record, Validate, create_record, create_records, update_record};
pub use schema::{SCHEMA_VERSION, app_migrations};
