//! Connection lifecycle and typed record access.
//!
//! - **[`manager`]**: [`ConnectionManager`] owns the live handle, opens and
//!   migrates lazily, and tears down on reset or delete.
//! - **[`database`]**: the cloneable [`Database`] handle.
//! - **[`contention`]**: blocked/blocking signals between sessions.
//! - **[`collection`]**: the generic [`Collection<T>`] CRUD factory.
//! - **[`batch`]**: bulk inserts and deletes, counts and clears.

pub mod batch;
pub mod collection;
pub mod contention;
pub mod database;
pub mod manager;

pub use collection::Collection;
pub use contention::{ConnectionEvent, ContentionRegistry};
pub use database::Database;
pub use manager::{ConnectionManager, DatabaseConfig};
