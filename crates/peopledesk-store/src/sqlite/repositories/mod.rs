//! Repository implementations for collection tables.
//!
//! Repositories are stateless: every method takes a `&Connection` and runs
//! SQL. Transactions, error classification and blocking-pool dispatch are
//! the caller's concern.

pub mod record;

pub use record::RecordRepo;
