//! # peopledesk-core
//!
//! Foundation utilities shared by the PeopleDesk crates.
//!
//! - **Logging**: [`logging::init_subscriber`] installs the process-wide
//!   `tracing` subscriber; [`logging::capture_logs`] captures events in tests.

#![deny(unsafe_code)]

pub mod logging;

pub use logging::{CapturedEvent, CapturedLogs, capture_logs, init_json_subscriber, init_subscriber};
