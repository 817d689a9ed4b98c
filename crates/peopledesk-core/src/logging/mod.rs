//! Structured logging with `tracing`.
//!
//! Library crates only emit events; the binary picks the output format
//! once at startup. Tests that assert on warnings (contention signals,
//! destructive clears) use [`capture_logs`].

mod capture;

pub use capture::{CapturedEvent, CapturedLogs, capture_logs};

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` when set and valid, otherwise `level`.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global compact subscriber on stderr. Later calls are no-ops.
pub fn init_subscriber(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// Install the global subscriber emitting JSON lines on stderr.
pub fn init_json_subscriber(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(std::io::stderr)
        .json()
        .with_current_span(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_first_init_wins() {
        init_subscriber("warn");
        init_subscriber("debug");
        init_json_subscriber("info");
    }
}
