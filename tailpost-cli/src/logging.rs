//! Logging initialization for the tailpost binary.
//!
//! Process logs go to a single local log file so they never mix with the
//! counter output on stdout. When the log file cannot be opened, logs fall
//! back to stderr.

use std::fs::OpenOptions;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Default process log file path.
pub const LOG_FILE_PATH: &str = "./tailpost.log";

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
/// `level` is one of debug, info, warn; unknown values fall back to info.
/// `RUST_LOG` takes precedence when set.
pub fn init_logging(level: &str) {
    let level = match level {
        "debug" | "info" | "warn" => level,
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match OpenOptions::new().append(true).create(true).open(LOG_FILE_PATH) {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
        Err(e) => {
            eprintln!("Failed to open log file '{LOG_FILE_PATH}', logging to stderr instead: {e}");
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .init();
        }
    }
}
