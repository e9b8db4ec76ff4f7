//! File logging for the hook binary.
//!
//! Hooks run with stdout/stderr owned by the host tool, so diagnostics go to a
//! daily rolling file under `<root>/logs/`. `BEACON_DEBUG_LOG=1` forces debug
//! output; otherwise `RUST_LOG` applies, defaulting to `warn`.

use std::env;

use beacon_core::StorageConfig;
use fs_err as fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

pub const DEBUG_LOG_ENV: &str = "BEACON_DEBUG_LOG";

pub fn debug_enabled() -> bool {
    env::var(DEBUG_LOG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn filter() -> EnvFilter {
    if debug_enabled() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

/// Installs the file subscriber. Hold the returned guard until exit so
/// buffered lines are flushed; `None` means logging is unavailable.
pub fn init(storage: &StorageConfig) -> Option<WorkerGuard> {
    let dir = storage.logs_dir();
    fs::create_dir_all(&dir).ok()?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("beacon-hook")
        .filename_suffix("log")
        .build(&dir)
        .ok()?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;

    Some(guard)
}
