//! File logging for rewind-ctl.
//!
//! stdout carries command output, so logs go to
//! `~/.rewind/logs/rewind-ctl.log`. Logging never blocks a command: if the
//! directory can't be created, the CLI runs without a subscriber.

use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "rewind-ctl.log";

/// Installs the file subscriber. Keep the guard alive until exit so buffered
/// lines are flushed.
pub fn init() -> Option<WorkerGuard> {
    let dir = rewind_core::config::rewind_dir().ok()?.join(LOG_DIR);
    fs_err::create_dir_all(&dir).ok()?;

    let appender = tracing_appender::rolling::never(&dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let debug_enabled = env::var("REWIND_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;
    Some(guard)
}
