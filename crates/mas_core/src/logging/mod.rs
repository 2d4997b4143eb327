//! Logging infrastructure.
//!
//! Two layers:
//! - Process-wide `tracing` subscriber (stderr, optionally a daily log file)
//! - Per-job [`JobLogger`]s with compact progress and a failure tail
//!
//! # Example
//!
//! ```no_run
//! use mas_core::logging::{JobLogger, LogConfig};
//!
//! let logger = JobLogger::new("sonify", "/path/to/logs", LogConfig::default(), None).unwrap();
//! logger.phase("Running");
//! logger.progress(50);
//! logger.success("converted image to music");
//! ```

mod job_logger;
mod types;

pub use job_logger::{JobLogger, JobLoggerBuilder};
pub use types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global subscriber writing to stderr.
///
/// `RUST_LOG` overrides `default_level`. Call once at startup.
pub fn init_tracing(default_level: LogLevel) {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(env_filter(default_level))
        .try_init();
}

/// Like [`init_tracing`], plus a daily-rolling `mas.log` in `log_dir`.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer. Falls back to stderr-only when the
/// directory cannot be created.
pub fn init_tracing_with_file(default_level: LogLevel, log_dir: &Path) -> Option<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        init_tracing(default_level);
        tracing::warn!("Cannot create log directory {}: {}", log_dir.display(), e);
        return None;
    }

    let appender = tracing_appender::rolling::daily(log_dir, "mas.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(env_filter(default_level))
        .try_init();

    Some(guard)
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

fn env_filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()))
}
