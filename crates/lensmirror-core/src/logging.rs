//! Logging configuration using tracing
//!
//! Headless runs own stdout for the NDJSON mirror stream, so all tracing
//! output goes to a daily-rolling file.

use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Filter directives, e.g. `debug` or `lensmirror_app=trace,warn`
pub const LOG_ENV: &str = "LENSMIRROR_LOG";

/// Overrides the log directory
pub const LOG_DIR_ENV: &str = "LENSMIRROR_LOG_DIR";

const LOG_FILE_PREFIX: &str = "lensmirror.log";
const DEFAULT_DIRECTIVES: &str =
    "lensmirror=info,lensmirror_app=info,lensmirror_bridge=info,lensmirror_core=info,warn";

/// Initialize the logging subsystem
///
/// # Examples
/// ```bash
/// LENSMIRROR_LOG=debug lensmirror timer
/// LENSMIRROR_LOG_DIR=/tmp/lm LENSMIRROR_LOG=lensmirror_bridge=trace lensmirror restapi
/// ```
pub fn init() -> Result<()> {
    let log_dir = log_directory(std::env::var_os(LOG_DIR_ENV).map(PathBuf::from).as_deref());
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);

    tracing_subscriber::registry()
        .with(env_filter(std::env::var(LOG_ENV).ok().as_deref()))
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .init();

    tracing::info!("Log directory: {}", log_dir.display());
    Ok(())
}

/// Build the filter from user directives, falling back to the defaults when
/// they are missing or do not parse.
fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Where log files land: the override, else `<data_local_dir>/lensmirror/logs`.
pub fn log_directory(override_dir: Option<&Path>) -> PathBuf {
    match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lensmirror")
            .join("logs"),
    }
}
