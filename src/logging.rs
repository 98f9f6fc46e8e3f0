//! File logging for the planner.
//!
//! Logs go to `<data dir>/logs/dayplan*.log` and rotate by size. The first
//! successful init wins for the rest of the process.

use anyhow::{anyhow, bail, Context, Result};
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::info;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "dayplan";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
const MAX_LOG_FILES: usize = 3;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();

struct LoggingState {
    level: &'static str,
    log_dir: PathBuf,
    _logger: LoggerHandle,
}

/// Start file logging under `data_dir/logs`
///
/// Repeating the call with the same directory is a no-op; a different
/// directory is refused.
pub fn init_logging(level: &str, data_dir: &Path) -> Result<()> {
    let level = normalize_level(level)?;
    let log_dir = data_dir.join("logs");

    let state = LOGGING_STATE.get_or_try_init(|| -> Result<LoggingState> {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

        let logger = Logger::try_with_str(level)
            .map_err(|e| anyhow!("invalid log level `{}`: {}", level, e))?
            .log_to_file(
                FileSpec::default()
                    .directory(log_dir.as_path())
                    .basename(LOG_FILE_BASENAME),
            )
            .rotate(
                Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                Naming::Numbers,
                Cleanup::KeepLogFiles(MAX_LOG_FILES),
            )
            .write_mode(WriteMode::BufferAndFlush)
            .append()
            .format_for_files(flexi_logger::detailed_format)
            .start()
            .context("Failed to start logger")?;

        info!(
            "dayplan {} logging at {} to {}",
            env!("CARGO_PKG_VERSION"),
            level,
            log_dir.display()
        );

        Ok(LoggingState {
            level,
            log_dir: log_dir.clone(),
            _logger: logger,
        })
    })?;

    if state.log_dir != log_dir {
        bail!(
            "logging already initialized at {}; refusing to switch to {}",
            state.log_dir.display(),
            log_dir.display()
        );
    }
    Ok(())
}

/// Active level and directory, if logging has started
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.level, state.log_dir.clone()))
}

fn normalize_level(level: &str) -> Result<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => bail!("unsupported log level `{}`; expected trace|debug|info|warn|error", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level(" WARNING ").unwrap(), "warn");
        assert_eq!(normalize_level("debug").unwrap(), "debug");
        assert!(normalize_level("loud").is_err());
    }

    #[test]
    fn test_init_is_idempotent_per_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let other_dir = tempfile::tempdir().unwrap();

        init_logging("info", temp_dir.path()).unwrap();
        init_logging("info", temp_dir.path()).unwrap();
        assert!(init_logging("info", other_dir.path()).is_err());

        let (level, dir) = logging_status().unwrap();
        assert_eq!(level, "info");
        assert_eq!(dir, temp_dir.path().join("logs"));
    }
}
