use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{AppError, Result};

pub const DEFAULT_LOG_FILE: &str = "product_checker.log";

/// Log to stdout and append to `log_file`. Keep the returned guard alive for
/// the life of the process or buffered file lines are lost.
pub fn init(log_file: &Path) -> Result<WorkerGuard> {
    let (directory, file_name) = split_log_path(log_file)?;
    std::fs::create_dir_all(&directory)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(&directory)
        .map_err(|e| {
            AppError::Internal(format!(
                "Failed to open log file {}: {}",
                log_file.display(),
                e
            ))
        })?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()
        .map_err(|e| AppError::Internal(format!("Failed to install logger: {}", e)))?;

    Ok(guard)
}

fn split_log_path(log_file: &Path) -> Result<(PathBuf, String)> {
    let file_name = log_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| AppError::Config(format!("Invalid log file path: {}", log_file.display())))?;

    let directory = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok((directory, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_bare_file_name() {
        let (directory, file_name) = split_log_path(Path::new(DEFAULT_LOG_FILE)).unwrap();
        assert_eq!(directory, PathBuf::from("."));
        assert_eq!(file_name, "product_checker.log");
    }

    #[test]
    fn test_split_nested_path() {
        let (directory, file_name) =
            split_log_path(Path::new("/var/log/watcher/checker.log")).unwrap();
        assert_eq!(directory, PathBuf::from("/var/log/watcher"));
        assert_eq!(file_name, "checker.log");
    }

    #[test]
    fn test_split_rejects_directory_only() {
        assert!(split_log_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_init_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_file = dir.path().join("logs").join("checker.log");

        let guard = init(&log_file).unwrap();
        tracing::info!("logger initialised");
        drop(guard);

        assert!(log_file.exists());
    }
}
