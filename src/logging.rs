//! Tracing setup
//!
//! The terminal belongs to the chat, so logs go to `LOG_FILE` and are only
//! mirrored to stderr with `--verbose`. `RUST_LOG` overrides `LOG_LEVEL`.

use crate::error::{Result, SqlAgentError};
use std::ffi::OsStr;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing for the application
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer.
pub fn init_tracing(level: &str, log_file: &Path, verbose: bool, json: bool) -> Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (dir, file_name) = split_log_path(log_file)?;
    std::fs::create_dir_all(dir)?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    let installed = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(writer))
            .with(verbose.then(|| fmt::layer().json().with_writer(std::io::stderr)))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .with(verbose.then(|| fmt::layer().with_target(false).with_writer(std::io::stderr)))
            .try_init()
    };
    installed.map_err(|e| SqlAgentError::Config(format!("failed to install logger: {}", e)))?;

    Ok(guard)
}

fn split_log_path(log_file: &Path) -> Result<(&Path, &OsStr)> {
    let file_name = log_file.file_name().ok_or_else(|| {
        SqlAgentError::Config(format!("LOG_FILE is not a file path: {}", log_file.display()))
    })?;
    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok((dir, file_name))
}
