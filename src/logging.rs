//! Log setup: console plus an append-only log file.
//!
//! At startup an existing log file is moved aside to
//! `{path}.{YYYY-MM-DD}.old` (or `.old.1`, `.old.2`, … when that name is
//! already taken), then a fresh file is opened. Every event goes to both
//! sinks, one timestamped line each. File writes are serialised through a
//! mutex so concurrent requests never interleave partial lines.
//!
//! The filter defaults to `info` and can be overridden with `RUST_LOG`.

use chrono::{Local, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Could not rotate log file {}: {source}", path.display())]
    Rotate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not open log file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Logging already initialised: {0}")]
    Init(String),
}

/// Rotate the old log, open a new one and install the global subscriber.
///
/// Returns the path the previous log was moved to, if there was one.
pub fn init(log_path: &Path) -> Result<Option<PathBuf>, LogError> {
    let rotated = rotate(log_path, Local::now().date_naive())?;
    let file = open_append(log_path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer().with_target(false);
    let file_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| LogError::Init(e.to_string()))?;

    Ok(rotated)
}

/// Move an existing log file aside, named after `date`.
pub fn rotate(log_path: &Path, date: NaiveDate) -> Result<Option<PathBuf>, LogError> {
    if !log_path.exists() {
        return Ok(None);
    }

    let target = rotated_path(log_path, date);
    fs::rename(log_path, &target).map_err(|source| LogError::Rotate {
        path: log_path.to_path_buf(),
        source,
    })?;
    Ok(Some(target))
}

/// First unused `{path}.{date}.old[.N]` name.
fn rotated_path(log_path: &Path, date: NaiveDate) -> PathBuf {
    let base = format!("{}.{}.old", log_path.display(), date.format("%Y-%m-%d"));
    let mut candidate = PathBuf::from(&base);
    let mut n = 1;
    while candidate.exists() {
        candidate = PathBuf::from(format!("{base}.{n}"));
        n += 1;
    }
    candidate
}

fn open_append(log_path: &Path) -> Result<File, LogError> {
    let open_err = |source| LogError::Open {
        path: log_path.to_path_buf(),
        source,
    };
    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(open_err)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(open_err)
}
