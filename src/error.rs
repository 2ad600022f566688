use thiserror::Error;

use crate::config::ConfigError;
use crate::cvat::RemoteError;
use crate::import::{LoadError, ReportError};
use crate::worker::DispatchError;

/// Errors that end a run before (or instead of) a report
///
/// Per-record API failures never appear here; they are outcomes in the report.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("could not load job records: {0}")]
    Load(#[from] LoadError),

    #[error("authentication with CVAT failed: {0}")]
    Auth(#[source] RemoteError),

    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("failed to prepare log directory: {0}")]
    Logging(#[source] std::io::Error),
}
