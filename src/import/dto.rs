use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use super::models::RowRejection;

/// Result of attempting to create one remote task
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success { id: String, remote_task_id: u64 },
    Failure { id: String, error_message: String },
}

impl Outcome {
    /// Id of the record this outcome belongs to
    pub fn id(&self) -> &str {
        match self {
            Outcome::Success { id, .. } | Outcome::Failure { id, .. } => id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Error details for a record that failed
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FailedRecord {
    pub id: String,
    pub reason: String,
}

/// Aggregated outcomes of one import run
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Dispatch outcomes, in input order
    pub outcomes: Vec<Outcome>,
    /// Rows excluded at load time
    pub rejected: Vec<RowRejection>,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report to {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl RunReport {
    pub fn new(outcomes: Vec<Outcome>) -> Self {
        Self {
            outcomes,
            rejected: Vec::new(),
        }
    }

    /// Attach the rows excluded at load time
    pub fn with_rejected(mut self, rejected: Vec<RowRejection>) -> Self {
        self.rejected = rejected;
        self
    }

    pub fn count_success(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn count_failure(&self) -> usize {
        self.outcomes.len() - self.count_success()
    }

    pub fn count_rejected(&self) -> usize {
        self.rejected.len()
    }

    /// Failed dispatches with their reasons, in input order
    pub fn failures(&self) -> Vec<FailedRecord> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                Outcome::Failure { id, error_message } => Some(FailedRecord {
                    id: id.clone(),
                    reason: error_message.clone(),
                }),
                Outcome::Success { .. } => None,
            })
            .collect()
    }

    /// True when every row was loaded and every task was created
    pub fn is_clean(&self) -> bool {
        self.count_failure() == 0 && self.rejected.is_empty()
    }

    /// One-line summary of the run
    pub fn summary(&self) -> String {
        format!(
            "Task creation completed. Successfully created: {}, Failed: {}, Rejected: {}",
            self.count_success(),
            self.count_failure(),
            self.count_rejected()
        )
    }

    /// Write `failures_<timestamp>.log` into `dir` if anything failed
    ///
    /// # Returns
    /// - `Ok(Some(path))` - the file that was written
    /// - `Ok(None)` - nothing failed, no file written
    pub fn write_failure_log(
        &self,
        dir: &Path,
        timestamp: &str,
    ) -> Result<Option<PathBuf>, ReportError> {
        if self.is_clean() {
            return Ok(None);
        }

        let path = dir.join(format!("failures_{}.log", timestamp));
        let io_err = |source: std::io::Error| ReportError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(io_err)?;
        let mut file = fs::File::create(&path).map_err(io_err)?;
        for failure in self.failures() {
            writeln!(file, "ID: {}, Error: {}", failure.id, failure.reason).map_err(io_err)?;
        }
        for rejection in &self.rejected {
            writeln!(file, "{}", rejection).map_err(io_err)?;
        }

        info!("Failed task details written to {}", path.display());
        Ok(Some(path))
    }

    /// Write the whole report as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        let body = serde_json::to_string_pretty(self)?;
        fs::write(path, body).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Run report written to {}", path.display());
        Ok(())
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for failure in self.failures() {
            writeln!(f, "  failed   ID: {}, Error: {}", failure.id, failure.reason)?;
        }
        for rejection in &self.rejected {
            writeln!(f, "  rejected {}", rejection)?;
        }
        Ok(())
    }
}
