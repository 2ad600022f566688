use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::{JobRecord, RowRejection};

const ID_COLUMN: &str = "ID";
const URL_COLUMN: &str = "URL";
const LABELS_COLUMN: &str = "Labels";

/// Fatal load errors: the file as a whole cannot be used
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read CSV: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV header is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("invalid row, aborting run ({0})")]
    Rejected(RowRejection),
}

/// What to do with a row that fails validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidRowPolicy {
    /// Drop the row from dispatch and list it in the report
    #[default]
    ExcludeAndReport,
    /// Stop the whole run at the first invalid row
    Abort,
}

/// Result of reading a CSV: dispatchable records plus excluded rows
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadedRows {
    pub records: Vec<JobRecord>,
    pub rejected: Vec<RowRejection>,
}

impl LoadedRows {
    /// Number of data rows seen in the file
    pub fn total_rows(&self) -> usize {
        self.records.len() + self.rejected.len()
    }
}

struct Columns {
    id: usize,
    url: usize,
    labels: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, LoadError> {
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);
        Ok(Columns {
            id: position(ID_COLUMN).ok_or(LoadError::MissingColumn(ID_COLUMN))?,
            url: position(URL_COLUMN).ok_or(LoadError::MissingColumn(URL_COLUMN))?,
            labels: position(LABELS_COLUMN),
        })
    }
}

/// Load job records from a CSV file on disk
pub fn load(path: impl AsRef<Path>, policy: InvalidRowPolicy) -> Result<LoadedRows, LoadError> {
    let path = path.as_ref();
    debug!("Opening CSV file: {}", path.display());
    let file = File::open(path)?;
    let loaded = load_from_reader(BufReader::new(file), policy)?;
    info!(
        "Loaded CSV with {} rows ({} valid, {} rejected)",
        loaded.total_rows(),
        loaded.records.len(),
        loaded.rejected.len()
    );
    Ok(loaded)
}

/// Load job records from any CSV source with a header row
///
/// Single linear pass. Rows keep their file order. A row whose id was
/// already seen is rejected, the first occurrence wins.
pub fn load_from_reader<R: Read>(
    reader: R,
    policy: InvalidRowPolicy,
) -> Result<LoadedRows, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let columns = Columns::from_headers(csv_reader.headers()?)?;

    let mut loaded = LoadedRows::default();
    let mut seen: HashMap<String, u64> = HashMap::new();

    for result in csv_reader.records() {
        let rejection = match result {
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => RowRejection {
                line: e.position().map(|p| p.line()).unwrap_or(0),
                id: None,
                reason: format!("malformed CSV record: {}", e),
            },
            Ok(row) => {
                let line = row.position().map(|p| p.line()).unwrap_or(0);
                let id = row.get(columns.id).unwrap_or("").trim();
                let url = row.get(columns.url).unwrap_or("");
                let labels = columns.labels.and_then(|i| row.get(i));

                // Ids are claimed on first sight, valid row or not
                let first_seen = if id.is_empty() {
                    None
                } else {
                    seen.get(id).copied()
                };

                match first_seen {
                    Some(first_line) => RowRejection {
                        line,
                        id: Some(id.to_string()),
                        reason: format!("duplicate ID, first seen on line {}", first_line),
                    },
                    None => {
                        if !id.is_empty() {
                            seen.insert(id.to_string(), line);
                        }
                        match JobRecord::from_cells(id, url, labels) {
                            Ok(record) => {
                                loaded.records.push(record);
                                continue;
                            }
                            Err(problems) => RowRejection {
                                line,
                                id: (!id.is_empty()).then(|| id.to_string()),
                                reason: problems.join("; "),
                            },
                        }
                    }
                }
            }
        };

        warn!("Rejected CSV row: {}", rejection);
        if policy == InvalidRowPolicy::Abort {
            return Err(LoadError::Rejected(rejection));
        }
        loaded.rejected.push(rejection);
    }

    Ok(loaded)
}
