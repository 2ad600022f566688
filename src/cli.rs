use std::path::PathBuf;

use clap::Parser;

use crate::import::InvalidRowPolicy;

/// Create one CVAT annotation task per row of a CSV file
#[derive(Parser, Debug)]
#[command(name = "cvat-bulk-import", version, about)]
pub struct Cli {
    /// CSV file with columns ID, URL and optionally Labels
    pub csv: PathBuf,

    /// Number of parallel workers (overrides NUM_WORKERS)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub workers: Option<u32>,

    /// Abort the whole run on the first invalid row instead of skipping it
    #[arg(long)]
    pub strict: bool,

    /// Validate the CSV and show what would be created, without calling CVAT
    #[arg(long)]
    pub dry_run: bool,

    /// Directory for run logs and failure reports (overrides LOG_DIR)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Also write the full run report as JSON to this path
    #[arg(long)]
    pub json_report: Option<PathBuf>,
}

impl Cli {
    pub fn row_policy(&self) -> InvalidRowPolicy {
        if self.strict {
            InvalidRowPolicy::Abort
        } else {
            InvalidRowPolicy::ExcludeAndReport
        }
    }
}
