use std::env;
use std::sync::Arc;

use tracing::{info, warn};

use crate::cli::Cli;
use crate::config::{Config, ConfigError, CvatCredentials, RunSettings};
use crate::cvat::{ClientOptions, CvatClient, TaskSpec};
use crate::error::AppError;
use crate::import::{self, JobRecord, LoadedRows, RunReport};
use crate::logging;
use crate::worker::{self, TaskCreator};

/// Every record was created and every row loaded
pub const EXIT_OK: u8 = 0;
/// Configuration, load, authentication or report I/O stopped the run
pub const EXIT_FATAL: u8 = 1;
/// The run finished but left failed or rejected records behind
pub const EXIT_PARTIAL_FAILURE: u8 = 2;

/// Everything a run needs before it touches the CSV
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// `None` for a dry run, which never reads credentials
    pub credentials: Option<CvatCredentials>,
    pub settings: RunSettings,
}

impl RunPlan {
    /// Resolve credentials and settings from command-line flags over `lookup`
    ///
    /// Flags replace their variable before it is parsed, so a malformed
    /// `NUM_WORKERS` is ignored when `--workers` is given.
    pub fn resolve<F>(cli: &Cli, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let merged = |key: &str| match (key, cli.workers) {
            ("NUM_WORKERS", Some(workers)) => Some(workers.to_string()),
            _ => lookup(key),
        };

        let mut plan = if cli.dry_run {
            RunPlan {
                credentials: None,
                settings: RunSettings::from_lookup(&merged)?,
            }
        } else {
            let config = Config::from_lookup(merged)?;
            RunPlan {
                credentials: Some(config.credentials),
                settings: config.settings,
            }
        };

        if let Some(dir) = &cli.log_dir {
            plan.settings.log_dir = dir.clone();
        }
        Ok(plan)
    }
}

/// Full run as the binary performs it: environment, logging, CSV, CVAT, report
pub async fn run(cli: Cli) -> Result<RunReport, AppError> {
    let run_stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();

    // Load .env file if it exists
    dotenv::dotenv().ok();
    // Credentials are read once here and never by workers
    let plan = RunPlan::resolve(&cli, |key: &str| env::var(key).ok())?;
    let settings = &plan.settings;

    let run_log = logging::init(&settings.log_dir, &run_stamp).map_err(AppError::Logging)?;

    info!("Starting cvat-bulk-import");
    info!("Configuration loaded successfully:");
    info!("  - CSV file: {}", cli.csv.display());
    info!("  - Number of workers: {}", settings.num_workers);
    info!("  - Delay between calls: {:?}", settings.request_delay);
    info!("  - Wait for data import: {}", settings.wait_for_import);
    info!("  - Run log: {}", run_log.display());
    if let Some(credentials) = &plan.credentials {
        info!("  - CVAT host: {}", credentials.host);
    }

    let loaded = import::load(&cli.csv, cli.row_policy())?;

    let creator: Option<Arc<dyn TaskCreator>> = match &plan.credentials {
        None => None,
        Some(credentials) => {
            let client = CvatClient::authenticate(credentials, ClientOptions::from(settings))
                .await
                .map_err(AppError::Auth)?;
            let client: Arc<dyn TaskCreator> = Arc::new(client);
            Some(client)
        }
    };

    let report = execute(&cli, settings, loaded, creator, &run_stamp).await?;
    println!("{}", report);
    Ok(report)
}

/// Dispatch loaded rows through `creator` and write the report artifacts
///
/// Without a creator the run is a dry run: the tasks are logged, nothing is sent.
pub async fn execute(
    cli: &Cli,
    settings: &RunSettings,
    loaded: LoadedRows,
    creator: Option<Arc<dyn TaskCreator>>,
    run_stamp: &str,
) -> Result<RunReport, AppError> {
    if !loaded.rejected.is_empty() {
        warn!(
            "{} rows were rejected and will not be dispatched",
            loaded.rejected.len()
        );
    }

    let report = match creator {
        None => {
            preview(&loaded.records);
            RunReport::default().with_rejected(loaded.rejected)
        }
        Some(creator) => worker::dispatch(
            loaded.records,
            settings.num_workers,
            creator,
            settings.request_delay,
        )
        .await?
        .with_rejected(loaded.rejected),
    };

    info!("{}", report.summary());
    report.write_failure_log(&settings.log_dir, run_stamp)?;
    if let Some(path) = &cli.json_report {
        report.write_json(path)?;
    }

    Ok(report)
}

/// Process exit status for the result of a run
pub fn exit_code(result: &Result<RunReport, AppError>) -> u8 {
    match result {
        Ok(report) if report.is_clean() => EXIT_OK,
        Ok(_) => EXIT_PARTIAL_FAILURE,
        Err(_) => EXIT_FATAL,
    }
}

/// Log the tasks a real run would create
fn preview(records: &[JobRecord]) {
    info!("Dry run: {} tasks would be created", records.len());
    for record in records {
        let spec = TaskSpec::for_record(record);
        let labels: Vec<&str> = spec.labels.iter().map(|l| l.name.as_str()).collect();
        info!(
            "Would create task {} from {} with labels [{}]",
            spec.name,
            record.image_url,
            labels.join(", ")
        );
    }
}
