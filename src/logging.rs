use std::path::{Path, PathBuf};

use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Install the global subscriber: console plus log files under `log_dir`
///
/// Files written:
/// - `cvat_task_creation_<run_stamp>.log` - everything at INFO and above for this run
/// - `error.log.<date>` - errors only, rotated daily, shared across runs
///
/// Returns the path of the per-run log file.
pub fn init(log_dir: &Path, run_stamp: &str) -> std::io::Result<PathBuf> {
    // Create logs directory if it doesn't exist
    std::fs::create_dir_all(log_dir)?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let run_log_name = format!("cvat_task_creation_{}.log", run_stamp);
    let run_file = tracing_appender::rolling::never(log_dir, &run_log_name);
    let error_file = tracing_appender::rolling::daily(log_dir, "error.log");

    let run_layer = tracing_subscriber::fmt::layer()
        .with_writer(run_file)
        .with_ansi(false)
        .with_filter(LevelFilter::INFO);

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_file)
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);

    // Create console/stdout layer for terminal output
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(run_layer)
        .with(error_layer)
        .init();

    Ok(log_dir.join(run_log_name))
}
