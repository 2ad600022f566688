use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use cvat_bulk_import::{app, cli::Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = app::run(cli).await;
    if let Err(e) = &result {
        error!("Process failed: {}", e);
        eprintln!("error: {}", e);
    }
    ExitCode::from(app::exit_code(&result))
}
