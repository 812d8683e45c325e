use clap::Parser;
use offsite_cli::commands::ship::ShipArgs;
use offsite_cli::logging;
use std::process::ExitCode;
use tracing::{error, info, info_span, Instrument};

#[tokio::main]
async fn main() -> ExitCode {
    let args = ShipArgs::parse();

    if let Err(e) = logging::init(&args.log_settings()) {
        eprintln!("cloud-backup: {:#}", e);
        return ExitCode::FAILURE;
    }

    let span = info_span!("cloud_backup", pid = std::process::id());
    match args.run().instrument(span).await {
        Ok(report) => {
            info!(
                "All done: {} uploaded, {} failed",
                report.processed.len(),
                report.failed.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
