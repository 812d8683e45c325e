use clap::Parser;
use offsite_cli::commands::snapshot::SnapshotArgs;
use offsite_cli::logging;
use std::process::ExitCode;
use tracing::{error, info, info_span, Instrument};

#[tokio::main]
async fn main() -> ExitCode {
    let args = SnapshotArgs::parse();

    if let Err(e) = logging::init(&args.log_settings()) {
        eprintln!("rsync-backup: {:#}", e);
        return ExitCode::FAILURE;
    }

    let span = info_span!("rsync_backup", pid = std::process::id());
    match args.run().instrument(span).await {
        Ok(report) => {
            info!("All done. Snapshot {}", report.label);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
