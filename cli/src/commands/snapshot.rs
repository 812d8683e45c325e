//! Incremental snapshots in the style of Time Machine: each run copies the
//! source into a new labelled directory under the destination root,
//! hard-linking unchanged files against the last good snapshot.

use crate::logging::LogSettings;
use chrono::{DateTime, Utc};
use clap::Parser;
use offsite_core::label::{local_hostname, make_label};
use offsite_core::{DestinationGuard, LastGoodTracker, Result, Runner, SystemRunner, Tools};
use offsite_integrations::rsync::find_exclude_file;
use offsite_integrations::{SyncInvoker, SyncRequest};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "rsync-backup",
    about = "Does rsync --link-dest backups, in the style of Time Machine"
)]
pub struct SnapshotArgs {
    #[arg(help = "Directory to back up")]
    pub source: String,

    #[arg(help = "Root of the backup structure; snapshot directories are created inside it")]
    pub dest: String,

    #[arg(long, help = "Turn on more log messages")]
    pub debug: bool,

    #[arg(long, help = "Do not output to console, only logfile")]
    pub demon: bool,

    #[arg(long, help = "Pass --dry-run to rsync and leave the last good pointer alone")]
    pub dryrun: bool,

    #[arg(long, default_value = "rsync_backup.log", help = "Log file")]
    pub log_file: PathBuf,
}

impl SnapshotArgs {
    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            debug: self.debug,
            daemon: self.demon,
            file: self.log_file.clone(),
        }
    }

    pub async fn run(&self) -> Result<SnapshotReport> {
        let run = SnapshotRun::new(
            &self.source,
            &self.dest,
            self.dryrun,
            &local_hostname(),
            Utc::now(),
            std::process::id(),
        );
        let runner: Arc<dyn Runner> = Arc::new(SystemRunner);
        SnapshotPipeline::new(runner, Tools::from_env()).execute(&run).await
    }
}

fn strip_trailing_slash(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" if path.starts_with('/') => "/",
        trimmed => trimmed,
    }
}

/// One snapshot invocation.
#[derive(Debug, Clone)]
pub struct SnapshotRun {
    pub source: String,
    pub dest_root: PathBuf,
    pub label: String,
    pub dry_run: bool,
    pub pid: u32,
}

impl SnapshotRun {
    pub fn new(
        source: &str,
        dest_root: &str,
        dry_run: bool,
        hostname: &str,
        now: DateTime<Utc>,
        pid: u32,
    ) -> Self {
        let source = strip_trailing_slash(source).to_string();
        let label = make_label(&source, hostname, now);
        Self {
            source,
            dest_root: PathBuf::from(strip_trailing_slash(dest_root)),
            label,
            dry_run,
            pid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotReport {
    pub label: String,
    pub link_dest: Option<String>,
    pub advanced_last_good: bool,
}

pub struct SnapshotPipeline {
    runner: Arc<dyn Runner>,
    tools: Tools,
}

impl SnapshotPipeline {
    pub fn new(runner: Arc<dyn Runner>, tools: Tools) -> Self {
        Self { runner, tools }
    }

    pub async fn execute(&self, run: &SnapshotRun) -> Result<SnapshotReport> {
        let guard = DestinationGuard::new(&run.dest_root);
        guard.check_marker().await?;
        let lock = guard.acquire(run.pid).await?;

        let outcome = self.snapshot(run).await;
        let released = lock.release().await;
        let report = outcome?;
        released?;
        Ok(report)
    }

    async fn snapshot(&self, run: &SnapshotRun) -> Result<SnapshotReport> {
        let tracker = LastGoodTracker::new(&run.dest_root);
        let last_good = tracker.read().await?;
        match &last_good {
            Some(label) => info!("last good backup: {}", label),
            None => info!("No last good backup found, will do full backup"),
        }
        info!("Backup label is: {}", run.label);

        let request = SyncRequest {
            source: run.source.clone(),
            dest_root: run.dest_root.clone(),
            label: run.label.clone(),
            link_dest: last_good.clone(),
            exclude_file: find_exclude_file(&run.dest_root).await?,
            dry_run: run.dry_run,
        };

        if let Err(e) = SyncInvoker::new(self.runner.clone(), &self.tools.rsync)
            .sync(&request)
            .await
        {
            error!("rsync FAILED. Not updating lastgood");
            return Err(e);
        }

        let advanced_last_good = if run.dry_run {
            info!("Dry run completed, lastgood left unchanged");
            false
        } else {
            tracker.write(&run.label).await?;
            info!("rsync completed OK, updated lastgood");
            true
        };

        Ok(SnapshotReport {
            label: run.label.clone(),
            link_dest: last_good,
            advanced_last_good,
        })
    }
}
