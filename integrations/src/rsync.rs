//! Hard-link differential copy through `rsync --link-dest`.

use offsite_core::{CommandLine, Result, Runner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

pub const EXCLUDE_FILE: &str = "rsync_backup.exclude";

const BASE_FLAGS: &[&str] = &[
    "-D",
    "--numeric-ids",
    "--links",
    "--hard-links",
    "--one-file-system",
    "--itemize-changes",
    "--times",
    "--perms",
    "--recursive",
    "--owner",
    "--group",
    "--stats",
    "--human-readable",
    "--quiet",
];

/// One snapshot copy: `source` into `<dest_root>/<label>`.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub source: String,
    pub dest_root: PathBuf,
    pub label: String,
    /// Label of the previous good snapshot to hard-link against.
    pub link_dest: Option<String>,
    pub exclude_file: Option<PathBuf>,
    pub dry_run: bool,
}

impl SyncRequest {
    pub fn snapshot_dir(&self) -> PathBuf {
        self.dest_root.join(&self.label)
    }

    pub fn log_file(&self) -> PathBuf {
        self.dest_root.join(format!("{}.log", self.label))
    }

    pub fn command(&self, program: &str) -> CommandLine {
        let mut cmd = CommandLine::new(program).args(BASE_FLAGS.iter().copied());

        if self.dry_run {
            cmd = cmd.arg("--dry-run");
        }
        if let Some(previous) = &self.link_dest {
            cmd = cmd.arg(format!("--link-dest={}", self.dest_root.join(previous).display()));
        }
        if let Some(exclude) = &self.exclude_file {
            cmd = cmd.arg(format!("--exclude-from={}", exclude.display()));
        }

        cmd.arg(format!("--log-file={}", self.log_file().display()))
            .arg(&self.source)
            .arg(self.snapshot_dir().to_string_lossy())
    }
}

/// The conventional exclude file under `dest_root`, when present.
pub async fn find_exclude_file(dest_root: &Path) -> Result<Option<PathBuf>> {
    let path = dest_root.join(EXCLUDE_FILE);
    if tokio::fs::try_exists(&path).await? {
        info!("Exclude file: {}", path.display());
        Ok(Some(path))
    } else {
        Ok(None)
    }
}

pub struct SyncInvoker {
    runner: Arc<dyn Runner>,
    program: String,
}

impl SyncInvoker {
    pub fn new(runner: Arc<dyn Runner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// Runs the copy once. A nonzero status comes back as `CommandFailed`; never retried.
    pub async fn sync(&self, request: &SyncRequest) -> Result<()> {
        let command = request.command(&self.program);
        debug!("rsync command: {}", command);

        let output = self.runner.run(&command).await?;
        if let Err(e) = output.check(&self.program) {
            error!("rsync FAILED for {}: {}", request.label, e);
            return Err(e);
        }
        Ok(())
    }
}
