//! Encrypt-and-ship: stage each source file in a per-process cache,
//! checksum it, encrypt it, checksum the ciphertext and upload it.
//!
//! Per-file failures are logged and the run moves on to the next entry.
//! Faults of the environment (a tool that cannot be started, an unreadable
//! source directory) abort the run and leave the cache directory in place.

use crate::logging::LogSettings;
use clap::{Parser, ValueEnum};
use offsite_backends::{LocalSink, RcloneSink, Sink};
use offsite_core::{
    CacheStager, ConfigResolver, Passphrase, Result, Runner, SystemRunner, Tools,
};
use offsite_integrations::{encrypted_name, Checksummer, ChecksumLedger, Encryptor, MANIFEST_FILE};
use std::fs::FileTimes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    Rclone,
    Local,
}

#[derive(Parser, Debug)]
#[command(
    name = "cloud-backup",
    about = "Encrypt all files in a directory and copy them to a remote destination"
)]
pub struct ShipArgs {
    #[arg(help = "Directory to read from")]
    pub source: PathBuf,

    #[arg(help = "Destination to copy encrypted files to")]
    pub dest: String,

    #[arg(long, help = "Turn on more log messages")]
    pub debug: bool,

    #[arg(long, help = "Do not output to console, only logfile")]
    pub demon: bool,

    #[arg(long, help = "Do everything except uploading")]
    pub dryrun: bool,

    #[arg(long, help = "Do not clear out the cache - leave it for inspection")]
    pub keepcache: bool,

    #[arg(long, help = "Local cache directory. CLOUDBACKUP_CACHE takes precedence")]
    pub cachedir: Option<String>,

    #[arg(long, help = "Encryption passphrase. CLOUDBACKUP_PASSPHRASE takes precedence")]
    pub passphrase: Option<String>,

    #[arg(long, value_enum, default_value_t = SinkKind::Rclone, help = "How to reach the destination")]
    pub sink: SinkKind,

    #[arg(long, default_value = "cloud_backup.log", help = "Log file")]
    pub log_file: PathBuf,
}

impl ShipArgs {
    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            debug: self.debug,
            daemon: self.demon,
            file: self.log_file.clone(),
        }
    }

    /// Builds the run from flags plus environment.
    pub fn resolve<F>(&self, resolver: &ConfigResolver<F>) -> Result<ShipRun>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = resolver.resolve(self.passphrase.as_deref(), self.cachedir.as_deref())?;
        Ok(ShipRun {
            source: self.source.clone(),
            passphrase: config.passphrase,
            cache_root: config.cache_dir,
            pid: std::process::id(),
            dry_run: self.dryrun,
            keep_cache: self.keepcache,
        })
    }

    pub async fn run(&self) -> Result<ShipReport> {
        let run = self.resolve(&ConfigResolver::from_env())?;
        let tools = Tools::from_env();
        let runner: Arc<dyn Runner> = Arc::new(SystemRunner);

        let sink: Arc<dyn Sink> = match self.sink {
            SinkKind::Rclone => Arc::new(RcloneSink::new(runner.clone(), &tools.rclone, &self.dest)),
            SinkKind::Local => Arc::new(LocalSink::new(&self.dest)),
        };

        ShipPipeline::new(runner, tools, sink).execute(&run).await
    }
}

/// One encrypt-and-ship invocation.
#[derive(Debug, Clone)]
pub struct ShipRun {
    pub source: PathBuf,
    pub passphrase: Passphrase,
    pub cache_root: PathBuf,
    pub pid: u32,
    pub dry_run: bool,
    pub keep_cache: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShipReport {
    pub processed: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: usize,
    pub manifest_lines: usize,
    pub manifest_shipped: bool,
}

/// A source directory entry, in processing order.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_file: bool,
    /// Why the entry could not be examined, e.g. a dangling symlink.
    pub error: Option<String>,
}

/// Entries directly under `dir`, sorted by name. Symlinks are followed.
///
/// An entry that cannot be examined is returned with its error; only an
/// unreadable `dir` fails the listing.
pub fn list_sources(dir: &Path) -> Result<Vec<SourceEntry>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        match entry {
            Ok(entry) => entries.push(SourceEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                path: entry.path().to_path_buf(),
                is_file: entry.file_type().is_file(),
                error: None,
            }),
            Err(e) => {
                let Some(path) = e.path().filter(|_| e.depth() > 0).map(Path::to_path_buf) else {
                    return Err(std::io::Error::from(e).into());
                };
                entries.push(SourceEntry {
                    name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                    path,
                    is_file: false,
                    error: Some(e.to_string()),
                });
            }
        }
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Copies `src` to `dest`, keeping permissions and access/modification times.
async fn stage_copy(src: PathBuf, dest: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let meta = std::fs::metadata(&src)?;
        std::fs::copy(&src, &dest)?;
        let times = FileTimes::new()
            .set_accessed(meta.accessed()?)
            .set_modified(meta.modified()?);
        std::fs::File::options().write(true).open(&dest)?.set_times(times)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)??;
    Ok(())
}

pub struct ShipPipeline {
    runner: Arc<dyn Runner>,
    tools: Tools,
    sink: Arc<dyn Sink>,
}

impl ShipPipeline {
    pub fn new(runner: Arc<dyn Runner>, tools: Tools, sink: Arc<dyn Sink>) -> Self {
        Self { runner, tools, sink }
    }

    pub async fn execute(&self, run: &ShipRun) -> Result<ShipReport> {
        let cache = CacheStager::stage(&run.cache_root, run.pid, run.keep_cache).await?;

        match self.process_all(run, &cache).await {
            Ok(report) => {
                cache.teardown().await?;
                info!(
                    processed = report.processed.len(),
                    failed = report.failed.len(),
                    skipped = report.skipped,
                    "Backup to {} finished",
                    self.sink.target()
                );
                Ok(report)
            }
            Err(e) => {
                error!(
                    "Aborting run, cachedir left in place: {}",
                    cache.path().display()
                );
                Err(e)
            }
        }
    }

    async fn process_all(&self, run: &ShipRun, cache: &CacheStager) -> Result<ShipReport> {
        let entries = list_sources(&run.source)?;
        let encryptor = Encryptor::new(self.runner.clone(), &self.tools.gpg, run.passphrase.clone());
        let mut ledger = ChecksumLedger::new(Checksummer::new(self.runner.clone(), &self.tools.md5sum));
        let mut report = ShipReport::default();

        let total = entries.len();
        for (i, entry) in entries.iter().enumerate() {
            info!("Processing file {} of {}: {}", i + 1, total, entry.name);

            if entry.name == MANIFEST_FILE {
                info!("skipping {} file", MANIFEST_FILE);
                report.skipped += 1;
                continue;
            }
            if let Some(reason) = &entry.error {
                error!("Failed to back up {}: {}", entry.name, reason);
                report.failed.push(entry.name.clone());
                continue;
            }
            if !entry.is_file {
                warn!("skipping {}: not a regular file", entry.name);
                report.skipped += 1;
                continue;
            }

            match self.process_file(run, cache, &mut ledger, &encryptor, entry).await {
                Ok(()) => report.processed.push(entry.name.clone()),
                Err(e) if e.is_per_file() => {
                    error!("Failed to back up {}: {}", entry.name, e);
                    self.discard_leftovers(cache, &entry.name).await?;
                    report.failed.push(entry.name.clone());
                }
                Err(e) => return Err(e),
            }
        }

        report.manifest_lines = ledger.lines();
        match ledger.ship(cache, self.sink.as_ref(), run.dry_run).await {
            Ok(()) => report.manifest_shipped = !run.dry_run && ledger.lines() > 0,
            Err(e) if e.is_per_file() => error!("Failed to ship {}: {}", MANIFEST_FILE, e),
            Err(e) => return Err(e),
        }

        Ok(report)
    }

    async fn process_file(
        &self,
        run: &ShipRun,
        cache: &CacheStager,
        ledger: &mut ChecksumLedger,
        encryptor: &Encryptor,
        entry: &SourceEntry,
    ) -> Result<()> {
        let name = entry.name.as_str();
        let encrypted = encrypted_name(name);

        info!("Copying {} to {}", entry.path.display(), name);
        stage_copy(entry.path.clone(), cache.file(name)).await?;

        ledger.record(cache, name).await?;
        encryptor.encrypt(cache.path(), name, &encrypted).await?;
        ledger.record(cache, &encrypted).await?;

        cache.discard(name).await?;

        if run.dry_run {
            info!("Dry run: not uploading {}", encrypted);
        } else {
            self.sink.upload(&cache.file(&encrypted)).await?;
        }

        cache.discard(&encrypted).await?;
        Ok(())
    }

    /// Removes whatever a failed file left in the cache, unless the cache is kept.
    async fn discard_leftovers(&self, cache: &CacheStager, name: &str) -> Result<()> {
        for leftover in [name.to_string(), encrypted_name(name)] {
            if tokio::fs::try_exists(cache.file(&leftover)).await? {
                cache.discard(&leftover).await?;
            }
        }
        Ok(())
    }
}
