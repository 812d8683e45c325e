//! Running checksum manifest for one encrypt-and-ship run.
//!
//! Lines accumulate in `md5sums.txt` inside the cache directory and the file
//! is shipped once, after every entry has been processed.

use crate::md5sum::Checksummer;
use offsite_backends::Sink;
use offsite_core::{CacheStager, Result};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

pub const MANIFEST_FILE: &str = "md5sums.txt";

pub struct ChecksumLedger {
    checksummer: Checksummer,
    lines: usize,
}

impl ChecksumLedger {
    pub fn new(checksummer: Checksummer) -> Self {
        Self { checksummer, lines: 0 }
    }

    /// Lines appended so far.
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Checksums a staged file and appends the result to the manifest.
    pub async fn record(&mut self, cache: &CacheStager, name: &str) -> Result<()> {
        let line = self.checksummer.checksum(cache.path(), name).await?;

        let mut manifest = OpenOptions::new()
            .create(true)
            .append(true)
            .open(cache.file(MANIFEST_FILE))
            .await?;
        manifest.write_all(line.as_bytes()).await?;
        manifest.flush().await?;

        self.lines += 1;
        Ok(())
    }

    /// Uploads the manifest (unless `dry_run`), then drops it from the cache
    /// unless the cache is kept.
    pub async fn ship(&self, cache: &CacheStager, sink: &dyn Sink, dry_run: bool) -> Result<()> {
        let manifest = cache.file(MANIFEST_FILE);
        if !tokio::fs::try_exists(&manifest).await? {
            info!("No manifest to ship");
            return Ok(());
        }

        let uploaded = if dry_run {
            info!("Dry run: not uploading {}", MANIFEST_FILE);
            Ok(())
        } else {
            sink.upload(&manifest).await
        };

        cache.discard(MANIFEST_FILE).await?;
        uploaded
    }
}
