//! Per-process cache directory.
//!
//! Each run stages its files in `<cache root>/<pid>`. An existing directory
//! at that path means a concurrent or crashed run; it is never reused or
//! cleaned up automatically.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug)]
pub struct CacheStager {
    path: PathBuf,
    keep: bool,
}

impl CacheStager {
    /// Creates `<root>/<pid>`, failing with [`Error::CacheConflict`] if it already exists.
    pub async fn stage(root: impl AsRef<Path>, pid: u32, keep: bool) -> Result<Self> {
        let path = root.as_ref().join(pid.to_string());

        if fs::symlink_metadata(&path).await.is_ok() {
            return Err(Error::CacheConflict { path });
        }

        // create_dir rather than create_dir_all: a racing creator must lose here.
        fs::create_dir(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => Error::CacheConflict { path: path.clone() },
            _ => Error::Io(e),
        })?;
        info!("Using cachedir: {}", path.display());

        Ok(Self { path, keep })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cache-local path for a staged file name.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    pub fn keep(&self) -> bool {
        self.keep
    }

    /// Removes the cache directory unless it is being kept.
    ///
    /// Removal is non-recursive: anything still staged makes this fail.
    pub async fn teardown(self) -> Result<()> {
        if self.keep {
            info!("Keeping cachedir for inspection: {}", self.path.display());
            return Ok(());
        }
        fs::remove_dir(&self.path).await.map_err(|e| {
            warn!("Could not remove cachedir {}: {}", self.path.display(), e);
            Error::Io(e)
        })?;
        info!("Removed cachedir: {}", self.path.display());
        Ok(())
    }

    /// Removes one staged file unless the cache is being kept.
    pub async fn discard(&self, name: &str) -> Result<()> {
        if self.keep {
            return Ok(());
        }
        info!("deleting {} from {}", name, self.path.display());
        fs::remove_file(self.file(name)).await?;
        Ok(())
    }
}
