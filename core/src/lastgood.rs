//! Pointer to the most recent snapshot whose sync succeeded.

use crate::Result;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const LAST_GOOD_FILE: &str = "rsync_backup.lastgood";

#[derive(Debug, Clone)]
pub struct LastGoodTracker {
    path: PathBuf,
}

impl LastGoodTracker {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            path: root.as_ref().join(LAST_GOOD_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when no run has succeeded yet.
    pub async fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => {
                let label = content.trim();
                Ok((!label.is_empty()).then(|| label.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the pointer. Written to a sibling then renamed over.
    pub async fn write(&self, label: &str) -> Result<()> {
        let tmp = self.path.with_extension("lastgood.tmp");
        fs::write(&tmp, label).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
