use crate::backend::Sink;
use async_trait::async_trait;
use offsite_core::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Copies files into a directory on a mounted filesystem.
pub struct LocalSink {
    base_path: PathBuf,
    target: String,
}

impl LocalSink {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        let base_path = base_path.as_ref().to_path_buf();
        let target = base_path.display().to_string();
        Self { base_path, target }
    }
}

#[async_trait]
impl Sink for LocalSink {
    async fn upload(&self, file: &Path) -> Result<()> {
        let name = file.file_name().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a file path: {}", file.display()),
            ))
        })?;
        fs::create_dir_all(&self.base_path).await?;
        let dest = self.base_path.join(name);
        info!("copy {} to {}", file.display(), dest.display());
        fs::copy(file, &dest).await?;
        Ok(())
    }

    fn target(&self) -> &str {
        &self.target
    }
}
