use async_trait::async_trait;
use offsite_core::Result;
use std::path::Path;

/// Destination for finished ciphertext and manifests.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Ships one file, keeping its base name at the destination.
    async fn upload(&self, file: &Path) -> Result<()>;

    /// Human-readable destination, for logging.
    fn target(&self) -> &str;
}
