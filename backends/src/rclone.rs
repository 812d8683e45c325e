use crate::backend::Sink;
use async_trait::async_trait;
use offsite_core::{CommandLine, Result, Runner};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Uploads with `rclone copy <file> <remote>`.
pub struct RcloneSink {
    runner: Arc<dyn Runner>,
    program: String,
    remote: String,
}

impl RcloneSink {
    pub fn new(runner: Arc<dyn Runner>, program: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            remote: remote.into(),
        }
    }

    pub fn command(&self, file: &Path) -> CommandLine {
        CommandLine::new(&self.program)
            .arg("copy")
            .arg(file.to_string_lossy())
            .arg(&self.remote)
    }
}

#[async_trait]
impl Sink for RcloneSink {
    async fn upload(&self, file: &Path) -> Result<()> {
        info!("rclone copy {} to {}", file.display(), self.remote);
        self.runner.run(&self.command(file)).await?.check(&self.program)?;
        Ok(())
    }

    fn target(&self) -> &str {
        &self.remote
    }
}
