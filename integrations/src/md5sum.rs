use offsite_core::{CommandLine, Result, Runner};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Computes checksums with the external `md5sum` tool.
pub struct Checksummer {
    runner: Arc<dyn Runner>,
    program: String,
}

impl Checksummer {
    pub fn new(runner: Arc<dyn Runner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// Runs `md5sum <name>` inside `dir` and returns its output line.
    ///
    /// A tool that cannot be started is an invocation fault; a nonzero status
    /// is a per-file command failure.
    pub async fn checksum(&self, dir: &Path, name: &str) -> Result<String> {
        debug!("md5summing {}", name);
        let command = CommandLine::new(&self.program).arg(name).current_dir(dir);
        let output = self.runner.run(&command).await?.check(&self.program)?;

        let mut line = output.stdout;
        if !line.ends_with('\n') {
            line.push('\n');
        }
        Ok(line)
    }
}
