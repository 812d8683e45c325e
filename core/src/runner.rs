//! Invocation of external programs.
//!
//! A nonzero exit status is an ordinary outcome carried in [`CommandOutput`];
//! only a failure to start the program at all is an error.

use crate::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

const REDACTED: &str = "********";

/// A program, its arguments and the directory to run it in.
#[derive(Debug, Clone, Default)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    secret_args: Vec<usize>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds an argument that is masked whenever the command line is displayed.
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secret_args.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Value following `flag`, e.g. `--output` -> the output path.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Value of a `--flag=value` style argument.
    pub fn inline_value_of(&self, flag: &str) -> Option<&str> {
        let prefix = format!("{}=", flag);
        self.args
            .iter()
            .find_map(|a| a.strip_prefix(prefix.as_str()))
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for (i, arg) in self.args.iter().enumerate() {
            if self.secret_args.contains(&i) {
                write!(f, " {}", REDACTED)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Logs the outcome and converts a nonzero status into [`Error::CommandFailed`].
    pub fn check(self, program: &str) -> Result<Self> {
        if self.success() {
            info!(
                program,
                "Appears to have completed successfully. {}, {}",
                self.stdout.trim_end(),
                self.stderr.trim_end()
            );
            Ok(self)
        } else {
            warn!(
                program,
                code = ?self.code,
                "Failed: {}, {}",
                self.stdout.trim_end(),
                self.stderr.trim_end()
            );
            Err(Error::CommandFailed {
                program: program.to_string(),
                code: self.code,
            })
        }
    }
}

#[async_trait]
pub trait Runner: Send + Sync {
    /// Runs the command to completion. Returns `Err` only when it could not be started.
    async fn run(&self, command: &CommandLine) -> Result<CommandOutput>;
}

/// Runs commands as child processes of this one.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

#[async_trait]
impl Runner for SystemRunner {
    async fn run(&self, command: &CommandLine) -> Result<CommandOutput> {
        debug!("running: {}", command);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|e| Error::Invocation {
            program: command.program.clone(),
            source: e,
        })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_masks_secret_args() {
        let cmd = CommandLine::new("gpg")
            .arg("--passphrase")
            .secret_arg("hunter2")
            .args(["--output", "a.txt.gpg"]);

        let shown = cmd.to_string();
        assert_eq!(shown, "gpg --passphrase ******** --output a.txt.gpg");
        assert!(!shown.contains("hunter2"));
        assert_eq!(cmd.value_of("--output"), Some("a.txt.gpg"));
    }

    #[test]
    fn test_inline_value_of() {
        let cmd = CommandLine::new("rsync").args(["--quiet", "--link-dest=/mnt/b/prev"]);
        assert_eq!(cmd.inline_value_of("--link-dest"), Some("/mnt/b/prev"));
        assert_eq!(cmd.inline_value_of("--exclude-from"), None);
    }

    #[tokio::test]
    async fn test_nonzero_status_is_not_an_error() {
        let output = SystemRunner
            .run(&CommandLine::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]))
            .await
            .unwrap();

        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert!(matches!(
            output.check("sh"),
            Err(Error::CommandFailed { code: Some(3), .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_invocation_fault() {
        let result = SystemRunner
            .run(&CommandLine::new("/nonexistent/offsite-no-such-tool"))
            .await;
        assert!(matches!(result, Err(Error::Invocation { .. })));
    }

    #[tokio::test]
    async fn test_runs_in_requested_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = SystemRunner
            .run(&CommandLine::new("pwd").current_dir(dir.path()))
            .await
            .unwrap();
        let reported = std::fs::canonicalize(output.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }
}
