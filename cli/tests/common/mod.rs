#![allow(dead_code)]

use async_trait::async_trait;
use offsite_backends::Sink;
use offsite_core::{CommandLine, CommandOutput, Error, Result, Runner, Tools};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub fn tools() -> Tools {
    Tools {
        md5sum: "md5sum".into(),
        gpg: "gpg".into(),
        rclone: "rclone".into(),
        rsync: "rsync".into(),
    }
}

fn ok(stdout: String) -> CommandOutput {
    CommandOutput {
        code: Some(0),
        stdout,
        stderr: String::new(),
    }
}

fn failed(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Stands in for md5sum, gpg and rsync. Records every command line.
#[derive(Default)]
pub struct FakeRunner {
    pub commands: Mutex<Vec<CommandLine>>,
    /// Plaintext names gpg refuses to encrypt.
    pub gpg_failures: HashSet<String>,
    /// Simulate a missing md5sum binary.
    pub md5sum_missing: bool,
    pub rsync_missing: bool,
    pub rsync_code: i32,
}

impl FakeRunner {
    pub fn programs(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.program.clone())
            .collect()
    }

    pub fn last(&self, program: &str) -> Option<CommandLine> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.program == program)
            .cloned()
    }

    fn missing(program: &str) -> Error {
        Error::Invocation {
            program: program.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
        }
    }
}

#[async_trait]
impl Runner for FakeRunner {
    async fn run(&self, command: &CommandLine) -> Result<CommandOutput> {
        self.commands.lock().unwrap().push(command.clone());
        let cwd = command.cwd.clone().unwrap_or_default();

        match command.program.as_str() {
            "md5sum" => {
                if self.md5sum_missing {
                    return Err(Self::missing("md5sum"));
                }
                let name = &command.args[0];
                let data = std::fs::read(cwd.join(name))?;
                Ok(ok(format!("{:032x}  {}\n", data.len(), name)))
            }
            "gpg" => {
                let src = command.args.last().cloned().unwrap_or_default();
                if self.gpg_failures.contains(&src) {
                    return Ok(failed(2, "gpg: encryption failed"));
                }
                let dest = command.value_of("--output").unwrap_or_default().to_string();
                let mut data = b"gpg:".to_vec();
                data.extend(std::fs::read(cwd.join(&src))?);
                std::fs::write(cwd.join(dest), data)?;
                Ok(ok(String::new()))
            }
            "rsync" => {
                if self.rsync_missing {
                    return Err(Self::missing("rsync"));
                }
                if self.rsync_code == 0 {
                    Ok(ok(String::new()))
                } else {
                    Ok(failed(self.rsync_code, "rsync error: some files could not be transferred"))
                }
            }
            other => Err(Self::missing(other)),
        }
    }
}

/// Copies uploads into a directory and remembers their order.
pub struct RecordingSink {
    pub dir: PathBuf,
    pub target: String,
    pub uploads: Mutex<Vec<String>>,
    /// File names rejected the way a failing `rclone copy` would be.
    pub rejects: HashSet<String>,
}

impl RecordingSink {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            target: dir.display().to_string(),
            uploads: Mutex::new(Vec::new()),
            rejects: HashSet::new(),
        }
    }

    pub fn rejecting(dir: &Path, names: &[&str]) -> Self {
        Self {
            rejects: names.iter().map(|n| n.to_string()).collect(),
            ..Self::new(dir)
        }
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn upload(&self, file: &Path) -> Result<()> {
        let name = file.file_name().unwrap().to_string_lossy().to_string();
        if self.rejects.contains(&name) {
            return Err(Error::CommandFailed {
                program: "rclone".to_string(),
                code: Some(1),
            });
        }
        std::fs::copy(file, self.dir.join(&name))?;
        self.uploads.lock().unwrap().push(name);
        Ok(())
    }

    fn target(&self) -> &str {
        &self.target
    }
}
