use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache directory for this process already exists: {}", path.display())]
    CacheConflict { path: PathBuf },

    #[error("No marker file at {}. Touch it to mark this directory as a backup destination", path.display())]
    NotABackupRoot { path: PathBuf },

    #[error("Backup already running at this destination: PID {pid}")]
    AlreadyRunning { pid: i32 },

    #[error("Failed to invoke {program}: {source}")]
    Invocation {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed with {}", describe_code(*code))]
    CommandFailed { program: String, code: Option<i32> },
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("returncode {}", code),
        None => "termination by signal".to_string(),
    }
}

impl Error {
    /// Process exit status for a fault that ends the run.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::AlreadyRunning { .. } => 2,
            _ => 1,
        }
    }

    /// Faults confined to a single file: logged and skipped by the file processor.
    /// Everything else aborts the run.
    pub fn is_per_file(&self) -> bool {
        matches!(self, Error::CommandFailed { .. } | Error::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::AlreadyRunning { pid: 42 }.exit_code(), 2);
        assert_eq!(Error::Config("no passphrase".into()).exit_code(), 1);
        assert_eq!(
            Error::CacheConflict {
                path: PathBuf::from("/tmp/cache/1"),
            }
            .exit_code(),
            1
        );
        assert_eq!(
            Error::NotABackupRoot {
                path: PathBuf::from("/mnt/backup"),
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn test_invocation_fault_is_not_per_file() {
        let fault = Error::Invocation {
            program: "md5sum".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(!fault.is_per_file());

        let failure = Error::CommandFailed { program: "gpg".into(), code: Some(2) };
        assert!(failure.is_per_file());
        assert_eq!(failure.to_string(), "gpg failed with returncode 2");
    }
}
