//! Exclusive use of a snapshot destination root.
//!
//! The lock is advisory: a pid file whose owner is checked with the null
//! signal. Checking and claiming are separate steps, so two runs starting at
//! the same instant can both pass the check. Single-operator use tolerates
//! that window.

use crate::{Error, Result};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

pub const MARKER_FILE: &str = "rsync_backup.marker";
pub const LOCK_FILE: &str = "rsync_backup.pid";

/// True when `pid` names a process we can address. Any signal error means stale.
pub fn is_alive(pid: i32) -> bool {
    if pid <= 0 {
        // 0 and negatives address process groups, never a single owner.
        return false;
    }
    kill(Pid::from_raw(pid), None).is_ok()
}

#[derive(Debug, Clone)]
pub struct DestinationGuard {
    root: PathBuf,
}

impl DestinationGuard {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn marker_path(&self) -> PathBuf {
        self.root.join(MARKER_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// The marker's existence is the only authorization needed.
    pub async fn check_marker(&self) -> Result<()> {
        let marker = self.marker_path();
        if fs::try_exists(&marker).await? {
            Ok(())
        } else {
            Err(Error::NotABackupRoot { path: self.root.clone() })
        }
    }

    /// Pid recorded in the lock file, if any. Unparseable content reads as `None`.
    pub async fn recorded_owner(&self) -> Result<Option<i32>> {
        match fs::read_to_string(self.lock_path()).await {
            Ok(content) => match content.trim().parse::<i32>() {
                Ok(pid) => Ok(Some(pid)),
                Err(_) => {
                    warn!("Ignoring unreadable lock file content: {:?}", content.trim());
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Claims the destination for `pid`, overriding a stale lock.
    pub async fn acquire(&self, pid: u32) -> Result<DestinationLock> {
        if let Some(owner) = self.recorded_owner().await? {
            // Our own pid in the file can only be a leftover from a dead run that had it before us.
            if owner != pid as i32 && is_alive(owner) {
                return Err(Error::AlreadyRunning { pid: owner });
            }
            info!("Overriding stale lock held by PID {}", owner);
        }

        fs::write(self.lock_path(), pid.to_string()).await?;
        debug!("Wrote lock file {} for PID {}", self.lock_path().display(), pid);

        Ok(DestinationLock {
            path: Some(self.lock_path()),
        })
    }
}

/// Held lock on a destination root. Released explicitly, or on drop.
#[derive(Debug)]
pub struct DestinationLock {
    path: Option<PathBuf>,
}

impl DestinationLock {
    pub async fn release(mut self) -> Result<()> {
        if let Some(path) = self.path.take() {
            fs::remove_file(&path).await?;
            debug!("Removed lock file {}", path.display());
        }
        Ok(())
    }
}

impl Drop for DestinationLock {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Failed to remove lock file {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_marker() {
        let root = TempDir::new().unwrap();
        let guard = DestinationGuard::new(root.path());
        assert!(matches!(
            guard.check_marker().await,
            Err(Error::NotABackupRoot { .. })
        ));

        std::fs::write(guard.marker_path(), b"").unwrap();
        guard.check_marker().await.unwrap();
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let root = TempDir::new().unwrap();
        let guard = DestinationGuard::new(root.path());

        let lock = guard.acquire(1234).await.unwrap();
        assert_eq!(std::fs::read_to_string(guard.lock_path()).unwrap(), "1234");

        lock.release().await.unwrap();
        assert!(!guard.lock_path().exists());
    }

    #[tokio::test]
    async fn test_stale_lock_is_overridden() {
        let root = TempDir::new().unwrap();
        let guard = DestinationGuard::new(root.path());
        std::fs::write(guard.lock_path(), i32::MAX.to_string()).unwrap();

        let lock = guard.acquire(99).await.unwrap();
        assert_eq!(std::fs::read_to_string(guard.lock_path()).unwrap(), "99");
        drop(lock);
        assert!(!guard.lock_path().exists());
    }

    #[tokio::test]
    async fn test_live_owner_blocks() {
        let root = TempDir::new().unwrap();
        let guard = DestinationGuard::new(root.path());

        let mut owner = Command::new("sleep").arg("30").spawn().unwrap();
        std::fs::write(guard.lock_path(), owner.id().to_string()).unwrap();

        let result = guard.acquire(99).await;
        owner.kill().unwrap();
        owner.wait().unwrap();

        match result {
            Err(Error::AlreadyRunning { pid }) => assert_eq!(pid, owner.id() as i32),
            other => panic!("expected AlreadyRunning, got {:?}", other),
        }
        assert_eq!(
            std::fs::read_to_string(guard.lock_path()).unwrap(),
            owner.id().to_string()
        );
    }

    #[tokio::test]
    async fn test_garbage_and_own_pid_are_stale() {
        let root = TempDir::new().unwrap();
        let guard = DestinationGuard::new(root.path());

        std::fs::write(guard.lock_path(), "not a pid\n").unwrap();
        guard.acquire(10).await.unwrap().release().await.unwrap();

        let me = std::process::id();
        std::fs::write(guard.lock_path(), me.to_string()).unwrap();
        guard.acquire(me).await.unwrap().release().await.unwrap();
    }

    #[test]
    fn test_group_pids_are_never_alive() {
        assert!(!is_alive(0));
        assert!(!is_alive(-1));
        assert!(is_alive(std::process::id() as i32));
    }
}
