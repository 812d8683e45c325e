//! Resolution of run settings from the environment and command-line flags.
//!
//! The environment is consulted first; a flag only fills in what the
//! environment leaves unset. Lookups go through a caller-supplied function
//! so nothing here reads process state directly.

use crate::secret::Passphrase;
use crate::{Error, Result};
use std::path::PathBuf;

pub const PASSPHRASE_ENV: &str = "CLOUDBACKUP_PASSPHRASE";
pub const CACHE_ENV: &str = "CLOUDBACKUP_CACHE";
/// Older name for [`CACHE_ENV`], still honoured.
pub const LEGACY_CACHE_ENV: &str = "CLOUDBACKUP_CACHEDIR";

/// Settings required before an encrypt-and-ship run may start.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub passphrase: Passphrase,
    pub cache_dir: PathBuf,
}

pub struct ConfigResolver<F> {
    lookup: F,
}

impl ConfigResolver<fn(&str) -> Option<String>> {
    /// Resolver backed by the process environment.
    pub fn from_env() -> Self {
        Self {
            lookup: |key| std::env::var(key).ok(),
        }
    }
}

impl<F> ConfigResolver<F>
where
    F: Fn(&str) -> Option<String>,
{
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }

    fn env(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.is_empty())
    }

    pub fn passphrase(&self, flag: Option<&str>) -> Option<Passphrase> {
        self.env(PASSPHRASE_ENV)
            .or_else(|| flag.filter(|v| !v.is_empty()).map(str::to_string))
            .map(Passphrase::new)
    }

    pub fn cache_dir(&self, flag: Option<&str>) -> Option<PathBuf> {
        self.env(CACHE_ENV)
            .or_else(|| self.env(LEGACY_CACHE_ENV))
            .or_else(|| flag.filter(|v| !v.is_empty()).map(str::to_string))
            .map(PathBuf::from)
    }

    /// Both a passphrase and a cache directory must resolve.
    pub fn resolve(&self, passphrase: Option<&str>, cache_dir: Option<&str>) -> Result<ResolvedConfig> {
        let passphrase = self
            .passphrase(passphrase)
            .ok_or_else(|| Error::Config("No passphrase supplied. Cannot continue".to_string()))?;
        let cache_dir = self
            .cache_dir(cache_dir)
            .ok_or_else(|| Error::Config("No cachedir supplied. Cannot continue".to_string()))?;
        Ok(ResolvedConfig { passphrase, cache_dir })
    }
}

/// Program names of the external collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub md5sum: String,
    pub gpg: String,
    pub rclone: String,
    pub rsync: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            md5sum: "/usr/bin/md5sum".to_string(),
            gpg: "gpg".to_string(),
            rclone: "rclone".to_string(),
            rsync: "rsync".to_string(),
        }
    }
}

impl Tools {
    /// Defaults, overridden by `OFFSITE_MD5SUM`, `OFFSITE_GPG`, `OFFSITE_RCLONE`, `OFFSITE_RSYNC`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let pick = |key: &str, default: String| lookup(key).filter(|v| !v.is_empty()).unwrap_or(default);
        Self {
            md5sum: pick("OFFSITE_MD5SUM", defaults.md5sum),
            gpg: pick("OFFSITE_GPG", defaults.gpg),
            rclone: pick("OFFSITE_RCLONE", defaults.rclone),
            rsync: pick("OFFSITE_RSYNC", defaults.rsync),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}
