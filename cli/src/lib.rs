//! Orchestration for the `cloud-backup` and `rsync-backup` tools.

pub mod commands;
pub mod logging;
