//! Snapshot labels: `<host>_<source>_<UTC timestamp>`, or `<source>_<timestamp>`
//! for remote sources. Second granularity; two runs in the same second collide.

use chrono::{DateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Flattens a source path into a single label component.
pub fn sanitize_source(source: &str) -> String {
    source.trim_matches('/').replace('/', "_")
}

/// A colon before any path component marks `host:path` style rsync sources.
pub fn is_remote(sanitized: &str) -> bool {
    sanitized.contains(':')
}

pub fn make_label(source: &str, hostname: &str, now: DateTime<Utc>) -> String {
    let src = sanitize_source(source);
    let stamp = now.format(TIMESTAMP_FORMAT);
    if is_remote(&src) {
        format!("{}_{}", src, stamp)
    } else {
        format!("{}_{}_{}", hostname, src, stamp)
    }
}

pub fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
