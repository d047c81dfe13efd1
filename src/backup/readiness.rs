//! Waiting for a freshly written archive to settle
//!
//! The dump tool has exited by the time this runs, but file metadata can
//! lag behind. Instead of sleeping for a fixed interval, poll until the file
//! exists with the same non-zero size on two consecutive reads.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{BackupError, BackupResult};

/// How long and how often to poll
#[derive(Debug, Clone, Copy)]
pub struct SettlePolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Wait until `path` has a stable size and return it in bytes
pub fn wait_for_stable_file(path: &Path, policy: &SettlePolicy) -> BackupResult<u64> {
    let deadline = Instant::now() + policy.timeout;
    let mut previous: Option<u64> = None;

    loop {
        let current = fs::metadata(path).ok().map(|m| m.len());

        match (previous, current) {
            (Some(before), Some(now)) if before == now && now > 0 => {
                debug!(path = %path.display(), bytes = now, "Archive settled");
                return Ok(now);
            }
            _ => previous = current,
        }

        if Instant::now() >= deadline {
            return match current {
                Some(bytes) if bytes > 0 => {
                    warn!(
                        path = %path.display(),
                        bytes,
                        "Archive size still changing at settle deadline; using last reading"
                    );
                    Ok(bytes)
                }
                Some(_) => Err(BackupError::Dump(format!(
                    "archive {} is empty",
                    path.display()
                ))),
                None => Err(BackupError::Dump(format!(
                    "archive {} did not appear within {}s",
                    path.display(),
                    policy.timeout.as_secs()
                ))),
            };
        }

        thread::sleep(policy.poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn quick() -> SettlePolicy {
        SettlePolicy {
            timeout: Duration::from_millis(300),
            poll_interval: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_stable_file_returns_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.gz");
        fs::write(&path, vec![0u8; 2048]).unwrap();

        assert_eq!(wait_for_stable_file(&path, &quick()).unwrap(), 2048);
    }

    #[test]
    fn test_missing_file_times_out() {
        let dir = TempDir::new().unwrap();
        let err = wait_for_stable_file(&dir.path().join("missing.gz"), &quick()).unwrap_err();
        assert!(matches!(err, BackupError::Dump(_)));
        assert!(err.to_string().contains("did not appear"));
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.gz");
        fs::write(&path, b"").unwrap();

        let err = wait_for_stable_file(&path, &quick()).unwrap_err();
        assert!(err.to_string().contains("is empty"));
    }
}
