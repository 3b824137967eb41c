//! Advisory migration lock.
//!
//! Mutual exclusion between processes is signalled by the atomic creation
//! of a directory under `.lg-cache/locks/<scope-hash>/`. The directory
//! holds a `lock.json` with the owner's pid and start time; entries older
//! than the stale threshold may be stolen, recording the previous owner.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::MigrationError;

/// Metadata stored inside the lock directory.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub(crate) struct LockInfo {
    /// Pid of the owning process.
    pub pid: u32,
    /// Seconds since the Unix epoch when the lock was taken.
    pub started_at: u64,
    /// Set when a stale lock was stolen: when the steal happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovered_at: Option<u64>,
    /// Set when a stale lock was stolen: the previous owner's pid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovered_from_pid: Option<u32>,
}

/// Advisory lock over one scope's migration run.
#[derive(Debug)]
pub struct MigrationLock {
    /// Directory whose existence is the lock.
    lock_dir: PathBuf,
    /// Age in seconds after which a lock is considered abandoned.
    stale_seconds: u64,
    /// Hard ceiling on waiting for a sibling to finish.
    wait_timeout: Duration,
    /// Whether this instance currently holds the lock.
    acquired: bool,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl MigrationLock {
    /// Creates a lock handle (does not acquire).
    pub fn new(lock_dir: PathBuf, stale_seconds: u64, wait_timeout: Duration) -> Self {
        Self {
            lock_dir,
            stale_seconds,
            wait_timeout,
            acquired: false,
        }
    }

    /// The lock directory path.
    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }

    /// Whether this instance holds the lock.
    pub fn acquired(&self) -> bool {
        self.acquired
    }

    /// Attempts to take the lock without waiting.
    ///
    /// Returns true on success. A stale lock (older than the threshold) is
    /// stolen, recording the previous owner's pid in the lock metadata.
    pub fn try_acquire(&mut self) -> bool {
        if let Some(parent) = self.lock_dir.parent() {
            if fs::create_dir_all(parent).is_err() {
                // Cache directory unusable: proceed unlocked rather than
                // blocking the run.
                self.acquired = true;
                return true;
            }
        }

        if fs::create_dir(&self.lock_dir).is_ok() {
            self.write_info(&LockInfo {
                pid: std::process::id(),
                started_at: now_secs(),
                ..LockInfo::default()
            });
            self.acquired = true;
            return true;
        }

        // The directory exists: check for staleness.
        let info = self.read_info();
        let age = now_secs().saturating_sub(info.started_at);
        if info.started_at > 0 && age <= self.stale_seconds {
            return false;
        }
        // Also treat a lock without readable metadata as stale only after
        // the threshold has passed since the directory appeared.
        if info.started_at == 0 && !self.dir_older_than_stale() {
            return false;
        }

        tracing::warn!(
            previous_pid = info.pid,
            age_secs = age,
            "stealing stale migration lock"
        );
        self.write_info(&LockInfo {
            pid: std::process::id(),
            started_at: now_secs(),
            recovered_at: Some(now_secs()),
            recovered_from_pid: Some(info.pid),
        });
        self.acquired = true;
        true
    }

    /// Waits for the lock holder to finish (lock directory to disappear).
    ///
    /// Polls with exponential backoff; errors with [`MigrationError::Timeout`]
    /// once the configured ceiling is reached.
    pub fn wait_for_completion(&self) -> Result<(), MigrationError> {
        let start = Instant::now();
        let mut delay = Duration::from_millis(50);
        loop {
            if !self.lock_dir.exists() {
                // Double-check after a short pause: the holder may be
                // between release and state write.
                thread::sleep(Duration::from_millis(50));
                if !self.lock_dir.exists() {
                    return Ok(());
                }
            }
            if start.elapsed() >= self.wait_timeout {
                return Err(MigrationError::Timeout {
                    waited_secs: start.elapsed().as_secs(),
                });
            }
            thread::sleep(delay);
            delay = (delay * 2).min(Duration::from_secs(2));
        }
    }

    /// Releases the lock. Idempotent.
    pub fn release(&mut self) {
        let _ = fs::remove_dir_all(&self.lock_dir);
        self.acquired = false;
    }

    fn info_path(&self) -> PathBuf {
        self.lock_dir.join("lock.json")
    }

    pub(crate) fn read_info(&self) -> LockInfo {
        fs::read_to_string(self.info_path())
            .ok()
            .and_then(|data| serde_json::from_str(&data).ok())
            .unwrap_or_default()
    }

    fn write_info(&self, info: &LockInfo) {
        if let Ok(data) = serde_json::to_string(info) {
            let _ = fs::write(self.info_path(), data);
        }
    }

    fn dir_older_than_stale(&self) -> bool {
        let Ok(meta) = self.lock_dir.metadata() else {
            return true;
        };
        let Ok(modified) = meta.modified() else {
            return true;
        };
        modified
            .elapsed()
            .map(|age| age.as_secs() > self.stale_seconds)
            .unwrap_or(true)
    }
}

impl Drop for MigrationLock {
    fn drop(&mut self) {
        if self.acquired {
            self.release();
        }
    }
}
