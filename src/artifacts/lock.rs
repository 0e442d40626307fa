//! Cross-process provisioning lock backed by an exclusively created file.
//!
//! Acquisition is `O_CREAT | O_EXCL` on a path every worker can see, which
//! makes it a compare-and-swap on the filesystem namespace. There is no
//! wake-up on release: waiters poll for the file to disappear, so all workers
//! must share the artifact directory.

use crate::error::ProvisioningError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Written into the lock file by the owner, for operators and waiters' logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockSentinel {
    pub pid: u32,
    /// Unique per acquisition, distinguishes owners within one process
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockSentinel {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            holder: uuid::Uuid::new_v4().to_string(),
            acquired_at: Utc::now(),
        }
    }
}

/// Advisory marker meaning "a download is in progress"
#[derive(Debug, Clone)]
pub struct ProvisioningLock {
    path: PathBuf,
}

impl ProvisioningLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Try to become the owner.
    ///
    /// `Ok(None)` means another process already holds the lock. Any other
    /// failure removes a half-created lock file before returning the error.
    pub fn try_acquire(&self) -> std::io::Result<Option<LockGuard>> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => {
                remove_if_exists(&self.path);
                return Err(e);
            }
        };

        let sentinel = LockSentinel::current();
        let written = serde_json::to_vec(&sentinel)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))
            .and_then(|json| file.write_all(&json))
            .and_then(|_| file.sync_all());
        if let Err(e) = written {
            remove_if_exists(&self.path);
            return Err(e);
        }

        debug!(
            path = %self.path.display(),
            pid = sentinel.pid,
            holder = %sentinel.holder,
            "Provisioning lock acquired"
        );

        Ok(Some(LockGuard {
            path: self.path.clone(),
            sentinel,
            released: false,
        }))
    }

    pub fn is_held(&self) -> bool {
        self.path.exists()
    }

    /// Current owner, if the lock exists and its sentinel is readable.
    ///
    /// The owner writes the sentinel right after creating the file, so a
    /// waiter can briefly see an empty lock.
    pub fn holder(&self) -> Option<LockSentinel> {
        let contents = std::fs::read(&self.path).ok()?;
        serde_json::from_slice(&contents).ok()
    }

    /// Poll until the lock file disappears, giving up after `timeout`
    pub async fn wait_for_release(
        &self,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Duration, ProvisioningError> {
        let started = Instant::now();

        match self.holder() {
            Some(holder) => info!(
                path = %self.path.display(),
                pid = holder.pid,
                since = %holder.acquired_at.to_rfc3339(),
                "Waiting for model download lock to be released"
            ),
            None => info!(path = %self.path.display(), "Waiting for model download lock to be released"),
        }

        while self.is_held() {
            let waited = started.elapsed();
            if waited >= timeout {
                warn!(
                    path = %self.path.display(),
                    waited_secs = waited.as_secs(),
                    "Provisioning lock never released"
                );
                return Err(ProvisioningError::WaitTimeout {
                    path: self.path.clone(),
                    waited,
                });
            }
            tokio::time::sleep(poll_interval.min(timeout - waited)).await;
        }

        let waited = started.elapsed();
        info!(waited_ms = waited.as_millis() as u64, "Lock released, proceeding to load model");
        Ok(waited)
    }
}

/// Proof of ownership. Dropping it without [`LockGuard::release`] still
/// removes the lock, so error paths never leave it behind.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    sentinel: LockSentinel,
    released: bool,
}

impl LockGuard {
    pub fn sentinel(&self) -> &LockSentinel {
        &self.sentinel
    }

    /// Remove the lock file, reporting failures
    pub fn release(mut self) -> std::io::Result<()> {
        self.released = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Lock released");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "Lock file vanished before release");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!(path = %self.path.display(), "Releasing provisioning lock after failure");
            remove_if_exists(&self.path);
        }
    }
}

fn remove_if_exists(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove provisioning lock"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ProvisioningLock::new(dir.path().join("model.lock"));

        let guard = lock.try_acquire().unwrap().expect("first acquire wins");
        assert!(lock.is_held());
        assert!(lock.try_acquire().unwrap().is_none());

        let holder = lock.holder().unwrap();
        assert_eq!(&holder, guard.sentinel());
        assert_eq!(holder.pid, std::process::id());

        guard.release().unwrap();
        assert!(!lock.is_held());
        assert!(lock.try_acquire().unwrap().is_some());
    }

    #[test]
    fn test_drop_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ProvisioningLock::new(dir.path().join("model.lock"));

        {
            let _guard = lock.try_acquire().unwrap().unwrap();
            assert!(lock.is_held());
        }
        assert!(!lock.is_held());
    }

    #[test]
    fn test_acquire_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ProvisioningLock::new(dir.path().join("missing-dir").join("model.lock"));

        let err = lock.try_acquire().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!lock.is_held());
    }

    #[tokio::test]
    async fn test_wait_returns_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ProvisioningLock::new(dir.path().join("model.lock"));
        let guard = lock.try_acquire().unwrap().unwrap();

        let releaser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            guard.release().unwrap();
        });

        let waited = lock
            .wait_for_release(Duration::from_millis(10), Duration::from_secs(5))
            .await
            .unwrap();
        releaser.await.unwrap();

        assert!(waited >= Duration::from_millis(50));
        assert!(!lock.is_held());
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ProvisioningLock::new(dir.path().join("model.lock"));
        std::fs::write(lock.path(), b"").unwrap();

        let err = lock
            .wait_for_release(Duration::from_millis(10), Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisioningError::WaitTimeout { .. }));
        assert!(lock.is_held(), "waiters never remove someone else's lock");
    }

    #[tokio::test]
    async fn test_wait_on_absent_lock_is_immediate() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ProvisioningLock::new(dir.path().join("model.lock"));

        let waited = lock
            .wait_for_release(Duration::from_secs(2), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(waited < Duration::from_secs(1));
    }
}
