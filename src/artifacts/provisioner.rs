//! Startup provisioning of the artifact bundle.
//!
//! Exactly one worker downloads the primary artifact while the others wait
//! on the lock file, then everybody loads the bundle from disk. A bundle that
//! fails to load gets one re-download and one more load attempt before
//! startup is abandoned.

use crate::artifacts::lock::{LockGuard, ProvisioningLock};
use crate::artifacts::source::{is_part_of, ArtifactSource};
use crate::artifacts::store::{ArtifactSet, ArtifactStore};
use crate::config::ProvisioningConfig;
use crate::error::ProvisioningError;
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    Unprovisioned,
    AcquiringLock,
    Downloading,
    Waiting,
    Loaded,
    Failed,
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisioningState::Unprovisioned => "unprovisioned",
            ProvisioningState::AcquiringLock => "acquiring_lock",
            ProvisioningState::Downloading => "downloading",
            ProvisioningState::Waiting => "waiting",
            ProvisioningState::Loaded => "loaded",
            ProvisioningState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Whether this process performed the initial download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningRole {
    Owner,
    Waiter,
}

/// Outcome of a successful provisioning run
#[derive(Debug)]
pub struct Provisioned {
    pub artifacts: ArtifactSet,
    pub role: ProvisioningRole,
    /// Downloads performed by this process, including the retry
    pub downloads: u32,
}

pub struct Provisioner<S> {
    store: ArtifactStore,
    source: S,
    lock: ProvisioningLock,
    poll_interval: Duration,
    wait_timeout: Duration,
    state: ProvisioningState,
}

impl<S: ArtifactSource> Provisioner<S> {
    /// The lock file lives next to the artifacts so every worker sharing them sees it
    pub fn new(store: ArtifactStore, source: S, config: &ProvisioningConfig) -> Self {
        let lock = ProvisioningLock::new(store.dir().join(&config.lock_file));
        Self {
            store,
            source,
            lock,
            poll_interval: config.poll_interval(),
            wait_timeout: config.wait_timeout(),
            state: ProvisioningState::Unprovisioned,
        }
    }

    pub fn state(&self) -> ProvisioningState {
        self.state
    }

    pub fn lock(&self) -> &ProvisioningLock {
        &self.lock
    }

    /// Run provisioning to completion. Meant to be called once, before serving.
    pub async fn provision(&mut self) -> Result<Provisioned, ProvisioningError> {
        match self.run().await {
            Ok(provisioned) => {
                self.transition(ProvisioningState::Loaded);
                info!(
                    role = ?provisioned.role,
                    downloads = provisioned.downloads,
                    "Model artifacts loaded successfully"
                );
                Ok(provisioned)
            }
            Err(e) => {
                self.transition(ProvisioningState::Failed);
                error!(error = %e, "Model provisioning failed");
                Err(e)
            }
        }
    }

    async fn run(&mut self) -> Result<Provisioned, ProvisioningError> {
        let mut downloads = 0;

        let role = if self.acquire_and_download().await? {
            downloads += 1;
            ProvisioningRole::Owner
        } else {
            ProvisioningRole::Waiter
        };

        let artifacts = match self.store.load_all() {
            Ok(artifacts) => artifacts,
            Err(e) => {
                warn!(
                    error = %e,
                    artifact = %e.kind(),
                    "Failed to load model artifacts, re-downloading once"
                );
                if self.acquire_and_download().await? {
                    downloads += 1;
                }
                self.store.load_all().map_err(ProvisioningError::Reload)?
            }
        };

        Ok(Provisioned {
            artifacts,
            role,
            downloads,
        })
    }

    /// Download under the lock if we can take it, otherwise wait for whoever holds it.
    ///
    /// Returns whether this process downloaded.
    async fn acquire_and_download(&mut self) -> Result<bool, ProvisioningError> {
        self.transition(ProvisioningState::AcquiringLock);

        let guard = self
            .lock
            .try_acquire()
            .map_err(|source| ProvisioningError::Lock {
                path: self.lock.path().to_path_buf(),
                source,
            })?;

        match guard {
            Some(guard) => {
                info!(lock = %self.lock.path().display(), "Acquired lock, proceeding with model download");
                self.transition(ProvisioningState::Downloading);
                self.download(guard).await?;
                Ok(true)
            }
            None => {
                self.transition(ProvisioningState::Waiting);
                self.lock
                    .wait_for_release(self.poll_interval, self.wait_timeout)
                    .await?;
                Ok(false)
            }
        }
    }

    /// Replace the primary artifact while holding the lock
    async fn download(&self, guard: LockGuard) -> Result<(), ProvisioningError> {
        let dest = self.store.primary_path();
        remove_stale(&dest)?;

        // On error the guard drops here and takes the lock file with it
        let bytes = self.source.fetch(&dest).await?;
        debug!(source = %self.source.describe(), bytes, "Primary artifact materialized");

        guard.release().map_err(|source| ProvisioningError::Lock {
            path: self.lock.path().to_path_buf(),
            source,
        })
    }

    fn transition(&mut self, next: ProvisioningState) {
        debug!(from = %self.state, to = %next, "Provisioning state transition");
        self.state = next;
    }
}

/// Delete the primary artifact and any partial downloads left by crashed owners
fn remove_stale(dest: &Path) -> Result<(), ProvisioningError> {
    let write_error = |path: &Path, source: std::io::Error| ProvisioningError::Write {
        path: path.to_path_buf(),
        source,
    };

    match std::fs::remove_file(dest) {
        Ok(()) => debug!(path = %dest.display(), "Removed previous model artifact"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(write_error(dest, e)),
    }

    let Some(dir) = dest.parent() else {
        return Ok(());
    };
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => return Err(write_error(dir, e)),
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        if is_part_of(dest, &name.to_string_lossy()) {
            let path = entry.path();
            match std::fs::remove_file(&path) {
                Ok(()) => warn!(path = %path.display(), "Removed partial download"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(write_error(&path, e)),
            }
        }
    }
    Ok(())
}
