//! Verify/replace decision for a single file.

use std::fs;
use std::path::Path;
use std::sync::{Arc, PoisonError};

use anyhow::Context;
use serde::de::DeserializeOwned;

use super::descriptor::SyncDescriptor;
use super::locks::PathLockTable;
use crate::error::SyncError;
use crate::fetch::{CurlFetcher, Fetch, FetchRequest, TransferWatch};
use crate::storage;

/// Result of checking a local copy, optionally after replacing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Good,
    Bad,
    /// Local copy was bad, got re-fetched and now verifies.
    ReplacedGood,
    /// Re-fetched content still does not verify: the remote is corrupt or the
    /// expected digest is stale. Surface it; retrying will not help.
    ReplacedBad,
}

impl Outcome {
    pub fn is_good(self) -> bool {
        matches!(self, Outcome::Good | Outcome::ReplacedGood)
    }

    pub fn was_replaced(self) -> bool {
        matches!(self, Outcome::ReplacedGood | Outcome::ReplacedBad)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Outcome::Good => "good",
            Outcome::Bad => "bad",
            Outcome::ReplacedGood => "replaced (good)",
            Outcome::ReplacedBad => "replaced (bad)",
        })
    }
}

/// A descriptor plus the means to fetch it.
#[derive(Clone)]
pub struct SyncUnit {
    descriptor: SyncDescriptor,
    fetcher: Arc<dyn Fetch>,
    locks: Arc<PathLockTable>,
}

impl std::fmt::Debug for SyncUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncUnit")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl SyncUnit {
    /// Unit using the default curl fetcher and the global path lock table.
    pub fn new(descriptor: SyncDescriptor) -> Self {
        Self::with_fetcher(descriptor, Arc::new(CurlFetcher::default()))
    }

    pub fn with_fetcher(descriptor: SyncDescriptor, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            descriptor,
            fetcher,
            locks: PathLockTable::global(),
        }
    }

    pub fn with_lock_table(mut self, locks: Arc<PathLockTable>) -> Self {
        self.locks = locks;
        self
    }

    pub fn descriptor(&self) -> &SyncDescriptor {
        &self.descriptor
    }

    pub fn descriptor_mut(&mut self) -> &mut SyncDescriptor {
        &mut self.descriptor
    }

    /// Whether the local copy can be trusted. Read errors count as invalid.
    pub fn is_local_valid(&self) -> bool {
        let path = self.descriptor.local_path();
        let lock = self.locks.lock_for(&path);
        let _held = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.check_local(&path)
    }

    /// Fetch the remote over the local copy, unconditionally.
    pub fn fetch(&self) -> Result<(), SyncError> {
        self.fetch_watched(&TransferWatch::default())
    }

    pub fn fetch_watched(&self, watch: &TransferWatch<'_>) -> Result<(), SyncError> {
        let path = self.descriptor.local_path();
        let lock = self.locks.lock_for(&path);
        let _held = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.fetch_locked(&path, watch)
    }

    /// Fetch once when the local copy is invalid. Returns whether it fetched.
    pub fn ensure_synced(&self) -> Result<bool, SyncError> {
        self.ensure_synced_watched(&TransferWatch::default())
    }

    pub fn ensure_synced_watched(&self, watch: &TransferWatch<'_>) -> Result<bool, SyncError> {
        let path = self.descriptor.local_path();
        let lock = self.locks.lock_for(&path);
        let _held = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.check_local(&path) {
            tracing::debug!("{} is up to date", path.display());
            return Ok(false);
        }
        self.fetch_locked(&path, watch)?;
        Ok(true)
    }

    /// Check the local copy; with `replace`, re-fetch a bad copy and check again.
    /// Without `replace` nothing is written.
    pub fn verify_with_optional_replace(&self, replace: bool) -> Result<Outcome, SyncError> {
        self.verify_watched(replace, &TransferWatch::default())
    }

    pub fn verify_watched(
        &self,
        replace: bool,
        watch: &TransferWatch<'_>,
    ) -> Result<Outcome, SyncError> {
        let path = self.descriptor.local_path();
        let lock = self.locks.lock_for(&path);
        let _held = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.check_local(&path) {
            return Ok(Outcome::Good);
        }
        if !replace {
            return Ok(Outcome::Bad);
        }
        self.fetch_locked(&path, watch)?;
        let outcome = if self.check_local(&path) {
            Outcome::ReplacedGood
        } else {
            tracing::warn!(
                "{} still fails verification after re-fetching {}",
                path.display(),
                self.descriptor.remote()
            );
            Outcome::ReplacedBad
        };
        Ok(outcome)
    }

    /// Ensure the file is synced, then deserialize it as JSON.
    pub fn read_json<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        self.ensure_synced()?;
        let path = self.descriptor.local_path();
        let data = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_slice(&data).with_context(|| format!("parse {} as JSON", path.display()))
    }

    fn check_local(&self, path: &Path) -> bool {
        let Some(digest) = self.descriptor.digest() else {
            return fs::metadata(path).map(|m| m.is_file()).unwrap_or(false);
        };
        if !path.is_file() {
            return false;
        }
        match digest.matches(path) {
            Ok(matched) => {
                if !matched {
                    tracing::debug!("{} does not match {}", path.display(), digest);
                }
                matched
            }
            Err(e) => {
                let e = anyhow::Error::from(e);
                tracing::warn!("treating {} as invalid: {:#}", path.display(), e);
                false
            }
        }
    }

    fn fetch_locked(&self, path: &Path, watch: &TransferWatch<'_>) -> Result<(), SyncError> {
        storage::ensure_parent_dir(path).map_err(|e| SyncError::write(path, e))?;
        let request = FetchRequest {
            remote: self.descriptor.remote(),
            destination: path,
            accept: self.descriptor.accept(),
            watch: *watch,
        };
        let written = self.fetcher.fetch(&request)?;
        tracing::info!(
            "synced {} from {} ({} bytes)",
            path.display(),
            self.descriptor.remote(),
            written
        );
        Ok(())
    }
}
