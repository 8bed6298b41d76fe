use std::ffi::OsString;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use url::Url;

use crate::checksum::ExpectedDigest;
use crate::error::SyncError;

/// One remote → local file mapping.
///
/// The local path is relative to a root that can be changed after
/// construction, so the same descriptor can be pointed at different caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncDescriptor {
    remote: Url,
    local_relative: PathBuf,
    digest: Option<ExpectedDigest>,
    accept: Option<String>,
    local_root: Option<PathBuf>,
}

impl SyncDescriptor {
    /// `local` may use `/` or `\` as separator; both become the host separator.
    pub fn new(remote: &str, local: &str) -> Result<Self, SyncError> {
        let remote_url = Url::parse(remote).map_err(|source| SyncError::InvalidRemote {
            remote: remote.to_string(),
            source,
        })?;
        Ok(Self {
            remote: remote_url,
            local_relative: normalize_separators(local),
            digest: None,
            accept: None,
            local_root: None,
        })
    }

    /// Require content to match `digest`.
    pub fn with_digest(mut self, digest: ExpectedDigest) -> Self {
        self.digest = Some(digest);
        self
    }

    /// Send `accept` as the HTTP `Accept` header when fetching.
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_local_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.set_local_root(root);
        self
    }

    pub fn remote(&self) -> &Url {
        &self.remote
    }

    pub fn local_relative(&self) -> &Path {
        &self.local_relative
    }

    pub fn digest(&self) -> Option<&ExpectedDigest> {
        self.digest.as_ref()
    }

    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    pub fn local_root(&self) -> Option<&Path> {
        self.local_root.as_deref()
    }

    /// Relocate the descriptor under `root`. An empty root clears it.
    pub fn set_local_root(&mut self, root: impl Into<PathBuf>) {
        let root = root.into();
        self.local_root = (!root.as_os_str().is_empty()).then_some(root);
    }

    pub fn clear_local_root(&mut self) {
        self.local_root = None;
    }

    /// `root + separator + relative` when a root is set, else the relative path.
    pub fn local_path(&self) -> PathBuf {
        let Some(root) = &self.local_root else {
            return self.local_relative.clone();
        };
        let mut full = OsString::from(root.as_os_str());
        if !root.as_os_str().to_string_lossy().ends_with(MAIN_SEPARATOR) {
            full.push(MAIN_SEPARATOR.to_string());
        }
        full.push(self.local_relative.as_os_str());
        PathBuf::from(full)
    }

    /// Final component of the local path (empty when there is none).
    pub fn local_file_name(&self) -> String {
        self.local_relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn normalize_separators(local: &str) -> PathBuf {
    PathBuf::from(local.replace(['/', '\\'], &MAIN_SEPARATOR.to_string()))
}
