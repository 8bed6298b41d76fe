//! JSON manifest listing the files a cache should hold.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::checksum::ExpectedDigest;
use crate::sync::SyncDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub remote: String,
    pub local: String,
    /// `algorithm:hex`, e.g. `sha256:9f86...`. Absent = presence check only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub files: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data).context("malformed manifest")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        Self::from_json(&data).with_context(|| format!("parsing manifest {}", path.display()))
    }

    /// Validate every entry into a descriptor, placed under `root` when given.
    pub fn descriptors(&self, root: Option<&Path>) -> Result<Vec<SyncDescriptor>> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(self.files.len());
        for (i, entry) in self.files.iter().enumerate() {
            let mut descriptor = entry
                .to_descriptor()
                .with_context(|| format!("manifest entry {} ({})", i, entry.local))?;
            if let Some(root) = root {
                descriptor.set_local_root(root);
            }
            if !seen.insert(descriptor.local_path()) {
                tracing::warn!(
                    "manifest lists {} more than once; duplicates are synced one at a time",
                    descriptor.local_path().display()
                );
            }
            out.push(descriptor);
        }
        Ok(out)
    }
}

impl ManifestEntry {
    pub fn to_descriptor(&self) -> Result<SyncDescriptor> {
        let mut descriptor = SyncDescriptor::new(&self.remote, &self.local)?;
        if let Some(checksum) = &self.checksum {
            if let Some(digest) = ExpectedDigest::parse(checksum)? {
                descriptor = descriptor.with_digest(digest);
            }
        }
        if let Some(accept) = &self.accept {
            descriptor = descriptor.with_accept(accept.clone());
        }
        Ok(descriptor)
    }
}
