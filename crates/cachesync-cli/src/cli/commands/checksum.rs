//! Checksum command: print a file's digest.

use anyhow::{bail, Result};
use cachesync_core::checksum::{self, ChecksumAlgorithm};
use std::path::Path;

/// Compute and print the digest of the given file, `sha256sum` style.
pub fn run_checksum(path: &Path, algorithm: ChecksumAlgorithm) -> Result<()> {
    if algorithm == ChecksumAlgorithm::None {
        bail!("choose a checksum algorithm other than none");
    }
    let digest = checksum::digest_path(path, algorithm)?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
