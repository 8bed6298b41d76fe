//! Temp-file lifecycle for fetches.
//!
//! A fetch writes into `<dest>.part` and only renames over the destination once
//! the transfer succeeded, so readers never observe a half-written file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `pack.json` → `pack.json.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Create every missing directory above `path`.
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Sequential writer for one in-progress download.
#[derive(Debug)]
pub struct PartFile {
    file: File,
    temp_path: PathBuf,
    written: u64,
}

impl PartFile {
    /// Create (or truncate) the temp file for `final_path`, creating parent directories.
    pub fn create(final_path: &Path) -> io::Result<Self> {
        ensure_parent_dir(final_path)?;
        let temp_path = temp_path(final_path);
        let file = File::create(&temp_path)?;
        Ok(Self {
            file,
            temp_path,
            written: 0,
        })
    }

    pub fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Flush, sync and rename over `final_path`, replacing any existing file.
    pub fn finalize(self, final_path: &Path) -> io::Result<u64> {
        let PartFile {
            mut file,
            temp_path,
            written,
        } = self;
        file.flush()?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, final_path)?;
        Ok(written)
    }

    /// Remove the temp file after a failed transfer.
    pub fn discard(self) {
        let temp_path = self.temp_path.clone();
        drop(self.file);
        if let Err(e) = fs::remove_file(&temp_path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("could not remove {}: {}", temp_path.display(), e);
            }
        }
    }
}
