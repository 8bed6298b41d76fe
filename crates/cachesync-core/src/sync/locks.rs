//! Process-wide lock table keyed by absolute local path.
//!
//! Two sync units that target the same file serialize their verify and fetch
//! steps through the same mutex, so a batch with duplicate paths fetches at
//! most once and never interleaves writes.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Entries are pruned once the table grows past this and nobody holds them.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Default)]
pub struct PathLockTable {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table shared by every unit that was not given its own.
    pub fn global() -> Arc<PathLockTable> {
        static GLOBAL: OnceLock<Arc<PathLockTable>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(PathLockTable::new())))
    }

    /// Mutex for `path`. Lock the returned value to hold the path.
    pub fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let key = canonical_key(path);
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.len() > PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Arc::clone(locks.entry(key).or_default())
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Absolute path with the deepest existing ancestor canonicalized, so
/// `a/../b` and `b` (and symlinked parents) map to the same key even before
/// the file exists. `..` below the existing ancestor is folded lexically.
pub(crate) fn canonical_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let components: Vec<Component<'_>> = absolute.components().collect();
    for split in (1..components.len()).rev() {
        let prefix: PathBuf = components[..split].iter().collect();
        if let Ok(base) = prefix.canonicalize() {
            return fold(base, &components[split..]);
        }
    }
    fold(PathBuf::new(), &components)
}

fn fold(mut key: PathBuf, tail: &[Component<'_>]) -> PathBuf {
    for component in tail {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                key.pop();
            }
            other => key.push(other),
        }
    }
    key
}
