//! Where file content comes from and goes to.
//!
//! The repository only talks to a [`FileStore`]. [`FsStore`] is the real
//! filesystem under a root directory; [`MemoryStore`] keeps everything in
//! memory for tests and dry runs.

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::lock;

/// Directory under the root holding marktask's own state
pub const STATE_DIR: &str = ".marktask";

/// Read/write access to documents by repository-relative path
pub trait FileStore: Send + Sync {
    fn read(&self, path: &Path) -> Result<String>;

    /// Replace the whole content, creating the file if needed
    fn write(&self, path: &Path, content: &str) -> Result<()>;

    /// Remove the file; removing a missing file is not an error
    fn delete(&self, path: &Path) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

/// Files under a root directory, written atomically under a lock
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    timeout_ms: u64,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            timeout_ms: lock::DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn lock_path(&self, path: &Path) -> PathBuf {
        let digest = hex::encode(Sha256::digest(path.to_string_lossy().as_bytes()));
        self.root
            .join(STATE_DIR)
            .join("locks")
            .join(format!("{}.lock", &digest[..16]))
    }

    /// Repository-relative paths matching the glob patterns, sorted and
    /// without duplicates
    pub fn discover(&self, patterns: &[String]) -> Result<Vec<PathBuf>> {
        let mut found = std::collections::BTreeSet::new();
        for pattern in patterns {
            let absolute = self.root.join(pattern);
            let entries = glob::glob(&absolute.to_string_lossy())
                .map_err(|e| Error::InvalidArgument(format!("glob '{pattern}': {e}")))?;
            for entry in entries {
                let path = entry.map_err(|e| Error::Io(e.into()))?;
                if !path.is_file() {
                    continue;
                }
                if let Ok(relative) = path.strip_prefix(&self.root) {
                    if !relative.starts_with(STATE_DIR) {
                        found.insert(relative.to_path_buf());
                    }
                }
            }
        }
        Ok(found.into_iter().collect())
    }
}

impl FileStore for FsStore {
    fn read(&self, path: &Path) -> Result<String> {
        lock::read_locked(self.resolve(path), self.lock_path(path), self.timeout_ms)
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        lock::write_atomic_locked(
            self.resolve(path),
            content.as_bytes(),
            self.lock_path(path),
            self.timeout_ms,
        )
    }

    fn delete(&self, path: &Path) -> Result<()> {
        lock::remove_locked(self.resolve(path), self.lock_path(path), self.timeout_ms)
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).is_file()
    }
}

/// In-memory documents
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<PathBuf, String>>,
    failing: Mutex<HashSet<PathBuf>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.into(), content.into());
        self
    }

    /// Make every write to `path` fail with an I/O error
    pub fn fail_writes_to(&self, path: impl Into<PathBuf>) {
        self.failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.into());
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn content(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(path.as_ref())
            .cloned()
    }
}

impl FileStore for MemoryStore {
    fn read(&self, path: &Path) -> Result<String> {
        self.content(path).ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            ))
        })
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(path);
        if failing {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is read-only", path.display()),
            )));
        }
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<()> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(path);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(path)
    }
}
