// src/cache/lock.rs

//! Exclusive lock on the cache root
//!
//! Lifecycle commands rewrite cache files and source descriptors in several
//! steps. Holding `<cache_dir>/.modman.lock` for the whole command keeps two
//! invocations from interleaving those steps.
//!
//! ```ignore
//! let _lock = CacheLock::acquire(&config.cache_dir)?;
//! orchestrator.execute(Action::Enable, "httpd")?;
//! // released on drop
//! ```

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lock file name inside the cache root
pub const LOCK_FILE_NAME: &str = ".modman.lock";

/// Exclusive `flock` held for the lifetime of the value
pub struct CacheLock {
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl CacheLock {
    fn open(cache_root: &Path) -> Result<(File, PathBuf)> {
        fs::create_dir_all(cache_root).map_err(|e| {
            Error::StorageError(format!(
                "Cannot create cache directory {}: {}",
                cache_root.display(),
                e
            ))
        })?;
        let path = cache_root.join(LOCK_FILE_NAME);
        let file = File::create(&path)?;
        Ok((file, path))
    }

    /// Block until the lock is ours
    pub fn acquire(cache_root: &Path) -> Result<Self> {
        let (file, path) = Self::open(cache_root)?;

        file.lock_exclusive()
            .map_err(|e| Error::IoError(format!("Failed to lock {}: {}", path.display(), e)))?;

        info!("Acquired cache lock at {}", path.display());
        Ok(Self { file, path })
    }

    /// Take the lock if nobody holds it
    #[cfg(test)]
    fn try_acquire(cache_root: &Path) -> Result<Option<Self>> {
        let (file, path) = Self::open(cache_root)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                info!("Acquired cache lock at {}", path.display());
                Ok(Some(Self { file, path }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                debug!("Cache lock already held at {}", path.display());
                Ok(None)
            }
            Err(e) => Err(Error::IoError(format!(
                "Failed to try-lock {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        debug!("Released cache lock at {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_creates_lock_file() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("cache");
        let lock = CacheLock::acquire(&root).unwrap();
        assert!(lock.path().exists());
        assert_eq!(lock.path(), root.join(LOCK_FILE_NAME));
    }

    #[test]
    fn test_second_lock_is_refused_while_held() {
        let tmp = TempDir::new().unwrap();
        let _held = CacheLock::acquire(tmp.path()).unwrap();
        assert!(CacheLock::try_acquire(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let tmp = TempDir::new().unwrap();
        drop(CacheLock::acquire(tmp.path()).unwrap());
        assert!(CacheLock::try_acquire(tmp.path()).unwrap().is_some());
    }
}
