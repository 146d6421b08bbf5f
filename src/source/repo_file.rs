// src/source/repo_file.rs

//! Source descriptors: the files that mark a module as enabled
//!
//! Each enabled module gets a repository definition the package manager
//! reads, `<dir>/<prefix>_<module>.repo`:
//!
//! ```text
//! [_modman_httpd]
//! name=Modularization repository for httpd
//! baseurl=https://modules.example.org/httpd
//! gpgcheck=0
//! priority=50
//! enabled=1
//! ```

use crate::error::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Priority written into every descriptor
pub const DESCRIPTOR_PRIORITY: u32 = 50;

/// Creates, removes and checks module source descriptors
pub trait SourceDescriptorStore {
    /// Identifier of the package source serving `module`
    fn source_id(&self, module: &str) -> String;

    fn create(&self, module: &str, base_url: &str) -> Result<()>;

    fn remove(&self, module: &str) -> Result<()>;

    fn exists(&self, module: &str) -> bool;
}

/// `.repo` files in a repository directory
#[derive(Debug, Clone)]
pub struct RepoFileStore {
    dir: PathBuf,
    prefix: String,
}

impl RepoFileStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, module: &str) -> PathBuf {
        self.dir.join(format!("{}.repo", self.source_id(module)))
    }

    fn render(&self, module: &str, base_url: &str) -> String {
        format!(
            "[{id}]\nname=Modularization repository for {module}\nbaseurl={base_url}\ngpgcheck=0\npriority={DESCRIPTOR_PRIORITY}\nenabled=1\n",
            id = self.source_id(module),
        )
    }
}

#[cfg(unix)]
fn set_mode(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl SourceDescriptorStore for RepoFileStore {
    fn source_id(&self, module: &str) -> String {
        format!("{}_{}", self.prefix, module)
    }

    fn create(&self, module: &str, base_url: &str) -> Result<()> {
        let path = self.path_for(module);
        let storage_err = |e: std::io::Error| {
            Error::StorageError(format!("Cannot write {}: {}", path.display(), e))
        };

        fs::create_dir_all(&self.dir).map_err(storage_err)?;
        fs::write(&path, self.render(module, base_url)).map_err(storage_err)?;
        set_mode(&path).map_err(storage_err)?;

        debug!("Created source descriptor {}", path.display());
        Ok(())
    }

    fn remove(&self, module: &str) -> Result<()> {
        let path = self.path_for(module);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed source descriptor {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::StorageError(format!(
                "Cannot remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn exists(&self, module: &str) -> bool {
        self.path_for(module).is_file()
    }
}
