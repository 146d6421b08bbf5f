// src/cache/mod.rs

//! On-disk metadata cache
//!
//! The cache root holds two tiers, `enabled/` and `available/`. Each tier
//! stores one YAML file per module record, named
//! `<name>-<version>-<release>.yaml`. A file is the module's `modulemd`
//! document plus a top-level `cache:` block carrying bookkeeping:
//!
//! ```yaml
//! document: modulemd
//! version: 1
//! data: { ... }
//! cache:
//!   depending-modules: [httpd]
//!   cached-time: 1700000000
//!   source-name: fedora
//!   source-url: https://modules.example.org/
//!   location: https://modules.example.org/core
//!   enabled-by-user: false
//!   needs-refetch: false
//! ```
//!
//! The enabled tier is what the host considers active (together with the
//! module's source descriptor). The available tier mirrors the last
//! listing fetched from the module sources.

mod lock;

pub use lock::CacheLock;

use crate::catalog::ModuleCatalog;
use crate::error::{Error, Result};
use crate::module::{ModuleDocument, ModuleEntry, ModuleKey};
use crate::source::SourceHandle;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extension of cache files
pub const CACHE_FILE_EXT: &str = "yaml";

/// Cache bookkeeping attached to a module record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheInfo {
    /// Modules that currently require this one, in insertion order
    #[serde(default)]
    pub depending_modules: Vec<String>,
    /// Unix timestamp of the last write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Where the module's packages and full metadata live
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub enabled_by_user: bool,
    #[serde(default)]
    pub needs_refetch: bool,
}

impl CacheInfo {
    fn add_depending(&mut self, name: &str) -> bool {
        if self.depending_modules.iter().any(|m| m == name) {
            return false;
        }
        self.depending_modules.push(name.to_string());
        true
    }

    fn remove_depending(&mut self, name: &str) -> bool {
        let before = self.depending_modules.len();
        self.depending_modules.retain(|m| m != name);
        before != self.depending_modules.len()
    }

    /// Freshness at `now` for a source whose listings expire after `expiry` seconds
    ///
    /// The window is inclusive: a record whose age equals `expiry` is still
    /// fresh and goes stale one second later.
    pub fn is_fresh_at(&self, expiry: i64, now: i64) -> bool {
        let Some(cached_time) = self.cached_time else {
            return false;
        };
        if expiry < 0 {
            return true;
        }
        now <= cached_time.saturating_add(expiry)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedDocument {
    #[serde(flatten)]
    document: ModuleDocument,
    #[serde(default)]
    cache: CacheInfo,
}

/// The two cache namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum CacheTier {
    Enabled,
    Available,
}

pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// One cache tier on disk
#[derive(Debug, Clone)]
pub struct MetadataCache {
    dir: PathBuf,
    tier: CacheTier,
}

impl MetadataCache {
    pub fn new(cache_root: &Path, tier: CacheTier) -> Self {
        Self {
            dir: cache_root.join(tier.as_ref()),
            tier,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tier(&self) -> CacheTier {
        self.tier
    }

    pub fn path_for(&self, key: &ModuleKey) -> PathBuf {
        self.dir.join(key.file_name(CACHE_FILE_EXT))
    }

    fn read_file(path: &Path) -> Result<Option<ModuleEntry>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let cached: CachedDocument = serde_yaml::from_str(&content)?;
        let descriptor = cached.document.into_descriptor()?;
        let mut entry = ModuleEntry::new(descriptor, cached.cache.location.clone().unwrap_or_default());
        entry.cache = cached.cache;
        Ok(Some(entry))
    }

    /// Read one cached record
    pub fn read(&self, key: &ModuleKey) -> Result<Option<ModuleEntry>> {
        Self::read_file(&self.path_for(key))
    }

    fn write(&self, entry: &ModuleEntry, info: &CacheInfo) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::StorageError(format!(
                "Cannot create cache directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let cached = CachedDocument {
            document: ModuleDocument::from_descriptor(&entry.descriptor),
            cache: info.clone(),
        };
        let yaml = serde_yaml::to_string(&cached)?;

        let path = self.path_for(&entry.key());
        fs::write(&path, yaml).map_err(|e| {
            Error::StorageError(format!("Cannot open cache file {}: {}", path.display(), e))
        })
    }

    /// Write `entry`, keeping the on-disk dependents and refreshing the cache time
    pub fn store(&self, entry: &ModuleEntry, enabled_by_user: bool) -> Result<CacheInfo> {
        let mut info = entry.cache.clone();

        match self.read(&entry.key()) {
            Ok(Some(existing)) => info.depending_modules = existing.cache.depending_modules,
            Ok(None) => {}
            Err(e) => warn!(
                "Ignoring unreadable cache file for {} in {} cache: {}",
                entry.key(),
                self.tier,
                e
            ),
        }

        info.cached_time = Some(now_timestamp());
        info.enabled_by_user = enabled_by_user;
        info.location = Some(entry.url.clone());
        if let Some(source) = &entry.source {
            info.source_name = Some(source.name().to_string());
            info.source_url = Some(source.url().to_string());
        }

        self.write(entry, &info)?;
        debug!("Cached {} in {} cache", entry.key(), self.tier);
        Ok(info)
    }

    /// Read every record of this tier, sorted by file name
    ///
    /// Unparsable files are skipped with a warning. With `filter_enabled_by_user`
    /// only records whose flag equals it are returned.
    pub fn load_entries<F>(
        &self,
        lookup_source: F,
        filter_enabled_by_user: Option<bool>,
    ) -> Result<Vec<ModuleEntry>>
    where
        F: Fn(&str) -> Option<SourceHandle>,
    {
        let dir_entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths: Vec<PathBuf> = dir_entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == CACHE_FILE_EXT))
            .collect();
        paths.sort();

        let mut entries = Vec::new();
        for path in paths {
            let mut entry = match Self::read_file(&path) {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping corrupt cache file {}: {}", path.display(), e);
                    continue;
                }
            };

            if let Some(wanted) = filter_enabled_by_user
                && entry.cache.enabled_by_user != wanted
            {
                continue;
            }

            if let Some(source) = entry.cache.source_name.as_deref().and_then(&lookup_source) {
                entry.source = Some(source);
            }
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Add every record of this tier to `catalog` without re-caching them
    pub fn load_into<F>(
        &self,
        catalog: &mut ModuleCatalog,
        lookup_source: F,
        filter_enabled_by_user: Option<bool>,
    ) -> Result<()>
    where
        F: Fn(&str) -> Option<SourceHandle>,
    {
        for entry in self.load_entries(lookup_source, filter_enabled_by_user)? {
            catalog.add(entry, false)?;
        }
        Ok(())
    }

    /// Record that module `name` depends on `entry`
    pub fn add_depending_mod(&self, entry: &ModuleEntry, name: &str) -> Result<()> {
        let (mut target, exists) = match self.read(&entry.key())? {
            Some(existing) => (existing, true),
            None => {
                let mut fresh = entry.clone();
                fresh.cache.depending_modules.clear();
                fresh.cache.cached_time = Some(now_timestamp());
                fresh.cache.location = Some(entry.url.clone());
                (fresh, false)
            }
        };

        if target.cache.add_depending(name) || !exists {
            debug!("{} now required by {}", entry.key(), name);
            self.write(&target, &target.cache)?;
        }
        Ok(())
    }

    /// Drop `name` from `entry`'s dependents; missing files and names are ignored
    pub fn remove_depending_mod(&self, entry: &ModuleEntry, name: &str) -> Result<()> {
        let Some(mut target) = self.read(&entry.key())? else {
            return Ok(());
        };

        if target.cache.remove_depending(name) {
            debug!("{} no longer required by {}", entry.key(), name);
            self.write(&target, &target.cache)?;
        }
        Ok(())
    }

    pub fn depending_mods(&self, key: &ModuleKey) -> Result<Vec<String>> {
        Ok(self
            .read(key)?
            .map(|e| e.cache.depending_modules)
            .unwrap_or_default())
    }

    pub fn info(&self, key: &ModuleKey) -> Result<Option<CacheInfo>> {
        Ok(self.read(key)?.map(|e| e.cache))
    }

    pub fn remove(&self, key: &ModuleKey) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed {} from {} cache", key, self.tier);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFoundError(format!(
                "{} is not in the {} cache",
                key, self.tier
            ))),
            Err(e) => Err(Error::StorageError(format!(
                "Cannot remove cache file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn is_cached(&self, key: &ModuleKey) -> bool {
        self.path_for(key).is_file()
    }

    pub fn is_valid(&self, key: &ModuleKey, expiry: i64) -> bool {
        self.is_valid_at(key, expiry, now_timestamp())
    }

    /// Freshness check against an explicit clock
    pub fn is_valid_at(&self, key: &ModuleKey, expiry: i64, now: i64) -> bool {
        match self.read(key) {
            Ok(Some(entry)) => entry.cache.is_fresh_at(expiry, now),
            _ => false,
        }
    }
}

/// Both tiers under one cache root
#[derive(Debug, Clone)]
pub struct CacheSet {
    root: PathBuf,
    pub enabled: MetadataCache,
    pub available: MetadataCache,
}

impl CacheSet {
    pub fn new(cache_root: &Path) -> Self {
        Self {
            root: cache_root.to_path_buf(),
            enabled: MetadataCache::new(cache_root, CacheTier::Enabled),
            available: MetadataCache::new(cache_root, CacheTier::Available),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleDescriptor;
    use tempfile::TempDir;

    fn core_entry() -> ModuleEntry {
        let mut desc = ModuleDescriptor::new("core", "1.0", "1");
        desc.summary = "Core module".to_string();
        ModuleEntry::new(desc, "file:///srv/modules/core")
    }

    fn write_with_time(cache: &MetadataCache, cached_time: i64) -> ModuleKey {
        let entry = core_entry();
        let mut info = cache.store(&entry, false).unwrap();
        info.cached_time = Some(cached_time);
        cache.write(&entry, &info).unwrap();
        entry.key()
    }

    #[test]
    fn test_tier_directories() {
        let tmp = TempDir::new().unwrap();
        let caches = CacheSet::new(tmp.path());
        assert_eq!(caches.enabled.dir(), tmp.path().join("enabled"));
        assert_eq!(caches.available.dir(), tmp.path().join("available"));
    }

    #[test]
    fn test_store_and_read_back() {
        let tmp = TempDir::new().unwrap();
        let cache = MetadataCache::new(tmp.path(), CacheTier::Enabled);
        let entry = core_entry();

        let info = cache.store(&entry, true).unwrap();
        assert!(info.enabled_by_user);
        assert!(info.cached_time.is_some());
        assert!(cache.is_cached(&entry.key()));
        assert!(tmp.path().join("enabled/core-1.0-1.yaml").is_file());

        let back = cache.read(&entry.key()).unwrap().unwrap();
        assert_eq!(back.descriptor, entry.descriptor);
        assert_eq!(back.url, "file:///srv/modules/core");
        assert!(back.enabled_by_user());
    }

    #[test]
    fn test_store_preserves_depending_modules() {
        let tmp = TempDir::new().unwrap();
        let cache = MetadataCache::new(tmp.path(), CacheTier::Enabled);
        let entry = core_entry();

        cache.add_depending_mod(&entry, "apr").unwrap();
        cache.store(&entry, false).unwrap();
        assert_eq!(cache.depending_mods(&entry.key()).unwrap(), vec!["apr"]);
    }

    #[test]
    fn test_add_depending_mod_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let cache = MetadataCache::new(tmp.path(), CacheTier::Enabled);
        let entry = core_entry();
        cache.store(&entry, false).unwrap();

        cache.add_depending_mod(&entry, "apr").unwrap();
        cache.add_depending_mod(&entry, "apr").unwrap();
        cache.add_depending_mod(&entry, "httpd").unwrap();
        assert_eq!(
            cache.depending_mods(&entry.key()).unwrap(),
            vec!["apr", "httpd"]
        );
    }

    #[test]
    fn test_remove_depending_mod_noop_cases() {
        let tmp = TempDir::new().unwrap();
        let cache = MetadataCache::new(tmp.path(), CacheTier::Enabled);
        let entry = core_entry();

        // missing file
        cache.remove_depending_mod(&entry, "apr").unwrap();
        assert!(!cache.is_cached(&entry.key()));

        cache.add_depending_mod(&entry, "apr").unwrap();
        cache.remove_depending_mod(&entry, "httpd").unwrap();
        assert_eq!(cache.depending_mods(&entry.key()).unwrap(), vec!["apr"]);
        cache.remove_depending_mod(&entry, "apr").unwrap();
        assert!(cache.depending_mods(&entry.key()).unwrap().is_empty());
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let cache = MetadataCache::new(tmp.path(), CacheTier::Available);
        let err = cache.remove(&core_entry().key()).unwrap_err();
        assert!(matches!(err, Error::NotFoundError(_)));
    }

    #[test]
    fn test_freshness_window() {
        let tmp = TempDir::new().unwrap();
        let cache = MetadataCache::new(tmp.path(), CacheTier::Available);
        let cached_at = 1_000_000;
        let key = write_with_time(&cache, cached_at);
        let expiry = 3600;

        assert!(cache.is_valid_at(&key, expiry, cached_at));
        assert!(cache.is_valid_at(&key, expiry, cached_at + expiry - 1));
        assert!(!cache.is_valid_at(&key, expiry, cached_at + expiry + 1));
        assert!(!cache.is_valid_at(&key, expiry, cached_at + 10 * 365 * 86400));
    }

    #[test]
    fn test_fresh_at_exact_expiry() {
        let info = CacheInfo {
            cached_time: Some(1_000),
            ..Default::default()
        };
        assert!(info.is_fresh_at(60, 1_059));
        assert!(info.is_fresh_at(60, 1_060));
        assert!(!info.is_fresh_at(60, 1_061));
        assert!(info.is_fresh_at(0, 1_000));
        assert!(!info.is_fresh_at(0, 1_001));
    }

    #[test]
    fn test_never_expire_sentinel() {
        let tmp = TempDir::new().unwrap();
        let cache = MetadataCache::new(tmp.path(), CacheTier::Available);
        let key = write_with_time(&cache, 0);
        assert!(cache.is_valid_at(&key, -1, i64::MAX / 2));
    }

    #[test]
    fn test_missing_cached_time_is_never_valid() {
        let info = CacheInfo::default();
        assert!(!info.is_fresh_at(-1, 0));
        assert!(!info.is_fresh_at(3600, 0));
    }

    #[test]
    fn test_uncached_is_never_valid() {
        let tmp = TempDir::new().unwrap();
        let cache = MetadataCache::new(tmp.path(), CacheTier::Available);
        assert!(!cache.is_valid(&core_entry().key(), -1));
    }

    #[test]
    fn test_load_skips_corrupt_and_filters() {
        let tmp = TempDir::new().unwrap();
        let cache = MetadataCache::new(tmp.path(), CacheTier::Enabled);

        cache.store(&core_entry(), false).unwrap();
        let apr = ModuleEntry::new(ModuleDescriptor::new("apr", "0.1", "1"), "file:///m/apr");
        cache.store(&apr, true).unwrap();
        fs::write(cache.dir().join("broken-1-1.yaml"), "data: [not a module").unwrap();
        fs::write(cache.dir().join("notes.txt"), "ignored").unwrap();

        let all = cache.load_entries(|_| None, None).unwrap();
        let names: Vec<&str> = all.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["apr", "core"]);

        let user = cache.load_entries(|_| None, Some(true)).unwrap();
        assert_eq!(user.len(), 1);
        assert_eq!(user[0].name(), "apr");

        let pulled = cache.load_entries(|_| None, Some(false)).unwrap();
        assert_eq!(pulled.len(), 1);
        assert_eq!(pulled[0].name(), "core");
    }

    #[test]
    #[cfg(unix)]
    fn test_store_into_readonly_dir_is_storage_error() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let cache = MetadataCache::new(tmp.path(), CacheTier::Enabled);
        fs::create_dir_all(cache.dir()).unwrap();
        fs::set_permissions(cache.dir(), fs::Permissions::from_mode(0o555)).unwrap();

        // root ignores directory permissions
        if fs::write(cache.dir().join("probe"), "x").is_ok() {
            return;
        }

        let err = cache.store(&core_entry(), false).unwrap_err();
        assert!(matches!(err, Error::StorageError(_)));
    }
}
