// src/source/mod.rs

//! Module sources and the registry that merges them
//!
//! A module source lists the modules it offers and serves their full
//! metadata. The [`SourceRegistry`] owns every configured source together
//! with the metadata cache and decides when listings must be refetched:
//!
//! - `list_modules` serves the available cache while every record in it is
//!   fresh, otherwise refetches from all sources and prunes records that
//!   disappeared upstream
//! - `info_modules` does the same for one module and replaces listing
//!   stubs with full metadata
//! - `load_enabled` / `load_all` give the views lifecycle commands need

mod repo_file;
mod url;

pub use repo_file::{RepoFileStore, SourceDescriptorStore};
pub use self::url::UrlModuleSource;

use crate::cache::CacheSet;
use crate::catalog::ModuleCatalog;
use crate::config::ModmanConfig;
use crate::error::{Error, Result};
use crate::module::{ModuleDescriptor, ModuleEntry};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A place module metadata comes from
pub trait ModuleSource: Send + Sync {
    fn name(&self) -> &str;

    fn url(&self) -> &str;

    /// Every module record offered, unattributed. Records built from a
    /// lightweight listing are marked as needing a refetch.
    fn list(&self) -> Result<Vec<ModuleEntry>>;

    /// Full descriptor at `locator`; `NotFoundError` when there is none,
    /// `ParseError` when it cannot be read
    fn fetch_full_metadata(&self, locator: &str) -> Result<ModuleDescriptor>;

    /// Seconds cached listings stay fresh; `-1` never expires
    fn metadata_expiry(&self) -> i64;
}

/// Shared handle to a module source
pub type SourceHandle = Arc<dyn ModuleSource>;

/// All configured module sources plus the metadata cache
pub struct SourceRegistry {
    sources: Vec<SourceHandle>,
    caches: CacheSet,
}

impl SourceRegistry {
    pub fn new(caches: CacheSet) -> Self {
        Self {
            sources: Vec::new(),
            caches,
        }
    }

    /// Build the registry described by `config`, skipping disabled sources
    pub fn from_config(config: &ModmanConfig) -> Result<Self> {
        let mut registry = Self::new(CacheSet::new(&config.cache_dir));
        for source in config.load_sources()? {
            if !source.enabled {
                debug!("Source {} is disabled", source.name);
                continue;
            }
            registry.add(Arc::new(UrlModuleSource::new(&source)));
        }
        Ok(registry)
    }

    pub fn add(&mut self, source: SourceHandle) {
        self.sources.push(source);
    }

    pub fn sources(&self) -> &[SourceHandle] {
        &self.sources
    }

    pub fn caches(&self) -> &CacheSet {
        &self.caches
    }

    pub fn lookup(&self, name: &str) -> Option<SourceHandle> {
        self.sources.iter().find(|s| s.name() == name).cloned()
    }

    /// Catalog backed by the available cache tier
    pub fn new_catalog(&self) -> ModuleCatalog {
        ModuleCatalog::new(self.caches.available.clone())
    }

    /// Whatever the available tier holds, fresh or not
    pub fn load_cached(&self) -> Result<ModuleCatalog> {
        let mut catalog = self.new_catalog();
        self.caches
            .available
            .load_into(&mut catalog, |name| self.lookup(name), None)?;
        Ok(catalog)
    }

    /// Refetch every source and merge the listings
    ///
    /// Stale cache records are pruned only when every source answered, so
    /// one unreachable source does not wipe its modules from the cache.
    pub fn fetch(&self) -> Result<ModuleCatalog> {
        let mut merged = self.new_catalog();
        let mut first_error = None;
        let mut answered = 0;

        for source in &self.sources {
            info!("Fetching module list from {}", source.name());
            let listed = match source.list() {
                Ok(listed) => listed,
                Err(e) => {
                    warn!("Cannot list modules from {}: {}", source.name(), e);
                    first_error.get_or_insert(e);
                    continue;
                }
            };

            let mut part = self.new_catalog();
            for entry in listed {
                part.add(entry.with_source(Arc::clone(source)), true)?;
            }
            debug!("{} offers {} module records", source.name(), part.len());
            merged.merge(part);
            answered += 1;
        }

        if answered == 0
            && let Some(e) = first_error
        {
            return Err(e);
        }

        if answered == self.sources.len() {
            merged.remove_stale(&self.caches.available)?;
        }
        Ok(merged)
    }

    /// Available modules, from cache while fresh
    pub fn list_modules(&self, ignore_cache: bool) -> Result<ModuleCatalog> {
        let cached = if ignore_cache {
            None
        } else {
            let cached = self.load_cached()?;
            if cached.is_cache_valid(None) {
                debug!("Serving module list from cache");
                return Ok(cached);
            }
            info!("Modules cache expired, trying to refetch the modules list");
            Some(cached)
        };

        match self.fetch() {
            Ok(catalog) => Ok(catalog),
            Err(e) => match cached {
                Some(cached) if !cached.is_empty() => {
                    warn!("Using expired module cache: {}", e);
                    Ok(cached)
                }
                _ => Err(e),
            },
        }
    }

    /// Catalog with full metadata for every record of `name`
    pub fn info_modules(&self, name: &str) -> Result<ModuleCatalog> {
        let cached = self.load_cached()?;
        let mut catalog = if cached.is_cache_valid(Some(name)) {
            cached
        } else {
            self.list_modules(true).or_else(|e| {
                if cached.contains(name) {
                    warn!("Using expired cache for {}: {}", name, e);
                    Ok(cached)
                } else {
                    Err(e)
                }
            })?
        };

        catalog.refresh_metadata(name)?;
        Ok(catalog)
    }

    /// Enabled-tier records; `Some(true)` keeps only user-enabled ones
    pub fn load_enabled(&self, filter_enabled_by_user: Option<bool>) -> Result<ModuleCatalog> {
        let mut catalog = ModuleCatalog::detached();
        self.caches.enabled.load_into(
            &mut catalog,
            |name| self.lookup(name),
            filter_enabled_by_user,
        )?;
        Ok(catalog)
    }

    /// Available modules plus enabled records no source offers any more
    pub fn load_all(&self) -> Result<ModuleCatalog> {
        let mut catalog = match self.list_modules(false) {
            Ok(catalog) => catalog,
            Err(Error::ApiError(e)) | Err(Error::DownloadError(e)) => {
                warn!("No module listing available: {}", e);
                self.new_catalog()
            }
            Err(e) => return Err(e),
        };

        for entry in self
            .caches
            .enabled
            .load_entries(|name| self.lookup(name), None)?
        {
            if catalog.find(&entry.key()).is_none() {
                debug!("{} is enabled but no longer offered", entry.key());
                catalog.add(entry, false)?;
            }
        }
        Ok(catalog)
    }

    /// Forced refetch of every source
    pub fn refresh(&self) -> Result<ModuleCatalog> {
        self.fetch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheSet;
    use crate::module::ModuleKey;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct StaticSource {
        name: String,
        modules: Mutex<Vec<ModuleEntry>>,
        fail: bool,
        expiry: i64,
        calls: AtomicUsize,
    }

    impl StaticSource {
        fn new(name: &str, modules: Vec<ModuleEntry>, expiry: i64) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                modules: Mutex::new(modules),
                fail: false,
                expiry,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                modules: Mutex::new(Vec::new()),
                fail: true,
                expiry: 60,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl ModuleSource for StaticSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn url(&self) -> &str {
            "memory://"
        }

        fn list(&self) -> Result<Vec<ModuleEntry>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::ApiError("unreachable".to_string()));
            }
            Ok(self.modules.lock().unwrap().clone())
        }

        fn fetch_full_metadata(&self, locator: &str) -> Result<ModuleDescriptor> {
            let name = locator.trim_start_matches("memory://");
            let mut desc = ModuleDescriptor::new(name, "1.0", "1");
            desc.description = "full".to_string();
            Ok(desc)
        }

        fn metadata_expiry(&self) -> i64 {
            self.expiry
        }
    }

    fn entry(name: &str, version: &str, release: &str) -> ModuleEntry {
        ModuleEntry::new(
            ModuleDescriptor::new(name, version, release),
            format!("memory://{}", name),
        )
    }

    #[test]
    fn test_list_uses_cache_while_fresh() {
        let tmp = TempDir::new().unwrap();
        let source = StaticSource::new("s", vec![entry("core", "1.0", "1")], -1);
        let mut registry = SourceRegistry::new(CacheSet::new(tmp.path()));
        registry.add(source.clone());

        assert_eq!(registry.list_modules(false).unwrap().len(), 1);
        assert_eq!(registry.list_modules(false).unwrap().len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        registry.list_modules(true).unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_refetch_prunes_vanished_modules() {
        let tmp = TempDir::new().unwrap();
        let source = StaticSource::new(
            "s",
            vec![entry("core", "1.0", "1"), entry("old", "1.0", "1")],
            -1,
        );
        let mut registry = SourceRegistry::new(CacheSet::new(tmp.path()));
        registry.add(source.clone());
        registry.refresh().unwrap();

        source.modules.lock().unwrap().retain(|e| e.name() != "old");
        let catalog = registry.refresh().unwrap();
        assert!(!catalog.contains("old"));
        assert!(!registry
            .caches()
            .available
            .is_cached(&ModuleKey::new("old", "1.0", "1")));
    }

    #[test]
    fn test_failed_source_falls_back_to_expired_cache() {
        let tmp = TempDir::new().unwrap();
        let caches = CacheSet::new(tmp.path());
        let mut seeded = entry("core", "1.0", "1");
        seeded.cache.source_name = Some("down".to_string());
        caches.available.store(&seeded, false).unwrap();

        // age the record past the source's expiry
        let path = caches.available.path_for(&seeded.key());
        let aged: String = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|l| {
                if l.trim_start().starts_with("cached-time:") {
                    "  cached-time: 0".to_string()
                } else {
                    l.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(&path, aged).unwrap();

        let mut registry = SourceRegistry::new(caches);
        registry.add(StaticSource::failing("down"));

        assert!(!registry.load_cached().unwrap().is_cache_valid(None));
        let catalog = registry.list_modules(false).unwrap();
        assert!(catalog.contains("core"));
        assert!(registry.list_modules(true).is_err());
    }

    #[test]
    fn test_all_sources_failing_is_error() {
        let tmp = TempDir::new().unwrap();
        let mut registry = SourceRegistry::new(CacheSet::new(tmp.path()));
        registry.add(StaticSource::failing("a"));
        assert!(matches!(registry.list_modules(false), Err(Error::ApiError(_))));
    }

    #[test]
    fn test_one_failing_source_keeps_others_and_cache() {
        let tmp = TempDir::new().unwrap();
        let caches = CacheSet::new(tmp.path());
        caches.available.store(&entry("kept", "1.0", "1"), false).unwrap();

        let mut registry = SourceRegistry::new(caches);
        registry.add(StaticSource::new("ok", vec![entry("core", "1.0", "1")], 60));
        registry.add(StaticSource::failing("down"));

        let catalog = registry.refresh().unwrap();
        assert!(catalog.contains("core"));
        assert!(registry
            .caches()
            .available
            .is_cached(&ModuleKey::new("kept", "1.0", "1")));
    }

    #[test]
    fn test_info_replaces_stub_with_full_metadata() {
        let tmp = TempDir::new().unwrap();
        let stub = entry("core", "1.0", "1").needing_refetch();
        let mut registry = SourceRegistry::new(CacheSet::new(tmp.path()));
        registry.add(StaticSource::new("s", vec![stub], -1));

        let catalog = registry.info_modules("core").unwrap();
        let core = &catalog.entries("core")[0];
        assert!(core.has_full_metadata());
        assert_eq!(core.descriptor.description, "full");

        let cached = registry.load_cached().unwrap();
        assert!(cached.entries("core")[0].has_full_metadata());
    }

    #[test]
    fn test_load_all_includes_orphaned_enabled_records() {
        let tmp = TempDir::new().unwrap();
        let caches = CacheSet::new(tmp.path());
        caches.enabled.store(&entry("legacy", "0.9", "1"), true).unwrap();

        let mut registry = SourceRegistry::new(caches);
        registry.add(StaticSource::new("s", vec![entry("core", "1.0", "1")], 60));

        let catalog = registry.load_all().unwrap();
        assert!(catalog.contains("core"));
        assert!(catalog.contains("legacy"));
    }

    #[test]
    fn test_load_enabled_filter() {
        let tmp = TempDir::new().unwrap();
        let caches = CacheSet::new(tmp.path());
        caches.enabled.store(&entry("httpd", "2.4.18", "1"), true).unwrap();
        caches.enabled.store(&entry("core", "1.0", "1"), false).unwrap();
        let registry = SourceRegistry::new(caches);

        assert_eq!(registry.load_enabled(Some(true)).unwrap().names(), &["httpd"]);
        assert_eq!(registry.load_enabled(None).unwrap().len(), 2);
    }
}
