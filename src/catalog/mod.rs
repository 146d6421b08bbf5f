// src/catalog/mod.rs

//! In-memory module catalog
//!
//! The catalog is the working set of one command: an ordered mapping from
//! module name to every known record of that module. Name order is the
//! order names were first added, which is what listings show.

mod search;

pub use search::{search, CompareOp, SearchFilter, SearchQuery};

use crate::cache::MetadataCache;
use crate::error::{Error, Result};
use crate::module::{ModuleEntry, ModuleKey};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Ordered name → records mapping
#[derive(Debug, Clone, Default)]
pub struct ModuleCatalog {
    names: Vec<String>,
    entries: HashMap<String, Vec<ModuleEntry>>,
    /// Available-tier cache that `add` writes through to
    available_cache: Option<MetadataCache>,
}

impl ModuleCatalog {
    /// A catalog that caches added records in `available_cache`
    pub fn new(available_cache: MetadataCache) -> Self {
        Self {
            available_cache: Some(available_cache),
            ..Self::default()
        }
    }

    /// A catalog with no cache behind it (scratch views, search results)
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Module names in insertion order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Every record of `name`, in stored order
    pub fn entries(&self, name: &str) -> &[ModuleEntry] {
        self.entries.get(name).map_or(&[], Vec::as_slice)
    }

    /// All records, names in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &ModuleEntry> {
        self.names
            .iter()
            .flat_map(move |name| self.entries(name).iter())
    }

    /// Append a record; with `cache`, write it to the available tier unless
    /// a fresh copy is already there
    pub fn add(&mut self, mut entry: ModuleEntry, cache: bool) -> Result<()> {
        if cache
            && let Some(available) = &self.available_cache
            && !available.is_valid(&entry.key(), entry.metadata_expiry())
        {
            let enabled_by_user = entry.enabled_by_user();
            entry.cache = available.store(&entry, enabled_by_user)?;
        }

        let name = entry.name().to_string();
        if !self.entries.contains_key(&name) {
            self.names.push(name.clone());
        }
        self.entries.entry(name).or_default().push(entry);
        Ok(())
    }

    /// Records of `name` matching the given version and release exactly
    pub fn get(
        &self,
        name: &str,
        version: Option<&str>,
        release: Option<&str>,
    ) -> Vec<&ModuleEntry> {
        self.entries(name)
            .iter()
            .filter(|e| version.is_none_or(|v| e.version() == v))
            .filter(|e| release.is_none_or(|r| e.release() == r))
            .collect()
    }

    pub fn find(&self, key: &ModuleKey) -> Option<&ModuleEntry> {
        self.entries(&key.name).iter().find(|e| e.key() == *key)
    }

    pub fn find_mut(&mut self, key: &ModuleKey) -> Option<&mut ModuleEntry> {
        self.entries
            .get_mut(&key.name)?
            .iter_mut()
            .find(|e| e.key() == *key)
    }

    /// Union with `other`
    ///
    /// Names new to this catalog are appended in `other`'s order. Each
    /// name's combined record list ends up sorted by (version, release);
    /// the sort is stable so equal keys keep their relative order.
    pub fn merge(&mut self, other: ModuleCatalog) {
        let ModuleCatalog {
            names,
            mut entries,
            ..
        } = other;

        for name in names {
            let Some(incoming) = entries.remove(&name) else {
                continue;
            };
            if !self.entries.contains_key(&name) {
                self.names.push(name.clone());
            }
            let list = self.entries.entry(name).or_default();
            list.extend(incoming);
            list.sort_by(|a, b| a.cmp_version_release(b));
        }
    }

    /// Whether the available cache holds fresh copies of the records
    ///
    /// An empty catalog is never valid. With `name`, only that module's
    /// records are checked.
    pub fn is_cache_valid(&self, name: Option<&str>) -> bool {
        let Some(available) = &self.available_cache else {
            return false;
        };
        if self.is_empty() {
            return false;
        }

        let mut checked = 0;
        for entry in self.iter().filter(|e| name.is_none_or(|n| e.name() == n)) {
            if !available.is_valid(&entry.key(), entry.metadata_expiry()) {
                debug!("Cached metadata for {} is stale", entry.key());
                return false;
            }
            checked += 1;
        }
        checked > 0
    }

    /// Delete cached records that no longer appear in this catalog
    pub fn remove_stale(&self, cache: &MetadataCache) -> Result<usize> {
        let current: HashSet<ModuleKey> = self.iter().map(ModuleEntry::key).collect();
        let mut removed = 0;

        for cached in cache.load_entries(|_| None, None)? {
            let key = cached.key();
            if current.contains(&key) {
                continue;
            }
            match cache.remove(&key) {
                Ok(()) => {
                    info!("Dropped {} from {} cache, no longer offered", key, cache.tier());
                    removed += 1;
                }
                Err(Error::NotFoundError(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(removed)
    }

    /// Replace listing stubs of `name` with full metadata and re-cache them
    pub fn refresh_metadata(&mut self, name: &str) -> Result<()> {
        let available = self.available_cache.clone();
        let Some(list) = self.entries.get_mut(name) else {
            return Ok(());
        };

        for entry in list.iter_mut().filter(|e| !e.has_full_metadata()) {
            if let Err(e) = entry.fetch_full_metadata() {
                warn!("Cannot fetch full metadata for {}: {}", entry.key(), e);
                continue;
            }
            if let Some(cache) = &available {
                let enabled_by_user = entry.enabled_by_user();
                entry.cache = cache.store(entry, enabled_by_user)?;
            }
        }
        Ok(())
    }

    /// Three-column listing: name, version-release, summary
    pub fn brief_description(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let name_width = self.names.iter().map(String::len).max().unwrap_or(0) + 4;
        let vr = |e: &ModuleEntry| format!("{}-{}", e.version(), e.release());
        let vr_width = self.iter().map(|e| vr(e).len()).max().unwrap_or(0) + 4;

        self.iter()
            .map(|e| {
                format!(
                    "{:name_width$}{:vr_width$}{}",
                    e.name(),
                    vr(e),
                    e.descriptor.summary
                )
                .trim_end()
                .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Full description of every record of `name`, oldest first
    pub fn full_description(&self, name: &str) -> Result<String> {
        let mut records: Vec<&ModuleEntry> = self.entries(name).iter().collect();
        if records.is_empty() {
            return Err(Error::DependencyError(format!("Unknown module {}", name)));
        }
        records.sort_by(|a, b| a.cmp_version_release(b));

        let text: Vec<String> = records
            .iter()
            .map(|e| e.descriptor.full_description())
            .collect();
        Ok(text.join("\n").trim_end().to_string())
    }
}
