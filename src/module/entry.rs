// src/module/entry.rs

//! Runtime binding of a descriptor to its source and cache bookkeeping

use super::descriptor::ModuleDescriptor;
use super::nvr::ModuleKey;
use crate::cache::CacheInfo;
use crate::error::{Error, Result};
use crate::source::SourceHandle;
use crate::version::{compare_releases, compare_versions};
use std::cmp::Ordering;
use std::fmt;
use tracing::debug;

/// A module record known to the current invocation
#[derive(Clone)]
pub struct ModuleEntry {
    pub descriptor: ModuleDescriptor,
    /// Locator for full metadata and base URL for the module's packages
    pub url: String,
    pub source: Option<SourceHandle>,
    pub cache: CacheInfo,
}

impl fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleEntry")
            .field("key", &self.key().to_string())
            .field("url", &self.url)
            .field("source", &self.source.as_ref().map(|s| s.name().to_string()))
            .field("cache", &self.cache)
            .finish()
    }
}

impl ModuleEntry {
    pub fn new(descriptor: ModuleDescriptor, url: impl Into<String>) -> Self {
        Self {
            descriptor,
            url: url.into(),
            source: None,
            cache: CacheInfo::default(),
        }
    }

    /// Attribute this entry to a module source
    pub fn with_source(mut self, source: SourceHandle) -> Self {
        self.cache.source_name = Some(source.name().to_string());
        self.cache.source_url = Some(source.url().to_string());
        self.source = Some(source);
        self
    }

    /// Mark this entry as synthesized from a lightweight listing
    pub fn needing_refetch(mut self) -> Self {
        self.cache.needs_refetch = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn version(&self) -> &str {
        &self.descriptor.version
    }

    pub fn release(&self) -> &str {
        &self.descriptor.release
    }

    pub fn key(&self) -> ModuleKey {
        self.descriptor.key()
    }

    pub fn has_full_metadata(&self) -> bool {
        !self.cache.needs_refetch
    }

    pub fn enabled_by_user(&self) -> bool {
        self.cache.enabled_by_user
    }

    /// Expiry of the owning source in seconds; unattributed entries never expire
    pub fn metadata_expiry(&self) -> i64 {
        self.source.as_ref().map_or(-1, |s| s.metadata_expiry())
    }

    /// Replace a listing stub with the full descriptor from its source
    pub fn fetch_full_metadata(&mut self) -> Result<()> {
        if self.has_full_metadata() {
            return Ok(());
        }

        let source = self.source.as_ref().ok_or_else(|| {
            Error::DependencyError(format!(
                "There is no metadata associated with module {}",
                self.name()
            ))
        })?;

        debug!("Fetching full metadata for {} from {}", self.key(), self.url);
        let descriptor = source.fetch_full_metadata(&self.url)?;
        if descriptor.name != self.descriptor.name {
            return Err(Error::ApiError(format!(
                "Metadata at {} describes module {}, expected {}",
                self.url, descriptor.name, self.descriptor.name
            )));
        }

        self.descriptor = descriptor;
        self.cache.needs_refetch = false;
        Ok(())
    }

    /// Ordering by (version, release) ascending
    pub fn cmp_version_release(&self, other: &Self) -> Ordering {
        compare_versions(self.version(), other.version())
            .then_with(|| compare_releases(self.release(), other.release()))
    }
}
