// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use modman::cache::{CacheInfo, CacheSet};
use modman::lifecycle::{CommitError, PackageManager, PackageSession};
use modman::module::Profile;
use modman::{
    Error, ModuleDescriptor, ModuleEntry, ModuleKey, ModuleSource, Orchestrator, RepoFileStore,
    Result, SourceRegistry,
};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const SOURCE_NAME: &str = "test-modules";
pub const SOURCE_URL: &str = "file:///srv/modules";

/// Module source serving a fixed set of descriptors
pub struct FakeSource {
    modules: Vec<ModuleEntry>,
}

impl FakeSource {
    pub fn new(descriptors: Vec<ModuleDescriptor>) -> Self {
        let modules = descriptors
            .into_iter()
            .map(|d| {
                let url = format!("{}/{}", SOURCE_URL, d.key());
                ModuleEntry::new(d, url)
            })
            .collect();
        Self { modules }
    }
}

impl ModuleSource for FakeSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn url(&self) -> &str {
        SOURCE_URL
    }

    fn list(&self) -> Result<Vec<ModuleEntry>> {
        Ok(self.modules.clone())
    }

    fn fetch_full_metadata(&self, locator: &str) -> Result<ModuleDescriptor> {
        self.modules
            .iter()
            .find(|m| m.url == locator)
            .map(|m| m.descriptor.clone())
            .ok_or_else(|| Error::NotFoundError(locator.to_string()))
    }

    fn metadata_expiry(&self) -> i64 {
        -1
    }
}

fn descriptor(
    name: &str,
    version: &str,
    release: &str,
    requires: &[(&str, &str)],
    packages: &[&str],
) -> ModuleDescriptor {
    let mut d = ModuleDescriptor::new(name, version, release);
    d.summary = format!("{} module", name);
    d.licenses.insert("MIT".to_string());
    for (dep, stream) in requires {
        d.requires.insert(dep.to_string(), stream.to_string());
    }
    d.profiles.insert(
        "default".to_string(),
        Profile {
            description: String::new(),
            rpms: packages.iter().map(|p| p.to_string()).collect(),
        },
    );
    d
}

/// core, apr (requires core) and three httpd records (require apr and core)
pub fn httpd_modules() -> Vec<ModuleDescriptor> {
    vec![
        descriptor("core", "1.0", "1", &[], &["core-libs"]),
        descriptor("apr", "1.5", "1", &[("core", "1.0")], &["apr"]),
        descriptor(
            "httpd",
            "2.2.15",
            "1",
            &[("apr", "1.5"), ("core", "1.0")],
            &["httpd"],
        ),
        descriptor(
            "httpd",
            "2.2.15",
            "2",
            &[("apr", "1.5"), ("core", "1.0")],
            &["httpd"],
        ),
        descriptor(
            "httpd",
            "2.4.18",
            "1",
            &[("apr", "1.5"), ("core", "1.0")],
            &["httpd", "mod_http2"],
        ),
    ]
}

/// What a [`FakePackageManager`] was asked to do
#[derive(Debug, Default)]
pub struct PackageLog {
    pub installs: Vec<(String, Vec<String>)>,
    pub removed_from: Vec<String>,
    pub upgraded_from: Vec<String>,
    pub commits: usize,
}

/// Package manager that records calls, failing on request
pub struct FakePackageManager {
    log: Arc<Mutex<PackageLog>>,
    fail_install_of: Option<String>,
    fail_commit: bool,
}

impl PackageManager for FakePackageManager {
    fn install_packages(
        &mut self,
        specs: &[String],
        source_id: &str,
        _strict: bool,
        _allow_erasing: bool,
    ) -> Result<()> {
        if let Some(bad) = &self.fail_install_of
            && specs.contains(bad)
        {
            return Err(Error::TransactionError(format!("No package {} available", bad)));
        }
        self.log
            .lock()
            .unwrap()
            .installs
            .push((source_id.to_string(), specs.to_vec()));
        Ok(())
    }

    fn remove_all_from(&mut self, source_id: &str) -> Result<usize> {
        self.log
            .lock()
            .unwrap()
            .removed_from
            .push(source_id.to_string());
        Ok(1)
    }

    fn upgrade_packages_from(&mut self, source_id: &str) -> Result<usize> {
        self.log
            .lock()
            .unwrap()
            .upgraded_from
            .push(source_id.to_string());
        Ok(0)
    }

    fn commit_transaction(&mut self) -> std::result::Result<(), CommitError> {
        if self.fail_commit {
            return Err(CommitError::DependenciesUnresolvable(
                "conflicting requests".to_string(),
            ));
        }
        self.log.lock().unwrap().commits += 1;
        Ok(())
    }
}

/// Temporary cache root and descriptor directory with one fake source
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub registry: SourceRegistry,
    pub descriptors: RepoFileStore,
}

impl TestEnv {
    pub fn new(modules: Vec<ModuleDescriptor>) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut registry = SourceRegistry::new(CacheSet::new(&temp_dir.path().join("cache")));
        registry.add(Arc::new(FakeSource::new(modules)));
        let descriptors = RepoFileStore::new(temp_dir.path().join("root/etc/yum.repos.d"), "_modman");

        Self {
            temp_dir,
            registry,
            descriptors,
        }
    }

    pub fn httpd() -> Self {
        Self::new(httpd_modules())
    }

    /// Orchestrator without a package session
    pub fn orchestrator(&self) -> Orchestrator<'_> {
        Orchestrator::new(&self.registry, &self.descriptors)
    }

    /// Orchestrator driving a [`FakePackageManager`]
    pub fn orchestrator_with_packages(
        &self,
        fail_install_of: Option<&str>,
        fail_commit: bool,
    ) -> (Orchestrator<'_>, Arc<Mutex<PackageLog>>) {
        let log = Arc::new(Mutex::new(PackageLog::default()));
        let manager = FakePackageManager {
            log: Arc::clone(&log),
            fail_install_of: fail_install_of.map(str::to_string),
            fail_commit,
        };
        let orchestrator = self
            .orchestrator()
            .with_session(PackageSession::open(Box::new(manager)));
        (orchestrator, log)
    }

    /// Keys of every enabled-cache record, sorted
    pub fn enabled_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .registry
            .caches()
            .enabled
            .load_entries(|_| None, None)
            .unwrap()
            .iter()
            .map(|e| e.key().to_string())
            .collect();
        keys.sort();
        keys
    }

    pub fn enabled_info(&self, name: &str, version: &str, release: &str) -> CacheInfo {
        self.registry
            .caches()
            .enabled
            .info(&ModuleKey::new(name, version, release))
            .unwrap()
            .unwrap_or_else(|| panic!("{}-{}-{} is not cached", name, version, release))
    }

    pub fn dependents(&self, name: &str, version: &str, release: &str) -> Vec<String> {
        let mut dependents = self.enabled_info(name, version, release).depending_modules;
        dependents.sort();
        dependents
    }
}
