// src/commands/mod.rs
//! Command handlers for the modman CLI

mod lifecycle;
mod query;

pub use lifecycle::{cmd_disable, cmd_enable, cmd_rebase, cmd_upgrade};
pub use query::{
    build_query, cmd_info, cmd_list, cmd_list_enabled, cmd_refresh, cmd_search, cmd_summary,
};

use anyhow::Result;
use modman::lifecycle::CommandPackageManager;
use modman::{ModmanConfig, Orchestrator, PackageSession, RepoFileStore, SourceRegistry};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Everything a command needs, built from the global options
pub struct Context {
    pub config: ModmanConfig,
    pub registry: SourceRegistry,
    pub descriptors: RepoFileStore,
    pub no_pkg: bool,
}

impl Context {
    pub fn load(config_path: &str, root: Option<&str>, no_pkg: bool) -> Result<Self> {
        let mut config = ModmanConfig::load_or_default(Path::new(config_path))?;
        if let Some(root) = root {
            config.root = PathBuf::from(root);
        }
        config.validate()?;
        debug!("Using configuration {:?}", config);

        let registry = SourceRegistry::from_config(&config)?;
        let descriptors =
            RepoFileStore::new(config.descriptor_path(), config.descriptor_prefix.clone());

        Ok(Self {
            config,
            registry,
            descriptors,
            no_pkg,
        })
    }

    /// Orchestrator installing `profiles`, or the configured defaults when empty
    pub fn orchestrator(&self, profiles: Vec<String>) -> Result<Orchestrator<'_>> {
        let profiles = if profiles.is_empty() {
            self.config.default_profiles.clone()
        } else {
            profiles
        };

        let mut orchestrator = Orchestrator::new(&self.registry, &self.descriptors)
            .with_operator(self.config.requires_operator()?)
            .with_profiles(profiles);

        if !self.no_pkg {
            let manager =
                CommandPackageManager::new(&self.config.package_manager, &self.config.root);
            orchestrator = orchestrator.with_session(PackageSession::open(Box::new(manager)));
        }
        Ok(orchestrator)
    }
}
