// src/lifecycle/mod.rs

//! Module lifecycle: enable, disable, upgrade and rebase
//!
//! The [`Orchestrator`] turns one user request into a resolution plan and
//! applies it. Resolution is a negotiation: whenever the solver reports
//! problems, the first solution of each is accepted and the request is
//! solved again, until the plan is clean or the solver has nothing new to
//! offer. Applying always runs enable, disable, upgrade, downgrade and
//! finally the package commit, in that order.

mod session;

pub use session::{CommandPackageManager, CommitError, PackageManager, PackageSession};

use crate::cache::{CacheInfo, CacheLock};
use crate::catalog::ModuleCatalog;
use crate::error::{Error, Result};
use crate::module::{is_unset_stream, ModuleEntry, ModuleKey, Nvr};
use crate::resolver::{
    BasicSolver, Directive, JobKind, ModuleSolver, ResolutionPlan, ResolverAdapter,
};
use crate::source::{SourceDescriptorStore, SourceRegistry};
use crate::version::RequiresOperator;
use tracing::{debug, error, info, warn};

/// A user request
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    Enable,
    Disable,
    Upgrade,
    /// Switch an enabled module to another version, up or down
    Rebase,
}

impl Action {
    pub fn job(self) -> JobKind {
        match self {
            Action::Enable | Action::Rebase => JobKind::Install,
            Action::Disable => JobKind::Erase,
            Action::Upgrade => JobKind::Update,
        }
    }
}

/// Where the orchestrator is in handling a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Negotiating,
    Applying,
    Done,
    Failed,
}

/// Resolves and applies module lifecycle requests
pub struct Orchestrator<'a> {
    registry: &'a SourceRegistry,
    descriptors: &'a dyn SourceDescriptorStore,
    solver: Box<dyn ModuleSolver>,
    session: Option<PackageSession>,
    operator: RequiresOperator,
    profiles: Vec<String>,
    phase: Phase,
}

impl<'a> Orchestrator<'a> {
    pub fn new(registry: &'a SourceRegistry, descriptors: &'a dyn SourceDescriptorStore) -> Self {
        Self {
            registry,
            descriptors,
            solver: Box::new(BasicSolver::new()),
            session: None,
            operator: RequiresOperator::default(),
            profiles: vec!["default".to_string()],
            phase: Phase::Idle,
        }
    }

    pub fn with_solver(mut self, solver: Box<dyn ModuleSolver>) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_session(mut self, session: PackageSession) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_operator(mut self, operator: RequiresOperator) -> Self {
        self.operator = operator;
        self
    }

    /// Profiles whose packages are installed when a module is enabled
    pub fn with_profiles(mut self, profiles: Vec<String>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> Option<&PackageSession> {
        self.session.as_ref()
    }

    /// Hand the package session back, e.g. to close it
    pub fn take_session(&mut self) -> Option<PackageSession> {
        self.session.take()
    }

    /// A module counts as enabled only when both its source descriptor and
    /// its enabled-cache record exist
    pub fn is_enabled(&self, entry: &ModuleEntry) -> bool {
        self.descriptors.exists(entry.name())
            && self.registry.caches().enabled.is_cached(&entry.key())
    }

    /// Resolve `arg` for `action` and apply the resulting plan
    pub fn execute(&mut self, action: Action, arg: &str) -> Result<ResolutionPlan> {
        let result = self.run(action, arg);
        self.phase = if result.is_ok() {
            Phase::Done
        } else {
            Phase::Failed
        };
        result
    }

    fn run(&mut self, action: Action, arg: &str) -> Result<ResolutionPlan> {
        let _lock = CacheLock::acquire(self.registry.caches().root())?;

        self.phase = Phase::Negotiating;
        let mut catalog = self.registry.load_all()?;
        let requested = Nvr::parse(arg);

        if action == Action::Rebase
            && !catalog
                .entries(&requested.name)
                .iter()
                .any(|e| self.is_enabled(e))
        {
            return Err(Error::DependencyError(format!(
                "Module {} is not enabled",
                requested.name
            )));
        }

        let plan = self.negotiate(&catalog, arg, action.job())?;
        if plan.is_empty() {
            info!("Nothing to do for {} {}", action, arg);
            return Ok(plan);
        }

        self.phase = Phase::Applying;
        self.apply(&mut catalog, &plan, action, &requested.name)?;
        Ok(plan)
    }

    /// Solve until the plan has no problems, accepting the first solution
    /// of every problem each round
    pub fn negotiate(
        &mut self,
        catalog: &ModuleCatalog,
        target: &str,
        job: JobKind,
    ) -> Result<ResolutionPlan> {
        let adapter = ResolverAdapter::new(catalog, self.operator, |e| self.is_enabled(e));
        let mut directives: Vec<Directive> = Vec::new();

        loop {
            let Some(plan) = adapter.resolve(self.solver.as_mut(), target, job, &directives)?
            else {
                return Err(Error::DependencyError(format!("No such module: {}", target)));
            };

            let Some(first) = plan.problems.first() else {
                return Ok(plan);
            };

            let mut added = false;
            for problem in &plan.problems {
                info!("Resolution problem: {}", problem.description);
                let Some(solution) = problem.solutions.first() else {
                    continue;
                };
                for directive in &solution.directives {
                    if !directives.contains(directive) {
                        debug!("Accepting solution: {}", solution.description);
                        directives.push(directive.clone());
                        added = true;
                    }
                }
            }

            if !added {
                return Err(Error::DependencyError(first.description.clone()));
            }
            info!("Solving again with {} directive(s)", directives.len());
        }
    }

    fn apply(
        &mut self,
        catalog: &mut ModuleCatalog,
        plan: &ResolutionPlan,
        action: Action,
        user_module: &str,
    ) -> Result<()> {
        for key in &plan.to_enable {
            let by_user = key.name == user_module;
            self.enable(catalog, key, &plan.to_enable, by_user)?;
        }

        let cascade = action == Action::Disable;
        for key in &plan.to_disable {
            self.disable(catalog, key, cascade, true)?;
        }

        for (old, new) in &plan.to_upgrade {
            info!("Upgrading module {} to {}", old, new);
            self.switch(catalog, old, new, &plan.to_enable, user_module)?;
        }
        for (old, new) in &plan.to_downgrade {
            info!("Downgrading module {} to {}", old, new);
            self.switch(catalog, old, new, &plan.to_enable, user_module)?;
        }

        for key in &plan.to_reinstall {
            debug!("Leaving {} as it is", key);
        }

        if let Some(session) = self.session.as_mut() {
            session.commit(self.descriptors)?;
        }
        Ok(())
    }

    fn enable(
        &mut self,
        catalog: &mut ModuleCatalog,
        key: &ModuleKey,
        batch: &[ModuleKey],
        enabled_by_user: bool,
    ) -> Result<ModuleEntry> {
        info!("Enabling module {}", key);

        let entry = catalog
            .find_mut(key)
            .ok_or_else(|| Error::DependencyError(format!("Unknown module {}", key)))?;
        if !entry.has_full_metadata() {
            entry.fetch_full_metadata().map_err(|e| match e {
                Error::DependencyError(_) => e,
                other => Error::DependencyError(format!(
                    "Cannot get metadata for module {}: {}",
                    key, other
                )),
            })?;
        }
        let entry = entry.clone();
        let name = entry.name().to_string();

        self.descriptors.create(&name, &entry.url)?;

        if let Some(session) = self.session.as_mut() {
            let packages = entry.descriptor.profile_packages(&self.profiles);
            if !packages.is_empty() {
                let source_id = self.descriptors.source_id(&name);
                if let Err(e) = session.install(&packages, &source_id, true, false) {
                    if let Err(re) = self.descriptors.remove(&name) {
                        error!("Cannot remove source descriptor of {}: {}", name, re);
                    }
                    return Err(e);
                }
            }
            session.record_enabling(&name);
        }

        for (dep_name, stream) in &entry.descriptor.requires {
            let dependency = self.required_entry(catalog, batch, dep_name, stream)?;
            self.registry
                .caches()
                .enabled
                .add_depending_mod(&dependency, &name)?;
        }

        self.registry.caches().enabled.store(&entry, enabled_by_user)?;
        Ok(entry)
    }

    fn accepts(&self, entry: &ModuleEntry, stream: &str) -> bool {
        is_unset_stream(stream) || self.operator.satisfies(entry.version(), stream)
    }

    /// The record satisfying a requirement: from the batch being enabled,
    /// else an enabled one
    fn required_entry(
        &self,
        catalog: &ModuleCatalog,
        batch: &[ModuleKey],
        name: &str,
        stream: &str,
    ) -> Result<ModuleEntry> {
        let candidates = catalog.entries(name);

        candidates
            .iter()
            .find(|e| batch.contains(&e.key()) && self.accepts(e, stream))
            .or_else(|| {
                candidates
                    .iter()
                    .find(|e| self.accepts(e, stream) && self.is_enabled(e))
            })
            .cloned()
            .ok_or_else(|| {
                Error::DependencyError(format!("Dependency on module {} is not satisfied.", name))
            })
    }

    /// Disable `key` if it is enabled. With `cascade`, requirements left
    /// without dependents and not enabled by the user go too.
    fn disable(
        &mut self,
        catalog: &ModuleCatalog,
        key: &ModuleKey,
        cascade: bool,
        remove_packages: bool,
    ) -> Result<()> {
        let Some(entry) = catalog.find(key).cloned() else {
            warn!("Module {} is not known", key);
            return Ok(());
        };
        if !self.is_enabled(&entry) {
            debug!("Module {} is not enabled", key);
            return Ok(());
        }

        info!("Disabling module {}", key);
        let name = entry.name().to_string();

        if remove_packages && let Some(session) = self.session.as_mut() {
            session.remove_all_from(&self.descriptors.source_id(&name))?;
        }
        self.descriptors.remove(&name)?;
        if let Some(session) = self.session.as_mut() {
            session.record_disabling(&name, &entry.url);
        }

        let registry = self.registry;
        let enabled_cache = &registry.caches().enabled;
        let mut released = Vec::new();
        for dep_name in entry.descriptor.requires.keys() {
            for dependency in catalog.entries(dep_name) {
                if enabled_cache.is_cached(&dependency.key()) {
                    enabled_cache.remove_depending_mod(dependency, &name)?;
                    released.push(dependency.key());
                }
            }
        }

        if cascade {
            for dep_key in released {
                let Some(info) = enabled_cache.info(&dep_key)? else {
                    continue;
                };
                if !info.enabled_by_user && info.depending_modules.is_empty() {
                    info!("Module {} is no longer required", dep_key);
                    self.disable(catalog, &dep_key, true, remove_packages)?;
                }
            }
        }

        match enabled_cache.remove(key) {
            Ok(()) | Err(Error::NotFoundError(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Replace enabled `old` with `new`, re-enabling `old` if that fails
    fn switch(
        &mut self,
        catalog: &mut ModuleCatalog,
        old: &ModuleKey,
        new: &ModuleKey,
        batch: &[ModuleKey],
        user_module: &str,
    ) -> Result<()> {
        let enabled_cache = &self.registry.caches().enabled;
        let old_info = enabled_cache.info(old)?.unwrap_or_default();
        let enabled_by_user = old_info.enabled_by_user || new.name == user_module;

        self.disable(catalog, old, false, false)?;

        let entry = match self.enable(catalog, new, batch, enabled_by_user) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cannot enable {}, re-enabling {}: {}", new, old, e);
                self.restore(catalog, old, batch, &old_info);
                return Err(e);
            }
        };

        for dependent in &old_info.depending_modules {
            self.registry
                .caches()
                .enabled
                .add_depending_mod(&entry, dependent)?;
        }

        if let Some(session) = self.session.as_mut() {
            session.upgrade_from(&self.descriptors.source_id(entry.name()))?;
        }
        Ok(())
    }

    fn restore(
        &mut self,
        catalog: &mut ModuleCatalog,
        old: &ModuleKey,
        batch: &[ModuleKey],
        old_info: &CacheInfo,
    ) {
        let entry = match self.enable(catalog, old, batch, old_info.enabled_by_user) {
            Ok(entry) => entry,
            Err(e) => {
                error!("Cannot re-enable {}: {}", old, e);
                return;
            }
        };

        for dependent in &old_info.depending_modules {
            if let Err(e) = self
                .registry
                .caches()
                .enabled
                .add_depending_mod(&entry, dependent)
            {
                error!("Cannot restore dependent {} of {}: {}", dependent, old, e);
            }
        }
    }
}
