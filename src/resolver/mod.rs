// src/resolver/mod.rs

//! Dependency resolution between modules
//!
//! [`ResolverAdapter`] projects a catalog into a solver [`Universe`]: every
//! entry the user has enabled becomes an installed solvable, every other
//! entry an available one. The solver's answer is classified into a
//! [`ResolutionPlan`].

mod basic;
mod plan;
mod solver;

pub use basic::BasicSolver;
pub use plan::{Problem, ResolutionPlan, Solution};
pub use solver::{
    Directive, JobKind, ModuleSolver, Provide, Requirement, Solvable, SolvableId, SolveOutcome,
    SolverProblem, SolverSolution, Step, Universe,
};

use crate::catalog::ModuleCatalog;
use crate::error::Result;
use crate::module::{is_unset_stream, ModuleEntry, ModuleKey};
use crate::version::RequiresOperator;
use std::collections::HashSet;
use tracing::debug;

/// Solver requirements of a module
pub fn requirements(entry: &ModuleEntry) -> Vec<Requirement> {
    entry
        .descriptor
        .requires
        .iter()
        .map(|(name, stream)| Requirement {
            name: name.clone(),
            version: (!is_unset_stream(stream)).then(|| stream.clone()),
        })
        .collect()
}

/// Bridges a catalog and a [`ModuleSolver`]
#[derive(Debug, Clone)]
pub struct ResolverAdapter {
    universe: Universe,
}

impl ResolverAdapter {
    /// Build the solver universe from `catalog`. `is_enabled` decides which
    /// entries count as installed; a key listed twice is installed once.
    pub fn new<F>(catalog: &ModuleCatalog, operator: RequiresOperator, is_enabled: F) -> Self
    where
        F: Fn(&ModuleEntry) -> bool,
    {
        let mut universe = Universe::new(operator);
        let mut installed_keys: HashSet<ModuleKey> = HashSet::new();

        for entry in catalog.iter() {
            let key = entry.key();
            let installed = is_enabled(entry) && installed_keys.insert(key.clone());
            universe.add(key, installed, requirements(entry));
        }

        debug!(
            "Solver universe: {} modules, {} enabled",
            universe.len(),
            installed_keys.len()
        );
        Self { universe }
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Ask `solver` what `job` on `target` involves. `None` means the target
    /// matches no known module.
    pub fn resolve(
        &self,
        solver: &mut dyn ModuleSolver,
        target: &str,
        job: JobKind,
        directives: &[Directive],
    ) -> Result<Option<ResolutionPlan>> {
        debug!(
            "Resolving {} {} with {} directive(s)",
            job,
            target,
            directives.len()
        );

        let steps = match solver.solve(&self.universe, target, job, directives)? {
            SolveOutcome::NoTarget => return Ok(None),
            SolveOutcome::Problems(problems) => {
                return Ok(Some(ResolutionPlan {
                    problems: problems.into_iter().map(Problem::from).collect(),
                    ..Default::default()
                }));
            }
            SolveOutcome::Transaction(steps) => steps,
        };

        let key = |id: SolvableId| self.universe.get(id).key.clone();
        let mut plan = ResolutionPlan::default();
        for step in steps {
            match step {
                Step::Install(id) => plan.to_enable.push(key(id)),
                Step::Erase(id) => plan.to_disable.push(key(id)),
                Step::Reinstall(id) => plan.to_reinstall.push(key(id)),
                Step::Upgrade { old, new } => plan.to_upgrade.push((key(old), key(new))),
                Step::Downgrade { old, new } => plan.to_downgrade.push((key(old), key(new))),
            }
        }
        Ok(Some(plan))
    }
}
