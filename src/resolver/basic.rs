// src/resolver/basic.rs

//! Built-in module solver
//!
//! A small greedy solver sufficient for module graphs, where each name has a
//! handful of versions and at most one of them is installed. Installing a
//! record pulls in the best provider of each of its requirements; anything the
//! resulting set cannot satisfy is reported as a problem, with directives
//! that would let a later round proceed.

use super::solver::{
    Directive, JobKind, ModuleSolver, Requirement, SolvableId, SolveOutcome, SolverProblem, Step,
    Universe,
};
use crate::error::Result;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

/// Greedy best-version solver
#[derive(Debug, Default)]
pub struct BasicSolver;

impl BasicSolver {
    pub fn new() -> Self {
        Self
    }
}

/// Whether `target` names solvable `id`: by name, `name-version` or
/// `name-version-release`, each optionally as a glob
fn selects(universe: &Universe, id: SolvableId, target: &str) -> bool {
    let key = &universe.get(id).key;
    let forms = [
        key.name.clone(),
        format!("{}-{}", key.name, key.version),
        format!("{}-{}-{}", key.name, key.version, key.release),
    ];

    let is_glob = target.contains(['*', '?', '[']);
    if is_glob && let Ok(pattern) = glob::Pattern::new(target) {
        return forms.iter().any(|form| pattern.matches(form));
    }
    forms.iter().any(|form| form == target)
}

/// Highest version-release among `ids`, first one winning ties
fn best(universe: &Universe, ids: &[SolvableId]) -> Option<SolvableId> {
    ids.iter().copied().reduce(|best, id| {
        if universe.get(id).cmp_evr(universe.get(best)) == Ordering::Greater {
            id
        } else {
            best
        }
    })
}

/// Working state of one solver run
struct Run<'u> {
    universe: &'u Universe,
    directives: &'u [Directive],
    /// name -> record present when the run started
    before: BTreeMap<String, SolvableId>,
    /// name -> record present after the transaction
    after: BTreeMap<String, SolvableId>,
    /// Names in the order their records were settled, dependencies first
    order: Vec<String>,
    problems: Vec<SolverProblem>,
}

impl<'u> Run<'u> {
    fn new(universe: &'u Universe, directives: &'u [Directive]) -> Self {
        let mut before = BTreeMap::new();
        for id in universe.installed() {
            before.entry(universe.get(id).name().to_string()).or_insert(id);
        }
        let after = before.clone();
        Self {
            universe,
            directives,
            before,
            after,
            order: Vec::new(),
            problems: Vec::new(),
        }
    }

    fn allows_downgrade(&self, name: &str) -> bool {
        self.directives
            .iter()
            .any(|d| matches!(d, Directive::AllowDowngrade(n) if n == name))
    }

    fn erase_requested(&self, id: SolvableId) -> bool {
        let key = &self.universe.get(id).key;
        self.directives
            .iter()
            .any(|d| matches!(d, Directive::Erase(k) if k == key))
    }

    fn is_satisfied(&self, req: &Requirement) -> bool {
        self.after
            .get(&req.name)
            .is_some_and(|&id| self.universe.satisfies(id, req))
    }

    fn settle(&mut self, name: &str) {
        if !self.order.iter().any(|n| n == name) {
            self.order.push(name.to_string());
        }
    }

    /// Apply erase directives for installed records
    fn apply_erase_directives(&mut self) {
        let erased: Vec<SolvableId> = self
            .before
            .values()
            .copied()
            .filter(|&id| self.erase_requested(id))
            .collect();
        for id in erased {
            let name = self.universe.get(id).name().to_string();
            self.after.remove(&name);
            self.settle(&name);
        }
    }

    /// Put `id` into the resulting set along with what it needs
    fn install(&mut self, id: SolvableId) -> bool {
        let universe = self.universe;
        let solvable = universe.get(id);
        let name = solvable.name().to_string();

        if self.after.get(&name) == Some(&id) {
            return true;
        }

        if let Some(&old) = self.before.get(&name)
            && old != id
            && solvable.cmp_evr(universe.get(old)) == Ordering::Less
            && !self.allows_downgrade(&name)
        {
            self.problems.push(
                SolverProblem::new(format!(
                    "problem with installed module {}: installing {} would downgrade it",
                    universe.get(old).key,
                    solvable.key
                ))
                .with_solution(
                    format!("allow downgrade of {}", name),
                    vec![Directive::AllowDowngrade(name.clone())],
                ),
            );
            return false;
        }

        trace!("Selecting {}", solvable.key);
        self.after.insert(name.clone(), id);

        let mut ok = true;
        for req in &solvable.requires {
            if self.is_satisfied(req) {
                continue;
            }
            let providers = universe.providers(req);
            match best(universe, &providers) {
                Some(provider) => ok &= self.install(provider),
                None => {
                    self.problems.push(SolverProblem::new(format!(
                        "nothing provides {} needed by {}",
                        req, solvable.key
                    )));
                    ok = false;
                }
            }
        }

        self.settle(&name);
        ok
    }

    /// Drop `ids` from the resulting set
    fn erase(&mut self, ids: &[SolvableId]) {
        for &id in ids {
            let name = self.universe.get(id).name().to_string();
            if self.after.get(&name) == Some(&id) {
                self.after.remove(&name);
                self.settle(&name);
            }
        }
    }

    /// Every record in the resulting set must have its requirements met.
    /// Installed records broken by the job may be erased in a later round;
    /// that round re-checks, so cascades unfold one level at a time.
    fn check_consistency(&mut self) {
        let universe = self.universe;
        let resulting: Vec<SolvableId> = self.after.values().copied().collect();

        for id in resulting {
            let solvable = universe.get(id);
            let Some(req) = solvable
                .requires
                .iter()
                .find(|req| !self.is_satisfied(req))
            else {
                continue;
            };

            if self.before.get(solvable.name()) != Some(&id) {
                self.problems.push(SolverProblem::new(format!(
                    "{} requires {}, which conflicts with the rest of the transaction",
                    solvable.key, req
                )));
                continue;
            }

            self.problems.push(
                SolverProblem::new(format!(
                    "installed module {} requires {}, which would no longer be provided",
                    solvable.key, req
                ))
                .with_solution(
                    format!("also disable {}", solvable.key),
                    vec![Directive::Erase(solvable.key.clone())],
                ),
            );
        }
    }

    fn into_outcome(self) -> SolveOutcome {
        if !self.problems.is_empty() {
            return SolveOutcome::Problems(self.problems);
        }

        let mut steps = Vec::new();
        for name in &self.order {
            let old = self.before.get(name).copied();
            let new = self.after.get(name).copied();
            let step = match (old, new) {
                (None, Some(new)) => Step::Install(new),
                (Some(old), None) => Step::Erase(old),
                (Some(old), Some(new)) if old == new => continue,
                (Some(old), Some(new)) => {
                    match self.universe.get(new).cmp_evr(self.universe.get(old)) {
                        Ordering::Greater => Step::Upgrade { old, new },
                        Ordering::Less => Step::Downgrade { old, new },
                        Ordering::Equal => Step::Reinstall(new),
                    }
                }
                (None, None) => continue,
            };
            steps.push(step);
        }
        SolveOutcome::Transaction(steps)
    }
}

impl ModuleSolver for BasicSolver {
    fn solve(
        &mut self,
        universe: &Universe,
        target: &str,
        job: JobKind,
        directives: &[Directive],
    ) -> Result<SolveOutcome> {
        let selection: Vec<SolvableId> = universe
            .ids()
            .filter(|&id| selects(universe, id, target))
            .collect();
        if selection.is_empty() {
            debug!("No module matches '{}'", target);
            return Ok(SolveOutcome::NoTarget);
        }

        let mut run = Run::new(universe, directives);
        run.apply_erase_directives();

        match job {
            JobKind::Install => {
                // Already satisfied when an installed record is selected
                if !selection.iter().any(|&id| universe.get(id).installed)
                    && let Some(id) = best(universe, &selection)
                {
                    run.install(id);
                }
            }
            JobKind::Erase => {
                let installed: Vec<SolvableId> = selection
                    .iter()
                    .copied()
                    .filter(|&id| universe.get(id).installed)
                    .collect();
                run.erase(&installed);
            }
            JobKind::Update => {
                let names: BTreeSet<&str> = selection
                    .iter()
                    .filter(|&&id| universe.get(id).installed)
                    .map(|&id| universe.get(id).name())
                    .collect();
                for name in names {
                    let Some(&old) = run.before.get(name) else {
                        continue;
                    };
                    let candidates: Vec<SolvableId> = selection
                        .iter()
                        .copied()
                        .filter(|&id| universe.get(id).name() == name)
                        .collect();
                    if let Some(new) = best(universe, &candidates)
                        && universe.get(new).cmp_evr(universe.get(old)) == Ordering::Greater
                    {
                        run.install(new);
                    }
                }
            }
        }

        if run.problems.is_empty() {
            run.check_consistency();
        }
        Ok(run.into_outcome())
    }
}
