// src/resolver/solver.rs

//! Solver interface
//!
//! The resolver adapter projects the catalog into a [`Universe`] of
//! solvables and asks a [`ModuleSolver`] for a transaction. A solver either
//! finds nothing matching the target, reports problems (each with ranked
//! candidate solutions expressed as extra [`Directive`]s), or returns a
//! transaction.

use crate::error::Result;
use crate::module::ModuleKey;
use crate::version::{compare_releases, compare_versions, RequiresOperator};
use std::cmp::Ordering;
use std::fmt;

/// Index of a solvable in its universe
pub type SolvableId = usize;

/// A capability a solvable offers: a module name, optionally at a version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provide {
    pub name: String,
    pub version: Option<String>,
}

/// A requirement on another module, optionally constrained to a version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub version: Option<String>,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "module({}) = {}", self.name, v),
            None => write!(f, "module({})", self.name),
        }
    }
}

/// One installable module record
#[derive(Debug, Clone)]
pub struct Solvable {
    pub key: ModuleKey,
    pub installed: bool,
    pub provides: Vec<Provide>,
    pub requires: Vec<Requirement>,
}

impl Solvable {
    pub fn name(&self) -> &str {
        &self.key.name
    }

    /// Ordering by (version, release)
    pub fn cmp_evr(&self, other: &Solvable) -> Ordering {
        compare_versions(&self.key.version, &other.key.version)
            .then_with(|| compare_releases(&self.key.release, &other.key.release))
    }
}

/// Everything the solver may install, with what is installed now
#[derive(Debug, Clone, Default)]
pub struct Universe {
    solvables: Vec<Solvable>,
    operator: RequiresOperator,
}

impl Universe {
    pub fn new(operator: RequiresOperator) -> Self {
        Self {
            solvables: Vec::new(),
            operator,
        }
    }

    /// Register a module record. It provides its name both at its exact
    /// version and unversioned, so stream-less requirements still resolve.
    pub fn add(&mut self, key: ModuleKey, installed: bool, requires: Vec<Requirement>) -> SolvableId {
        let provides = vec![
            Provide {
                name: key.name.clone(),
                version: Some(key.version.clone()),
            },
            Provide {
                name: key.name.clone(),
                version: None,
            },
        ];
        self.solvables.push(Solvable {
            key,
            installed,
            provides,
            requires,
        });
        self.solvables.len() - 1
    }

    pub fn operator(&self) -> RequiresOperator {
        self.operator
    }

    pub fn get(&self, id: SolvableId) -> &Solvable {
        &self.solvables[id]
    }

    pub fn len(&self) -> usize {
        self.solvables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solvables.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = SolvableId> {
        0..self.solvables.len()
    }

    pub fn installed(&self) -> impl Iterator<Item = SolvableId> + '_ {
        self.ids().filter(|&id| self.solvables[id].installed)
    }

    pub fn find(&self, key: &ModuleKey) -> Option<SolvableId> {
        self.ids().find(|&id| self.solvables[id].key == *key)
    }

    /// Whether solvable `id` satisfies `req`
    pub fn satisfies(&self, id: SolvableId, req: &Requirement) -> bool {
        self.solvables[id].provides.iter().any(|p| {
            p.name == req.name
                && match (&req.version, &p.version) {
                    (None, _) => true,
                    (Some(wanted), Some(have)) => self.operator.satisfies(have, wanted),
                    (Some(_), None) => false,
                }
        })
    }

    /// All solvables satisfying `req`
    pub fn providers(&self, req: &Requirement) -> Vec<SolvableId> {
        self.ids().filter(|&id| self.satisfies(id, req)).collect()
    }
}

/// What the target selection should undergo
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum JobKind {
    Install,
    Erase,
    Update,
}

/// Extra solver instruction accepted during negotiation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Directive {
    /// Permit replacing the installed record of this module with an older one
    AllowDowngrade(String),
    /// Remove this installed record as part of the transaction
    Erase(ModuleKey),
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::AllowDowngrade(name) => write!(f, "allow downgrade of {}", name),
            Directive::Erase(key) => write!(f, "erase {}", key),
        }
    }
}

/// A candidate fix for a problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverSolution {
    pub description: String,
    pub directives: Vec<Directive>,
}

/// An unsatisfied constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverProblem {
    pub description: String,
    /// Best first
    pub solutions: Vec<SolverSolution>,
}

impl SolverProblem {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            solutions: Vec::new(),
        }
    }

    pub fn with_solution(mut self, description: impl Into<String>, directives: Vec<Directive>) -> Self {
        self.solutions.push(SolverSolution {
            description: description.into(),
            directives,
        });
        self
    }
}

/// One change a transaction makes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Install(SolvableId),
    Erase(SolvableId),
    Reinstall(SolvableId),
    Upgrade { old: SolvableId, new: SolvableId },
    Downgrade { old: SolvableId, new: SolvableId },
}

/// Result of a solver run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    /// The target expression matches nothing in the universe
    NoTarget,
    Problems(Vec<SolverProblem>),
    Transaction(Vec<Step>),
}

/// Dependency solver over a module universe
pub trait ModuleSolver {
    fn solve(
        &mut self,
        universe: &Universe,
        target: &str,
        job: JobKind,
        directives: &[Directive],
    ) -> Result<SolveOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(name: &str, version: Option<&str>) -> Requirement {
        Requirement {
            name: name.to_string(),
            version: version.map(str::to_string),
        }
    }

    #[test]
    fn test_provides_versioned_and_unversioned() {
        let mut universe = Universe::new(RequiresOperator::Equal);
        let core = universe.add(ModuleKey::new("core", "1.0", "1"), false, Vec::new());

        assert!(universe.satisfies(core, &req("core", Some("1.0"))));
        assert!(universe.satisfies(core, &req("core", None)));
        assert!(!universe.satisfies(core, &req("core", Some("2.0"))));
        assert!(!universe.satisfies(core, &req("apr", None)));
    }

    #[test]
    fn test_equal_or_greater_operator() {
        let mut universe = Universe::new(RequiresOperator::EqualOrGreater);
        let core = universe.add(ModuleKey::new("core", "1.2", "1"), false, Vec::new());
        assert!(universe.satisfies(core, &req("core", Some("1.0"))));
        assert!(!universe.satisfies(core, &req("core", Some("2.0"))));
    }

    #[test]
    fn test_requirement_display() {
        assert_eq!(req("core", Some("1.0")).to_string(), "module(core) = 1.0");
        assert_eq!(req("core", None).to_string(), "module(core)");
    }
}
