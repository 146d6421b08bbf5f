// src/resolver/plan.rs

//! Resolution plan data structures
//!
//! Contains the result types for dependency resolution.

use super::solver::{Directive, SolverProblem};
use crate::module::ModuleKey;

/// Result of dependency resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionPlan {
    /// Modules to enable (dependencies first)
    pub to_enable: Vec<ModuleKey>,
    pub to_disable: Vec<ModuleKey>,
    pub to_reinstall: Vec<ModuleKey>,
    /// (currently enabled, replacement)
    pub to_upgrade: Vec<(ModuleKey, ModuleKey)>,
    /// (currently enabled, replacement)
    pub to_downgrade: Vec<(ModuleKey, ModuleKey)>,
    /// Problems blocking the transaction; the lists above are empty when set
    pub problems: Vec<Problem>,
}

impl ResolutionPlan {
    pub fn has_problems(&self) -> bool {
        !self.problems.is_empty()
    }

    /// True when the plan changes nothing
    pub fn is_empty(&self) -> bool {
        self.to_enable.is_empty()
            && self.to_disable.is_empty()
            && self.to_reinstall.is_empty()
            && self.to_upgrade.is_empty()
            && self.to_downgrade.is_empty()
    }

    /// One line per change, in the order they will be applied
    pub fn summary(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.extend(self.to_enable.iter().map(|k| format!("Enable {}", k)));
        lines.extend(self.to_disable.iter().map(|k| format!("Disable {}", k)));
        lines.extend(
            self.to_upgrade
                .iter()
                .map(|(old, new)| format!("Upgrade {} -> {}", old, new)),
        );
        lines.extend(
            self.to_downgrade
                .iter()
                .map(|(old, new)| format!("Downgrade {} -> {}", old, new)),
        );
        lines.extend(self.to_reinstall.iter().map(|k| format!("Reinstall {}", k)));
        lines
    }
}

/// A blocking problem and the ways out of it, best first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub description: String,
    pub solutions: Vec<Solution>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub description: String,
    pub directives: Vec<Directive>,
}

impl From<SolverProblem> for Problem {
    fn from(problem: SolverProblem) -> Self {
        Self {
            description: problem.description,
            solutions: problem
                .solutions
                .into_iter()
                .filter(|s| !s.directives.is_empty())
                .map(|s| Solution {
                    description: s.description,
                    directives: s.directives,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_plan() {
        let plan = ResolutionPlan::default();
        assert!(plan.is_empty());
        assert!(!plan.has_problems());
        assert!(plan.summary().is_empty());
    }

    #[test]
    fn test_summary_order() {
        let plan = ResolutionPlan {
            to_enable: vec![ModuleKey::new("core", "1.0", "1")],
            to_upgrade: vec![(
                ModuleKey::new("httpd", "2.2.15", "1"),
                ModuleKey::new("httpd", "2.4.18", "1"),
            )],
            ..Default::default()
        };
        assert_eq!(
            plan.summary(),
            vec![
                "Enable core-1.0-1".to_string(),
                "Upgrade httpd-2.2.15-1 -> httpd-2.4.18-1".to_string(),
            ]
        );
    }

    #[test]
    fn test_problem_drops_empty_solutions() {
        let problem = SolverProblem::new("nothing provides module(core)")
            .with_solution("do nothing", Vec::new())
            .with_solution(
                "allow downgrade of core",
                vec![Directive::AllowDowngrade("core".into())],
            );
        let problem = Problem::from(problem);
        assert_eq!(problem.solutions.len(), 1);
        assert_eq!(problem.solutions[0].description, "allow downgrade of core");
    }
}
