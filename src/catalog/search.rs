// src/catalog/search.rs

//! Keyword search over a catalog
//!
//! A query is a list of filters that must all hold. Name and license
//! patterns match exactly or as globs. Version and release filters compare
//! the stored string with one of six operators. A `*` in the compared value
//! makes the value a glob: a field matching it counts as equal to it, so
//! `==`, `<=` and `>=` select the glob hits while `<`, `>` and `!=` select
//! nothing. The requires filter matches only modules whose whole
//! requirement map equals the given one.

use super::ModuleCatalog;
use crate::error::{Error, Result};
use crate::module::ModuleEntry;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

/// Comparison operator of version and release filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::EnumString, strum_macros::Display)]
pub enum CompareOp {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
}

impl CompareOp {
    pub fn parse(op: &str) -> Result<Self> {
        CompareOp::from_str(op.trim())
            .map_err(|_| Error::ConfigError(format!("Unknown comparison operator '{}'", op)))
    }

    fn matches(&self, actual: &str, wanted: &str) -> bool {
        if wanted.contains('*') {
            return glob_match(wanted, actual)
                && matches!(self, CompareOp::Eq | CompareOp::Le | CompareOp::Ge);
        }
        match self {
            CompareOp::Eq => actual == wanted,
            CompareOp::Ne => actual != wanted,
            CompareOp::Lt => actual < wanted,
            CompareOp::Le => actual <= wanted,
            CompareOp::Gt => actual > wanted,
            CompareOp::Ge => actual >= wanted,
        }
    }
}

/// One search predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchFilter {
    /// Any of the patterns matches the module name
    Name(Vec<String>),
    Version(CompareOp, String),
    Release(CompareOp, String),
    /// The module's requirement map equals this one exactly
    Requires(BTreeMap<String, String>),
    /// Any of the patterns matches any of the module's licenses
    License(Vec<String>),
}

fn glob_match(pattern: &str, value: &str) -> bool {
    match glob::Pattern::new(pattern) {
        Ok(p) => p.matches(value),
        Err(_) => pattern == value,
    }
}

fn matches_any(patterns: &[String], value: &str) -> bool {
    patterns
        .iter()
        .any(|p| p == value || (p.contains('*') && glob_match(p, value)))
}

impl SearchFilter {
    pub fn matches(&self, entry: &ModuleEntry) -> bool {
        let desc = &entry.descriptor;
        match self {
            SearchFilter::Name(patterns) => matches_any(patterns, &desc.name),
            SearchFilter::Version(op, value) => op.matches(&desc.version, value),
            SearchFilter::Release(op, value) => op.matches(&desc.release, value),
            SearchFilter::Requires(requires) => desc.requires == *requires,
            SearchFilter::License(patterns) => {
                desc.licenses.iter().any(|l| matches_any(patterns, l))
            }
        }
    }
}

/// Conjunction of filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    filters: Vec<SearchFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonQuery {
    #[serde(default)]
    name: Option<Vec<String>>,
    #[serde(default)]
    version: Option<(String, String)>,
    #[serde(default)]
    release: Option<(String, String)>,
    #[serde(default)]
    requires: Option<BTreeMap<String, String>>,
    #[serde(default)]
    license: Option<Vec<String>>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: SearchFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn push(&mut self, filter: SearchFilter) {
        self.filters.push(filter);
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn filters(&self) -> &[SearchFilter] {
        &self.filters
    }

    /// Build a query from a JSON object such as
    /// `{"name": ["http*"], "version": [">=", "2.4"], "requires": {"core": "1.0"}}`
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: JsonQuery = serde_json::from_str(json)?;
        let mut query = SearchQuery::new();

        if let Some(names) = raw.name {
            query.push(SearchFilter::Name(names));
        }
        if let Some((op, value)) = raw.version {
            query.push(SearchFilter::Version(CompareOp::parse(&op)?, value));
        }
        if let Some((op, value)) = raw.release {
            query.push(SearchFilter::Release(CompareOp::parse(&op)?, value));
        }
        if let Some(requires) = raw.requires {
            query.push(SearchFilter::Requires(requires));
        }
        if let Some(licenses) = raw.license {
            query.push(SearchFilter::License(licenses));
        }
        Ok(query)
    }

    pub fn matches(&self, entry: &ModuleEntry) -> bool {
        self.filters.iter().all(|f| f.matches(entry))
    }
}

/// Records of `catalog` matching `query`; an empty query matches nothing
pub fn search(catalog: &ModuleCatalog, query: &SearchQuery) -> Result<ModuleCatalog> {
    let mut found = ModuleCatalog::detached();
    if query.is_empty() {
        return Ok(found);
    }

    for entry in catalog.iter().filter(|e| query.matches(e)) {
        found.add(entry.clone(), false)?;
    }
    debug!("Search matched {} of {} records", found.len(), catalog.len());
    Ok(found)
}
