// src/module/nvr.rs

//! Name-version-release identifiers
//!
//! User arguments like `httpd`, `httpd-2.2.15` and `httpd-2.2.15-1` are split
//! right to left: if the last two dash-separated tokens both start with a
//! digit they are version and release, if only the last one does it is the
//! version, otherwise the whole string is a name.
//!
//! The heuristic cannot tell a module whose name ends in a numeric-looking
//! segment (say `python-3`) from a versioned reference to `python`; callers
//! get whatever the split yields.

use std::fmt;

/// A parsed `name[-version[-release]]` argument
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nvr {
    pub name: String,
    pub version: Option<String>,
    pub release: Option<String>,
}

fn starts_with_digit(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_ascii_digit())
}

impl Nvr {
    pub fn parse(arg: &str) -> Self {
        let tokens: Vec<&str> = arg.split('-').collect();
        let n = tokens.len();

        if n >= 3 && starts_with_digit(tokens[n - 1]) && starts_with_digit(tokens[n - 2]) {
            return Self {
                name: tokens[..n - 2].join("-"),
                version: Some(tokens[n - 2].to_string()),
                release: Some(tokens[n - 1].to_string()),
            };
        }

        if n >= 2 && starts_with_digit(tokens[n - 1]) {
            return Self {
                name: tokens[..n - 1].join("-"),
                version: Some(tokens[n - 1].to_string()),
                release: None,
            };
        }

        Self {
            name: arg.to_string(),
            version: None,
            release: None,
        }
    }
}

impl fmt::Display for Nvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(version) = &self.version {
            write!(f, "-{}", version)?;
            if let Some(release) = &self.release {
                write!(f, "-{}", release)?;
            }
        }
        Ok(())
    }
}

/// Fully qualified identity of one module record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleKey {
    pub name: String,
    pub version: String,
    pub release: String,
}

impl ModuleKey {
    pub fn new(name: &str, version: &str, release: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            release: release.to_string(),
        }
    }

    /// Cache file name for this record with the given extension
    pub fn file_name(&self, ext: &str) -> String {
        format!("{}.{}", self, ext)
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.name, self.version, self.release)
    }
}
