// src/version/mod.rs

//! Version comparison for module versions and releases
//!
//! Module versions are free-form strings such as `1.0`, `2.4.18` or `20`.
//! They are compared segment by segment: each string is split into runs of
//! digits and runs of letters (everything else separates segments), numeric
//! runs compare numerically, alphabetic runs lexically, and a numeric run is
//! always newer than an alphabetic one. When all shared segments are equal
//! the string with more segments wins.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Numeric(&'a str),
    Alpha(&'a str),
}

fn segments(s: &str) -> Vec<Segment<'_>> {
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_alphanumeric() {
            i += 1;
            continue;
        }
        let start = i;
        if bytes[i].is_ascii_digit() {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            out.push(Segment::Numeric(&s[start..i]));
        } else {
            while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                i += 1;
            }
            out.push(Segment::Alpha(&s[start..i]));
        }
    }

    out
}

fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Compare two version strings segment by segment
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let left = segments(a);
    let right = segments(b);

    for (l, r) in left.iter().zip(right.iter()) {
        let ord = match (l, r) {
            (Segment::Numeric(x), Segment::Numeric(y)) => compare_numeric(x, y),
            (Segment::Alpha(x), Segment::Alpha(y)) => x.cmp(y),
            (Segment::Numeric(_), Segment::Alpha(_)) => Ordering::Greater,
            (Segment::Alpha(_), Segment::Numeric(_)) => Ordering::Less,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    left.len().cmp(&right.len())
}

/// Releases are integers in practice; fall back to segment comparison otherwise
pub fn compare_releases(a: &str, b: &str) -> Ordering {
    match (release_number(a), release_number(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => compare_versions(a, b),
    }
}

/// Parse a release as an integer, if it is one
pub fn release_number(release: &str) -> Option<u64> {
    release.trim().parse::<u64>().ok()
}

/// How a module's requirement on another module's version is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequiresOperator {
    /// The required module must have exactly the named version
    #[default]
    Equal,
    /// Any version at or above the named one satisfies the requirement
    EqualOrGreater,
}

impl RequiresOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequiresOperator::Equal => "==",
            RequiresOperator::EqualOrGreater => ">=",
        }
    }

    /// Check `candidate` against the `wanted` version under this operator
    pub fn satisfies(&self, candidate: &str, wanted: &str) -> bool {
        let ord = compare_versions(candidate, wanted);
        match self {
            RequiresOperator::Equal => ord == Ordering::Equal,
            RequiresOperator::EqualOrGreater => ord != Ordering::Less,
        }
    }
}

impl FromStr for RequiresOperator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "==" | "=" => Ok(RequiresOperator::Equal),
            ">=" => Ok(RequiresOperator::EqualOrGreater),
            other => Err(Error::ConfigError(format!(
                "Unsupported requires operator '{}', expected '==' or '>='",
                other
            ))),
        }
    }
}

impl fmt::Display for RequiresOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_simple_versions() {
        assert_eq!(compare_versions("1.0", "1.0"), Ordering::Equal);
        assert_eq!(compare_versions("2.2.15", "2.4.18"), Ordering::Less);
        assert_eq!(compare_versions("2.4.18", "2.2.15"), Ordering::Greater);
    }

    #[test]
    fn test_compare_numeric_not_lexical() {
        assert_eq!(compare_versions("10", "9"), Ordering::Greater);
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_versions("007", "7"), Ordering::Equal);
    }

    #[test]
    fn test_compare_more_segments_is_newer() {
        assert_eq!(compare_versions("1.0.1", "1.0"), Ordering::Greater);
        assert_eq!(compare_versions("1", "1.0"), Ordering::Less);
    }

    #[test]
    fn test_numeric_beats_alpha() {
        assert_eq!(compare_versions("1.0", "1.a"), Ordering::Greater);
        assert_eq!(compare_versions("1.beta", "1.alpha"), Ordering::Greater);
    }

    #[test]
    fn test_compare_releases() {
        assert_eq!(compare_releases("2", "10"), Ordering::Less);
        assert_eq!(compare_releases("1", "1"), Ordering::Equal);
        assert_eq!(compare_releases("1.el7", "2.el7"), Ordering::Less);
    }

    #[test]
    fn test_requires_operator() {
        let eq: RequiresOperator = "==".parse().unwrap();
        let ge: RequiresOperator = ">=".parse().unwrap();
        assert!(eq.satisfies("1.0", "1.0"));
        assert!(!eq.satisfies("1.1", "1.0"));
        assert!(ge.satisfies("1.1", "1.0"));
        assert!(!ge.satisfies("0.9", "1.0"));
        assert!("~>".parse::<RequiresOperator>().is_err());
    }
}
