// src/config.rs

//! Configuration
//!
//! The main file (`/etc/modman/modman.toml` by default) is TOML; every key
//! is optional:
//!
//! ```toml
//! modules_dir = "/etc/modman/modules.d"
//! cache_dir = "/var/cache/modman"
//! root = "/"
//! descriptor_dir = "etc/yum.repos.d"
//! descriptor_prefix = "_modman"
//! requires_operator = "=="
//! default_profiles = ["default"]
//! package_manager = "dnf"
//! ```
//!
//! Module sources are defined in `*.toml` files under `modules_dir`, one
//! table per source:
//!
//! ```toml
//! [fedora-modules]
//! url = "https://modules.example.org/"
//! enabled = true
//! metadata_expire = "6h"
//! ```

use crate::error::{Error, Result};
use crate::version::RequiresOperator;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default location of the main configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/modman/modman.toml";

/// Expiry applied when a source does not set `metadata_expire`
pub const DEFAULT_METADATA_EXPIRE: &str = "6h";

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModmanConfig {
    /// Directory holding module-source definitions
    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,

    /// Cache root with `enabled/` and `available/` tiers
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Filesystem root source descriptors are written under
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Source-descriptor directory, relative to `root`
    #[serde(default = "default_descriptor_dir")]
    pub descriptor_dir: PathBuf,

    #[serde(default = "default_descriptor_prefix")]
    pub descriptor_prefix: String,

    /// `==` or `>=`
    #[serde(default = "default_requires_operator")]
    pub requires_operator: String,

    /// Profiles installed when `enable` is not given `--profile`
    #[serde(default = "default_profiles")]
    pub default_profiles: Vec<String>,

    /// Command run by the package-manager collaborator
    #[serde(default = "default_package_manager")]
    pub package_manager: String,
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("/etc/modman/modules.d")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("/var/cache/modman")
}

fn default_root() -> PathBuf {
    PathBuf::from("/")
}

fn default_descriptor_dir() -> PathBuf {
    PathBuf::from("etc/yum.repos.d")
}

fn default_descriptor_prefix() -> String {
    "_modman".to_string()
}

fn default_requires_operator() -> String {
    "==".to_string()
}

fn default_profiles() -> Vec<String> {
    vec!["default".to_string()]
}

fn default_package_manager() -> String {
    "dnf".to_string()
}

impl Default for ModmanConfig {
    fn default() -> Self {
        Self {
            modules_dir: default_modules_dir(),
            cache_dir: default_cache_dir(),
            root: default_root(),
            descriptor_dir: default_descriptor_dir(),
            descriptor_prefix: default_descriptor_prefix(),
            requires_operator: default_requires_operator(),
            default_profiles: default_profiles(),
            package_manager: default_package_manager(),
        }
    }
}

impl ModmanConfig {
    pub fn parse(content: &str) -> Result<Self> {
        let config: ModmanConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.requires_operator()?;
        if self.descriptor_prefix.trim().is_empty() {
            return Err(Error::ConfigError(
                "descriptor_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn requires_operator(&self) -> Result<RequiresOperator> {
        self.requires_operator.parse()
    }

    /// Absolute directory source descriptors live in
    pub fn descriptor_path(&self) -> PathBuf {
        self.root.join(&self.descriptor_dir)
    }

    /// Read every source definition under `modules_dir`
    pub fn load_sources(&self) -> Result<Vec<SourceConfig>> {
        load_source_dir(&self.modules_dir)
    }
}

/// One module source definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    pub enabled: bool,
    /// Seconds until cached listings expire; `-1` never expires
    pub metadata_expire: i64,
}

/// Parse a `metadata_expire` value such as `6h`, `30m`, `2d`, `90` or `never`
pub fn parse_metadata_expire(value: &str) -> Result<i64> {
    let s = value.trim().to_lowercase();

    if s.is_empty() {
        return Err(Error::ConfigError("metadata_expire must not be empty".to_string()));
    }
    if s == "-1" || s == "never" {
        return Ok(-1);
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('d') {
        (n, 24 * 60 * 60)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 60 * 60)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else if s.ends_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(Error::ConfigError(format!(
            "Unknown time unit in metadata_expire '{}'",
            value
        )));
    } else {
        (s.as_str(), 1)
    };

    let num: i64 = num_str.trim().parse().map_err(|_| {
        Error::ConfigError(format!("Invalid metadata_expire value '{}'", value))
    })?;
    if num < 0 {
        return Err(Error::ConfigError(format!(
            "metadata_expire must not be negative: '{}'",
            value
        )));
    }

    num.checked_mul(multiplier).ok_or_else(|| {
        Error::ConfigError(format!("metadata_expire '{}' is too large", value))
    })
}

fn expire_from_toml(name: &str, value: Option<&toml::Value>) -> Result<i64> {
    match value {
        None => parse_metadata_expire(DEFAULT_METADATA_EXPIRE),
        Some(toml::Value::String(s)) => parse_metadata_expire(s),
        Some(toml::Value::Integer(n)) => parse_metadata_expire(&n.to_string()),
        Some(other) => Err(Error::ConfigError(format!(
            "Source {}: metadata_expire must be a string or integer, got {}",
            name,
            other.type_str()
        ))),
    }
}

/// Parse the source tables of one definition file
pub fn parse_source_file(content: &str) -> Result<Vec<SourceConfig>> {
    let table: toml::Table = toml::from_str(content)?;
    let mut sources = Vec::new();

    for (name, value) in table {
        let Some(section) = value.as_table() else {
            return Err(Error::ConfigError(format!(
                "Source {} must be a table",
                name
            )));
        };

        let enabled = match section.get("enabled") {
            None => true,
            Some(toml::Value::Boolean(b)) => *b,
            Some(other) => {
                return Err(Error::ConfigError(format!(
                    "Source {}: enabled must be a boolean, got {}",
                    name,
                    other.type_str()
                )));
            }
        };

        let Some(url) = section.get("url").and_then(|v| v.as_str()) else {
            warn!("Source {} has no url, ignoring it", name);
            continue;
        };

        let metadata_expire = expire_from_toml(&name, section.get("metadata_expire"))?;

        sources.push(SourceConfig {
            name,
            url: url.to_string(),
            enabled,
            metadata_expire,
        });
    }

    Ok(sources)
}

/// Read every `*.toml` file in `dir`, in file-name order
pub fn load_source_dir(dir: &Path) -> Result<Vec<SourceConfig>> {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Module source directory {} does not exist", dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut files: Vec<PathBuf> = read
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    files.sort();

    let mut sources = Vec::new();
    for file in files {
        let content = fs::read_to_string(&file)?;
        let parsed = parse_source_file(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {}", file.display(), e)))?;
        debug!("Loaded {} source(s) from {}", parsed.len(), file.display());
        sources.extend(parsed);
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ModmanConfig::parse("").unwrap();
        assert_eq!(config, ModmanConfig::default());
        assert_eq!(config.requires_operator().unwrap(), RequiresOperator::Equal);
        assert_eq!(config.descriptor_path(), PathBuf::from("/etc/yum.repos.d"));
    }

    #[test]
    fn test_overrides() {
        let config = ModmanConfig::parse(
            r#"
            cache_dir = "/tmp/cache"
            root = "/mnt/sysroot"
            requires_operator = ">="
            default_profiles = ["minimal"]
            "#,
        )
        .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cache"));
        assert_eq!(
            config.requires_operator().unwrap(),
            RequiresOperator::EqualOrGreater
        );
        assert_eq!(
            config.descriptor_path(),
            PathBuf::from("/mnt/sysroot/etc/yum.repos.d")
        );
    }

    #[test]
    fn test_bad_operator_is_config_error() {
        let err = ModmanConfig::parse(r#"requires_operator = "~=""#).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_parse_metadata_expire() {
        assert_eq!(parse_metadata_expire("6h").unwrap(), 6 * 3600);
        assert_eq!(parse_metadata_expire("2d").unwrap(), 2 * 86400);
        assert_eq!(parse_metadata_expire("15M").unwrap(), 15 * 60);
        assert_eq!(parse_metadata_expire("45s").unwrap(), 45);
        assert_eq!(parse_metadata_expire("90").unwrap(), 90);
        assert_eq!(parse_metadata_expire("-1").unwrap(), -1);
        assert_eq!(parse_metadata_expire("never").unwrap(), -1);
    }

    #[test]
    fn test_parse_metadata_expire_errors() {
        assert!(parse_metadata_expire("").is_err());
        assert!(parse_metadata_expire("-5").is_err());
        assert!(parse_metadata_expire("3w").is_err());
        assert!(parse_metadata_expire("soon").is_err());
    }

    #[test]
    fn test_parse_source_file() {
        let sources = parse_source_file(
            r#"
            [alpha]
            url = "file:///srv/alpha"
            metadata_expire = "1h"

            [beta]
            url = "https://beta.example.org/"
            enabled = false
            metadata_expire = -1

            [gamma]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, "alpha");
        assert_eq!(sources[0].metadata_expire, 3600);
        assert!(sources[0].enabled);
        assert_eq!(sources[1].name, "beta");
        assert!(!sources[1].enabled);
        assert_eq!(sources[1].metadata_expire, -1);
    }

    #[test]
    fn test_source_defaults_to_six_hours() {
        let sources = parse_source_file("[s]\nurl = \"file:///s\"\n").unwrap();
        assert_eq!(sources[0].metadata_expire, 6 * 3600);
    }

    #[test]
    fn test_source_enabled_must_be_bool() {
        let err = parse_source_file("[s]\nurl = \"file:///s\"\nenabled = \"yes\"\n").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_load_source_dir() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.toml"), "[two]\nurl = \"file:///two\"\n").unwrap();
        fs::write(tmp.path().join("a.toml"), "[one]\nurl = \"file:///one\"\n").unwrap();
        fs::write(tmp.path().join("readme.txt"), "not a source").unwrap();

        let sources = load_source_dir(tmp.path()).unwrap();
        let names: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two"]);

        assert!(load_source_dir(&tmp.path().join("missing")).unwrap().is_empty());
    }
}
