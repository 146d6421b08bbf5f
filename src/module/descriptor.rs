// src/module/descriptor.rs

//! Module descriptor documents
//!
//! A descriptor is the parsed form of a `modulemd` YAML document:
//!
//! ```yaml
//! document: modulemd
//! version: 1
//! data:
//!   name: httpd
//!   version: 2.4.18
//!   release: 1
//!   summary: Apache HTTP Server
//!   license:
//!     module: [MIT]
//!   dependencies:
//!     requires:
//!       core: 1.0
//!       apr: 0.1
//!   profiles:
//!     default:
//!       rpms: [httpd]
//! ```
//!
//! Scalars such as versions and stream constraints may be written as YAML
//! numbers or strings and are always normalised to strings.

use super::nvr::ModuleKey;
use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Value of the `document` header field
pub const DOCUMENT_TYPE: &str = "modulemd";

/// Document format versions this crate understands
pub const SUPPORTED_DOCUMENT_VERSIONS: &[u64] = &[1];

/// Returns true if a requirement's stream value means "any version"
pub fn is_unset_stream(stream: &str) -> bool {
    let stream = stream.trim();
    stream.is_empty() || stream == "None"
}

/// An install profile: a named set of packages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub rpms: BTreeSet<String>,
}

/// One module name/stream/version/release combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub name: String,
    pub stream: String,
    pub version: String,
    pub release: String,
    pub summary: String,
    pub description: String,
    pub licenses: BTreeSet<String>,
    /// Module name to stream constraint
    pub requires: BTreeMap<String, String>,
    pub buildrequires: BTreeMap<String, String>,
    pub profiles: BTreeMap<String, Profile>,
}

impl ModuleDescriptor {
    pub fn new(name: &str, version: &str, release: &str) -> Self {
        Self {
            name: name.to_string(),
            stream: String::new(),
            version: version.to_string(),
            release: release.to_string(),
            summary: String::new(),
            description: String::new(),
            licenses: BTreeSet::new(),
            requires: BTreeMap::new(),
            buildrequires: BTreeMap::new(),
            profiles: BTreeMap::new(),
        }
    }

    /// Parse a `modulemd` YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let document: ModuleDocument = serde_yaml::from_str(yaml)?;
        document.into_descriptor()
    }

    /// Render this descriptor as a `modulemd` YAML document
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&ModuleDocument::from_descriptor(self))?)
    }

    pub fn key(&self) -> ModuleKey {
        ModuleKey::new(&self.name, &self.version, &self.release)
    }

    /// Union of the packages of every named profile that exists
    pub fn profile_packages(&self, profiles: &[String]) -> Vec<String> {
        let mut packages = BTreeSet::new();
        for name in profiles {
            if let Some(profile) = self.profiles.get(name) {
                packages.extend(profile.rpms.iter().cloned());
            }
        }
        packages.into_iter().collect()
    }

    /// Human-readable description used by `info`
    pub fn full_description(&self) -> String {
        let mut ret = format!("Name: {}\n", self.name);
        ret.push_str(&format!("  Summary: {}\n", self.summary));
        ret.push_str(&format!("  Version: {}\n", self.version));
        ret.push_str(&format!("  Release: {}\n", self.release));
        ret.push_str(&format!("  Description: {}\n", self.description));

        if !self.profiles.is_empty() {
            ret.push_str("  Profiles:\n");
            for (name, profile) in &self.profiles {
                let desc = if name == "default" {
                    "Default list of packages.".to_string()
                } else if profile.description.is_empty() {
                    format!("{} profile.", name)
                } else {
                    profile.description.clone()
                };
                ret.push_str(&format!("    - {}: {}\n", name, desc));
            }
        }

        ret
    }
}

/// Serialized form of a descriptor: header plus `data` block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ModuleDocument {
    pub document: String,
    pub version: u64,
    pub data: DocumentData,
}

impl ModuleDocument {
    pub(crate) fn from_descriptor(desc: &ModuleDescriptor) -> Self {
        Self {
            document: DOCUMENT_TYPE.to_string(),
            version: 1,
            data: DocumentData {
                name: desc.name.clone(),
                stream: desc.stream.clone(),
                version: desc.version.clone(),
                release: desc.release.clone(),
                summary: desc.summary.clone(),
                description: desc.description.clone(),
                license: License {
                    module: desc.licenses.clone(),
                },
                dependencies: Dependencies {
                    requires: desc.requires.clone(),
                    buildrequires: desc.buildrequires.clone(),
                },
                profiles: desc.profiles.clone(),
            },
        }
    }

    pub(crate) fn into_descriptor(self) -> Result<ModuleDescriptor> {
        if self.document != DOCUMENT_TYPE {
            return Err(Error::ParseError(format!(
                "not a {} document: '{}'",
                DOCUMENT_TYPE, self.document
            )));
        }
        if !SUPPORTED_DOCUMENT_VERSIONS.contains(&self.version) {
            return Err(Error::ParseError(format!(
                "unsupported {} version {}",
                DOCUMENT_TYPE, self.version
            )));
        }

        let data = self.data;
        if data.name.trim().is_empty() {
            return Err(Error::ParseError("module name must not be empty".to_string()));
        }
        if data.version.trim().is_empty() {
            return Err(Error::ParseError(format!(
                "module {} has no version",
                data.name
            )));
        }

        Ok(ModuleDescriptor {
            name: data.name,
            stream: data.stream,
            version: data.version,
            release: data.release,
            summary: data.summary,
            description: data.description,
            licenses: data.license.module,
            requires: data.dependencies.requires,
            buildrequires: data.dependencies.buildrequires,
            profiles: data.profiles,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct DocumentData {
    name: String,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "String::is_empty")]
    stream: String,
    #[serde(deserialize_with = "scalar")]
    version: String,
    #[serde(default = "default_release", deserialize_with = "scalar")]
    release: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    license: License,
    #[serde(default, skip_serializing_if = "Dependencies::is_empty")]
    dependencies: Dependencies,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    profiles: BTreeMap<String, Profile>,
}

fn default_release() -> String {
    "0".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct License {
    #[serde(default)]
    module: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Dependencies {
    #[serde(default, deserialize_with = "scalar_map", skip_serializing_if = "BTreeMap::is_empty")]
    requires: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "scalar_map", skip_serializing_if = "BTreeMap::is_empty")]
    buildrequires: BTreeMap<String, String>,
}

impl Dependencies {
    fn is_empty(&self) -> bool {
        self.requires.is_empty() && self.buildrequires.is_empty()
    }
}

fn value_to_string(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Null => Some(String::new()),
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    value_to_string(value).ok_or_else(|| serde::de::Error::custom("expected a scalar value"))
}

fn scalar_map<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_yaml::Value>>::deserialize(deserializer)?;
    let mut map = BTreeMap::new();
    for (name, value) in raw.unwrap_or_default() {
        let stream = value_to_string(value).ok_or_else(|| {
            serde::de::Error::custom(format!("requirement on '{}' must be a scalar", name))
        })?;
        map.insert(name, stream);
    }
    Ok(map)
}
