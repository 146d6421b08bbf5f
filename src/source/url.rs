// src/source/url.rs

//! Module source served from a URL
//!
//! Layout under the source URL:
//!
//! - `modules.json`: a JSON list. Each item either embeds a full document
//!   under `modulemd`, or carries `name`, `version`, `release`, `summary`
//!   and `requires` only (a listing stub that is refetched on demand).
//!   An optional `url` points at the module's own location, absolute or
//!   relative to the source URL; it defaults to `<source url>/<name>`.
//! - `<module location>/modulemd.yaml`: the module's full document, or
//!   failing that `<module location>/repodata/repomd.xml` whose
//!   `data type="module"` entry locates it (gzip-compressed when the
//!   location ends in `.gz`).
//!
//! `file://` URLs and bare paths are read from disk; anything else goes
//! through a blocking HTTP client.

use super::ModuleSource;
use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::module::{ModuleDescriptor, ModuleEntry};
use flate2::read::GzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout for HTTP requests
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Attempts per HTTP request
const MAX_RETRIES: u32 = 3;

const RETRY_DELAY_MS: u64 = 500;

/// Listing file under the source URL
pub const LISTING_FILE: &str = "modules.json";

/// Full document under a module's location
pub const METADATA_FILE: &str = "modulemd.yaml";

/// Repository index consulted when there is no `modulemd.yaml`
pub const REPOMD_FILE: &str = "repodata/repomd.xml";

#[derive(Debug, Deserialize)]
struct ListingItem {
    #[serde(default)]
    modulemd: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    version: Option<serde_json::Value>,
    #[serde(default)]
    release: Option<serde_json::Value>,
    #[serde(default)]
    requires: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    url: Option<String>,
}

fn json_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Join `path` onto `base` unless it is already absolute
fn join_url(base: &str, path: &str) -> String {
    if url::Url::parse(path).is_ok() || path.starts_with('/') {
        return path.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches("./"))
}

/// Location of the `module` data file in a `repomd.xml` document
fn module_location(xml: &str) -> Result<Option<String>> {
    fn attr(e: &BytesStart, name: &str) -> Option<String> {
        e.try_get_attribute(name)
            .ok()
            .flatten()
            .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
    }

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut in_module = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"data" => {
                in_module = attr(&e, "type").as_deref() == Some("module");
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"data" => in_module = false,
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if in_module && e.local_name().as_ref() == b"location" =>
            {
                return Ok(attr(&e, "href"));
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => {
                return Err(Error::ParseError(format!(
                    "invalid repomd.xml at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }
}

/// Module source backed by a URL
pub struct UrlModuleSource {
    name: String,
    url: String,
    metadata_expire: i64,
    client: OnceLock<Client>,
}

impl UrlModuleSource {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            name: config.name.clone(),
            url: config.url.trim_end_matches('/').to_string(),
            metadata_expire: config.metadata_expire,
            client: OnceLock::new(),
        }
    }

    fn http_client(&self) -> Result<&Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::DownloadError(format!("Failed to create HTTP client: {e}")))?;
        Ok(self.client.get_or_init(|| client))
    }

    fn fetch_http(&self, location: &str) -> Result<Vec<u8>> {
        let client = self.http_client()?;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match client.get(location).send() {
                Ok(response) => {
                    let status = response.status();
                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(Error::NotFoundError(location.to_string()));
                    }
                    if !status.is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            status, location
                        )));
                    }
                    let bytes = response.bytes().map_err(|e| {
                        Error::DownloadError(format!("Failed to read {}: {}", location, e))
                    })?;
                    return Ok(bytes.to_vec());
                }
                Err(e) => {
                    if attempt >= MAX_RETRIES {
                        return Err(Error::DownloadError(format!(
                            "Failed to fetch {} after {} attempts: {}",
                            location, attempt, e
                        )));
                    }
                    warn!("Fetch of {} failed (attempt {}): {}", location, attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    /// Read the document at `location`
    fn fetch_bytes(&self, location: &str) -> Result<Vec<u8>> {
        let path = match url::Url::parse(location) {
            Ok(parsed) if parsed.scheme() == "file" => parsed
                .to_file_path()
                .map_err(|_| Error::ConfigError(format!("Invalid file URL {}", location)))?,
            Ok(_) => return self.fetch_http(location),
            Err(_) => location.into(),
        };

        debug!("Reading {}", path.display());
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFoundError(path.display().to_string())
            } else {
                Error::IoError(format!("Cannot read {}: {}", path.display(), e))
            }
        })
    }

    fn fetch_text(&self, location: &str) -> Result<String> {
        let bytes = self.fetch_bytes(location)?;
        String::from_utf8(bytes)
            .map_err(|e| Error::ParseError(format!("{} is not UTF-8: {}", location, e)))
    }

    fn listing_entry(&self, item: ListingItem) -> Result<ModuleEntry> {
        if let Some(yaml) = &item.modulemd {
            let descriptor = ModuleDescriptor::from_yaml_str(yaml)?;
            let location = join_url(&self.url, item.url.as_deref().unwrap_or(&descriptor.name));
            return Ok(ModuleEntry::new(descriptor, location));
        }

        let name = item
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| Error::ParseError("listing item without a name".to_string()))?;
        let version = item
            .version
            .as_ref()
            .map(json_scalar)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::ParseError(format!("listing item {} has no version", name)))?;
        let release = item.release.as_ref().map(json_scalar).unwrap_or_else(|| "0".to_string());

        let mut descriptor = ModuleDescriptor::new(&name, &version, &release);
        descriptor.summary = item.summary.unwrap_or_default();
        for (required, stream) in item.requires.unwrap_or_default() {
            descriptor.requires.insert(required, json_scalar(&stream));
        }

        let location = join_url(&self.url, item.url.as_deref().unwrap_or(&name));
        Ok(ModuleEntry::new(descriptor, location).needing_refetch())
    }
}

impl ModuleSource for UrlModuleSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn list(&self) -> Result<Vec<ModuleEntry>> {
        let location = join_url(&self.url, LISTING_FILE);
        info!("Listing modules from {}", location);

        let listing = self
            .fetch_text(&location)
            .map_err(|e| Error::ApiError(format!("Cannot fetch {}: {}", location, e)))?;
        let items: Vec<ListingItem> = serde_json::from_str(&listing)
            .map_err(|e| Error::ApiError(format!("Cannot parse {}: {}", location, e)))?;

        if items.is_empty() {
            return Err(Error::ApiError(format!(
                "No modules available from {}",
                self.name
            )));
        }

        items
            .into_iter()
            .map(|item| {
                self.listing_entry(item)
                    .map_err(|e| Error::ApiError(format!("{}: {}", location, e)))
            })
            .collect()
    }

    fn fetch_full_metadata(&self, locator: &str) -> Result<ModuleDescriptor> {
        let direct = join_url(locator, METADATA_FILE);
        match self.fetch_text(&direct) {
            Ok(yaml) => return ModuleDescriptor::from_yaml_str(&yaml),
            Err(Error::NotFoundError(_)) => {
                debug!("No {}, trying {}", direct, REPOMD_FILE);
            }
            Err(e) => return Err(e),
        }

        let repomd = self.fetch_text(&join_url(locator, REPOMD_FILE))?;
        let href = module_location(&repomd)?.ok_or_else(|| {
            Error::NotFoundError(format!("no module metadata listed in {}/{}", locator, REPOMD_FILE))
        })?;

        let raw = self.fetch_bytes(&join_url(locator, &href))?;
        let yaml = if href.ends_with(".gz") {
            let mut text = String::new();
            GzDecoder::new(raw.as_slice())
                .read_to_string(&mut text)
                .map_err(|e| Error::ParseError(format!("Cannot decompress {}: {}", href, e)))?;
            text
        } else {
            String::from_utf8(raw)
                .map_err(|e| Error::ParseError(format!("{} is not UTF-8: {}", href, e)))?
        };

        ModuleDescriptor::from_yaml_str(&yaml)
    }

    fn metadata_expiry(&self) -> i64 {
        self.metadata_expire
    }
}
