// src/error.rs

//! Error types shared by the whole crate

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while managing modules
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed configuration or module-source definition
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A module source could not list or describe its modules
    #[error("Module source error: {0}")]
    ApiError(String),

    /// Unsatisfiable request, unknown module or missing metadata.
    /// Rendered verbatim since it is what the user sees.
    #[error("{0}")]
    DependencyError(String),

    /// Cache or source descriptor could not be written or removed
    #[error("Storage error: {0}")]
    StorageError(String),

    /// The package transaction failed to resolve or download
    #[error("Transaction failed: {0}")]
    TransactionError(String),

    #[error("Not found: {0}")]
    NotFoundError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Download error: {0}")]
    DownloadError(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::ParseError(format!("invalid YAML: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ParseError(format!("invalid JSON: {}", err))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigError(format!("invalid TOML: {}", err))
    }
}
