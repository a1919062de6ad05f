use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Address formatting error: {0}")]
    BadAddressFormatting(String),
    #[error("Upstream URL error: {0}")]
    BadUpstreamUrl(String),
    #[error("Directory error: {0}")]
    DirectoryUnavailable(String),
}

/// Errors raised while appending sessions to a log file.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Failed to open session log {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Session log write failed: {0}")]
    WriteFailed(#[from] std::io::Error),
    #[error("Session serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
    #[error("Recorder is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Invalid upstream URL: {0}")]
    InvalidUpstream(String),
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage read failed for {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Storage directory missing: {0}")]
    DirectoryMissing(PathBuf),
}

/// A filter expression that could not be compiled. Distinct from "no match".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("invalid filter expression: {0:?}")]
    Syntax(String),
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("File watching error: {0}")]
    Notify(#[from] notify::Error),
    #[error("Initial session load failed: {0}")]
    Storage(#[from] StorageError),
    #[error("Session directory unavailable: {0}")]
    Directory(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigError),
    #[error("Recorder error: {0}")]
    RecorderError(#[from] RecorderError),
    #[error("Capture error: {0}")]
    CaptureError(#[from] CaptureError),
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
    #[error("Watch error: {0}")]
    WatchError(#[from] WatchError),
    #[error("Filter error: {0}")]
    FilterError(#[from] FilterError),
}
