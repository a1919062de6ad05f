use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use super::paths;
use super::types::*;
use crate::error_handling::types::ConfigError;

/// Application configuration that defines all runtime parameters.
///
/// The configuration is read from an optional TOML file; every section and
/// every key has a default, so an empty file (or no file) is valid. Command
/// line flags are applied on top by the binary.
///
/// # Examples
///
/// ```
/// use promptlog::configuration::config::Config;
///
/// let config = Config::from_toml_str(r#"
///     [proxy]
///     upstream_url = "http://localhost:11434"
/// "#).unwrap();
/// assert_eq!(config.proxy.upstream_url, "http://localhost:11434");
/// assert_eq!(config.control.bind_address, "127.0.0.1:5140");
/// ```
///
/// # Fields Overview
///
/// - `proxy`: where the recording proxy listens and which upstream it forwards to
/// - `control`: where the control server (session API and live event stream) listens
/// - `storage`: optional override of the session log directory
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub proxy: ProxyConfig,
    pub control: ControlConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Reads and validates a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that both listen addresses parse and that the upstream is an
    /// absolute http(s) URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.proxy_address()?;
        self.control_address()?;
        let url = reqwest::Url::parse(&self.proxy.upstream_url)
            .map_err(|e| ConfigError::BadUpstreamUrl(format!("{}: {}", self.proxy.upstream_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::BadUpstreamUrl(format!(
                "{}: scheme must be http or https",
                self.proxy.upstream_url
            )));
        }
        Ok(())
    }

    pub fn proxy_address(&self) -> Result<SocketAddr, ConfigError> {
        parse_address(&self.proxy.bind_address)
    }

    pub fn control_address(&self) -> Result<SocketAddr, ConfigError> {
        parse_address(&self.control.bind_address)
    }

    /// Resolved session log directory.
    pub fn sessions_dir(&self) -> Result<PathBuf, ConfigError> {
        paths::sessions_dir(self.storage.sessions_dir.as_deref())
    }
}

fn parse_address(address: &str) -> Result<SocketAddr, ConfigError> {
    address
        .parse()
        .map_err(|e| ConfigError::BadAddressFormatting(format!("{}: {}", address, e)))
}
