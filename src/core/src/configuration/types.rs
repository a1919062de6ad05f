use std::path::PathBuf;

use serde::Deserialize;

pub const DEFAULT_PROXY_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.openai.com";
pub const DEFAULT_CONTROL_ADDRESS: &str = "127.0.0.1:5140";

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub bind_address: String,
    pub upstream_url: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_PROXY_ADDRESS.to_string(),
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub bind_address: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_CONTROL_ADDRESS.to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub sessions_dir: Option<PathBuf>,
}
