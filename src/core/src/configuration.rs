pub mod config;
pub mod paths;
pub mod types;

pub use config::Config;
pub use types::{ControlConfig, ProxyConfig, StorageConfig};
