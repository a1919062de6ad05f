//! Where session logs live.
//!
//! Resolution order: an explicit directory from the configuration, then
//! `$PROMPTLOG_HOME/sessions`, then `<platform data dir>/promptlog/sessions`.

use std::env;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error_handling::types::ConfigError;

pub const HOME_ENV: &str = "PROMPTLOG_HOME";
pub const APP_SUBDIR: &str = "promptlog";
pub const SESSIONS_SUBDIR: &str = "sessions";
/// Extension of session log files; the watcher ignores everything else.
pub const LOG_EXTENSION: &str = "jsonl";

pub fn promptlog_home() -> Result<PathBuf, ConfigError> {
    if let Some(home) = env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    dirs::data_dir()
        .map(|d| d.join(APP_SUBDIR))
        .ok_or_else(|| ConfigError::DirectoryUnavailable("could not determine the user data directory".into()))
}

pub fn sessions_dir(configured: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match configured {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Ok(promptlog_home()?.join(SESSIONS_SUBDIR)),
    }
}

/// `chat-YYYY-MM-DD.jsonl` inside `dir`.
pub fn session_log_file(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("chat-{}.{}", date.format("%Y-%m-%d"), LOG_EXTENSION))
}

pub fn is_session_log(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(LOG_EXTENSION)
}
