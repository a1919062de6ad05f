use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};

use crate::configuration::config::Config;
use crate::data_capture::http_capture::HttpCapture;
use crate::data_capture::recorder::SessionLog;
use crate::error_handling::types::*;
use crate::live_events::broker::Broker;
use crate::live_events::watcher::SessionWatcher;
use crate::network::proxy_listener::ProxyListener;
use crate::session_management::Session;
use crate::storage::file_storage::FileStorage;
use crate::storage::session_filter::SessionFilter;
use crate::storage::storage_trait::Storage;
use crate::storage::types::SessionSummary;
use crate::web_interface::web_server::WebServer;

/// Wires the subsystems together for each run mode of the binary.
pub struct Controller {
    pub config: Config,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn sessions_dir(&self) -> Result<PathBuf, ControllerError> {
        Ok(self.config.sessions_dir()?)
    }

    pub fn storage(&self) -> Result<FileStorage, ControllerError> {
        Ok(FileStorage::new(self.sessions_dir()?))
    }

    /// Runs the recording proxy until Ctrl-C.
    pub async fn run_proxy(&self) -> Result<(), ControllerError> {
        let addr = self.config.proxy_address()?;
        let log = Arc::new(SessionLog::new(self.sessions_dir()?)?);
        let capture = HttpCapture::new(&self.config.proxy.upstream_url, log.clone())?;
        let listener = ProxyListener::new(Arc::new(capture));

        tokio::select! {
            _ = listener.run(addr) => {}
            _ = tokio::signal::ctrl_c() => info!("Shutting down proxy"),
        }
        log.close()?;
        Ok(())
    }

    /// Runs the control server and the directory watcher until Ctrl-C.
    pub async fn run_control_server(&self) -> Result<(), ControllerError> {
        let addr = self.config.control_address()?;
        let dir = self.sessions_dir()?;
        let broker = Broker::new();
        let watcher = Arc::new(SessionWatcher::new(&dir, broker.clone()));
        let handle = watcher.start()?;

        let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(&dir));
        let server = WebServer::new(storage, broker);
        tokio::select! {
            _ = server.start(addr) => {}
            _ = tokio::signal::ctrl_c() => info!("Shutting down control server"),
        }
        handle.stop();
        Ok(())
    }

    /// Summaries of matching sessions, newest first. The filter is compiled
    /// before anything is read.
    pub fn list_sessions(&self, filter: &str, limit: Option<usize>) -> Result<Vec<SessionSummary>, ControllerError> {
        let filter = SessionFilter::parse(filter)?;
        let sessions = self.storage()?.get_sessions(Some(&filter))?;
        Ok(sessions
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(SessionSummary::from)
            .collect())
    }

    pub fn view_session(&self, id: &str) -> Result<Option<Session>, ControllerError> {
        let session = self.storage()?.get_session(id)?;
        // Publishing rewrites the record after capture, so only unpublished
        // sessions are expected to still match.
        if let Some(s) = &session {
            if s.metadata.published.is_none() && !s.metadata.session_hash.is_empty() && !s.verify_hash().unwrap_or(false) {
                warn!("Session {} no longer matches its recorded hash", id);
            }
        }
        Ok(session)
    }
}
