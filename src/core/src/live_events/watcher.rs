use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::broker::Broker;
use crate::configuration::paths;
use crate::error_handling::types::{StorageError, WatchError};
use crate::storage::file_storage::FileStorage;

/// Turns a passive log directory into a stream of newly seen sessions.
///
/// Sessions present when [`SessionWatcher::seed`] runs are remembered but
/// never published. After that, every reconcile publishes each unseen id
/// exactly once, however often its file is rescanned.
pub struct SessionWatcher {
    storage: FileStorage,
    broker: Broker,
    known: Mutex<HashSet<String>>,
}

impl SessionWatcher {
    pub fn new<P: AsRef<Path>>(dir: P, broker: Broker) -> Self {
        Self {
            storage: FileStorage::new(dir),
            broker,
            known: Mutex::new(HashSet::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        self.storage.dir()
    }

    fn known(&self) -> MutexGuard<'_, HashSet<String>> {
        self.known.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn known_count(&self) -> usize {
        self.known().len()
    }

    /// Records every session already on disk as known.
    pub fn seed(&self) -> Result<usize, StorageError> {
        let sessions = self.storage.load_sessions()?;
        let mut known = self.known();
        known.extend(sessions.into_iter().map(|s| s.id));
        debug!("Watcher seeded with {} known session(s)", known.len());
        Ok(known.len())
    }

    /// Reloads the directory and publishes sessions not seen before.
    /// Returns how many were published.
    pub fn reconcile(&self) -> Result<usize, StorageError> {
        let sessions = self.storage.load_sessions()?;
        let fresh: Vec<_> = {
            let mut known = self.known();
            sessions.into_iter().filter(|s| known.insert(s.id.clone())).collect()
        };
        let count = fresh.len();
        for session in fresh {
            debug!("[{}] new session observed", session.id);
            self.broker.publish(session);
        }
        Ok(count)
    }

    /// Watches the directory, then seeds, and handles changes on a
    /// background thread until the returned handle is stopped or dropped.
    /// Sessions written while seeding are either seeded or picked up by the
    /// queued change event.
    pub fn start(self: Arc<Self>) -> Result<WatchHandle, WatchError> {
        fs::create_dir_all(self.dir())?;

        let (tx, rx) = mpsc::channel();
        let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            forward_event(res, &tx);
        })?;
        watcher.watch(self.dir(), RecursiveMode::NonRecursive)?;
        self.seed()?;
        info!("Watching {} for new sessions", self.dir().display());

        let this = Arc::clone(&self);
        let thread = thread::spawn(move || loop {
            match rx.recv_timeout(Duration::from_secs(60)) {
                Ok(event) => {
                    if !is_relevant(&event) {
                        continue;
                    }
                    trace!("Session log changed: {:?}", event.paths);
                    if let Err(e) = this.reconcile() {
                        error!("Failed to reload sessions from {}: {}", this.dir().display(), e);
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        });

        Ok(WatchHandle { watcher, thread })
    }
}

/// Passes a watch event on to the reconcile thread. Watch errors, such as
/// an event queue overflow, are logged and dropped.
fn forward_event(res: notify::Result<Event>, tx: &mpsc::Sender<Event>) -> bool {
    match res {
        Ok(event) => tx.send(event).is_ok(),
        Err(e) => {
            warn!("Session watch error: {}", e);
            false
        }
    }
}

fn is_relevant(event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| paths::is_session_log(p))
}

/// Keeps the filesystem watch alive. Dropping it ends the watch; the
/// background thread exits once the event channel closes.
pub struct WatchHandle {
    watcher: RecommendedWatcher,
    thread: JoinHandle<()>,
}

impl WatchHandle {
    /// Ends the watch and waits for the background thread.
    pub fn stop(self) {
        let WatchHandle { watcher, thread } = self;
        drop(watcher);
        if thread.join().is_err() {
            error!("Session watcher thread panicked");
        }
    }
}
