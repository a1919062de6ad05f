//! Append-only persistence of sessions as JSON Lines.
//!
//! [`Recorder`] owns one open log file and appends one session per line.
//! [`SessionLog`] sits on top of it for the capture daemon: it keeps a
//! recorder for the current UTC day and rolls over to a new file when the
//! date changes, so each file covers one capture period and file names sort
//! chronologically.
//!
//! Writes go straight to the file without an extra buffer layer; a whole line
//! is handed to a single `write_all` under the recorder's lock, so concurrent
//! callers never interleave partial lines. No fsync is issued.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, Utc};
use log::{debug, error, info};

use crate::configuration::paths;
use crate::error_handling::types::RecorderError;
use crate::session_management::Session;

use super::storage::SessionSink;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Writes sessions to one JSON Lines file.
#[derive(Debug)]
pub struct Recorder {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl Recorder {
    /// Opens `path` for appending, creating the file if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RecorderError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| {
                error!("Failed to open session log {}: {}", path.display(), source);
                RecorderError::OpenFailed {
                    path: path.clone(),
                    source,
                }
            })?;
        debug!("Recorder opened {}", path.display());
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serializes `session` and appends it as one line.
    pub fn record(&self, session: &Session) -> Result<(), RecorderError> {
        let mut line = serde_json::to_vec(session)?;
        line.push(b'\n');

        let mut guard = lock(&self.file);
        let file = guard.as_mut().ok_or(RecorderError::Closed)?;
        file.write_all(&line)?;
        debug!("[{}] recorded to {}", session.id, self.path.display());
        Ok(())
    }

    /// Releases the file. Closing an already closed recorder is a no-op.
    pub fn close(&self) -> Result<(), RecorderError> {
        if let Some(mut file) = lock(&self.file).take() {
            file.flush()?;
            debug!("Recorder closed {}", self.path.display());
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.file).is_none()
    }
}

impl SessionSink for Recorder {
    fn record(&self, session: &Session) -> Result<(), RecorderError> {
        Recorder::record(self, session)
    }
}

/// Directory of daily session logs, written through one recorder per day.
#[derive(Debug)]
pub struct SessionLog {
    dir: PathBuf,
    current: Mutex<Option<(NaiveDate, Recorder)>>,
}

impl SessionLog {
    /// Creates the directory if needed. The first file is opened lazily.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, RecorderError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| RecorderError::OpenFailed {
            path: dir.clone(),
            source,
        })?;
        info!("Session log directory: {}", dir.display());
        Ok(Self {
            dir,
            current: Mutex::new(None),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_on(&self, date: NaiveDate, session: &Session) -> Result<(), RecorderError> {
        let mut current = lock(&self.current);
        let stale = current.as_ref().map_or(true, |(d, _)| *d != date);
        if stale {
            let recorder = Recorder::open(paths::session_log_file(&self.dir, date))?;
            if let Some((_, old)) = current.replace((date, recorder)) {
                old.close()?;
            }
        }
        match current.as_ref() {
            Some((_, recorder)) => recorder.record(session),
            None => Err(RecorderError::Closed),
        }
    }

    pub fn close(&self) -> Result<(), RecorderError> {
        match lock(&self.current).take() {
            Some((_, recorder)) => recorder.close(),
            None => Ok(()),
        }
    }
}

impl SessionSink for SessionLog {
    fn record(&self, session: &Session) -> Result<(), RecorderError> {
        self.record_on(Utc::now().date_naive(), session)
    }
}
