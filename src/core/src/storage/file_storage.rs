use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::configuration::paths;
use crate::error_handling::types::StorageError;
use crate::session_management::Session;
use crate::storage::session_filter::SessionFilter;
use crate::storage::storage_trait::Storage;

/// Read-only view over a directory of JSONL session logs.
///
/// Nothing is cached: every query rescans the directory, so records appended
/// by a running recorder (or edited by an external annotator) are always
/// visible on the next call.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Log files in lexical order, which is also chronological order.
    pub fn log_files(&self) -> Result<Vec<PathBuf>, StorageError> {
        if !self.dir.exists() {
            debug!("Session directory {} does not exist yet", self.dir.display());
            return Ok(Vec::new());
        }
        if !self.dir.is_dir() {
            return Err(StorageError::DirectoryMissing(self.dir.clone()));
        }
        let read_failed = |source| StorageError::ReadFailed {
            path: self.dir.clone(),
            source,
        };
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(read_failed)? {
            let path = entry.map_err(read_failed)?.path();
            if path.is_file() && paths::is_session_log(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Loads every session in file order, then line order. Corrupt lines are
    /// skipped with a warning; an unreadable file fails the whole load.
    pub fn load_sessions(&self) -> Result<Vec<Session>, StorageError> {
        let mut sessions = Vec::new();
        for path in self.log_files()? {
            load_file(&path, &mut sessions)?;
        }
        debug!("Loaded {} session(s) from {}", sessions.len(), self.dir.display());
        Ok(sessions)
    }
}

fn load_file(path: &Path, out: &mut Vec<Session>) -> Result<(), StorageError> {
    let read_failed = |source| StorageError::ReadFailed {
        path: path.to_path_buf(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(read_failed)?);
    // Raw bytes per line: a record torn inside a multi-byte character is
    // just another corrupt line.
    for (index, line) in reader.split(b'\n').enumerate() {
        let line = line.map_err(read_failed)?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<Session>(&line) {
            Ok(session) => out.push(session),
            Err(e) => warn!("Skipping corrupt session line {}:{}: {}", path.display(), index + 1, e),
        }
    }
    Ok(())
}

impl Storage for FileStorage {
    fn get_sessions(&self, filter: Option<&SessionFilter>) -> Result<Vec<Session>, StorageError> {
        let mut sessions = self.load_sessions()?;
        let loaded = sessions.len();
        if let Some(f) = filter {
            sessions.retain(|s| f.matches_session(s));
        }
        sessions.sort_by(|a, b| b.metadata.timestamp.cmp(&a.metadata.timestamp));
        debug!("{} of {} session(s) matched", sessions.len(), loaded);
        Ok(sessions)
    }

    fn get_session(&self, id: &str) -> Result<Option<Session>, StorageError> {
        // Later lines win when ids collide.
        Ok(self.load_sessions()?.into_iter().rev().find(|s| s.id == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Write;
    use tempfile::TempDir;

    fn session(id: &str, model: &str, hour: u32) -> Session {
        let mut s = Session {
            id: id.to_string(),
            ..Default::default()
        };
        s.request.model = Some(model.to_string());
        s.metadata.timestamp = Utc.with_ymd_and_hms(2025, 7, 6, hour, 0, 0).unwrap();
        s
    }

    fn write_lines(path: &Path, lines: &[String]) {
        let mut f = File::create(path).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
    }

    fn line(s: &Session) -> String {
        serde_json::to_string(s).unwrap()
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("nope"));
        assert!(storage.get_sessions(None).unwrap().is_empty());
        assert!(storage.get_session("x").unwrap().is_none());
    }

    #[test]
    fn test_path_that_is_a_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("sessions");
        fs::write(&file, "").unwrap();
        let err = FileStorage::new(&file).load_sessions().unwrap_err();
        assert!(matches!(err, StorageError::DirectoryMissing(_)));
    }

    #[test]
    fn test_loads_in_file_order_and_skips_corrupt_lines() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = TempDir::new().unwrap();
        write_lines(
            &dir.path().join("chat-2025-07-06.jsonl"),
            &[line(&session("c", "gpt", 3)), "{not json".into(), String::new()],
        );
        write_lines(
            &dir.path().join("chat-2025-07-05.jsonl"),
            &[line(&session("a", "gpt", 1)), line(&session("b", "llama", 2))],
        );
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let ids: Vec<String> = FileStorage::new(dir.path())
            .load_sessions()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_line_torn_inside_a_character_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut bytes = line(&session("a", "gpt", 1)).into_bytes();
        bytes.push(b'\n');
        bytes.extend_from_slice(b"{\"id\":\"trunc\xe2\x82\n");
        bytes.extend_from_slice(line(&session("b", "gpt", 2)).as_bytes());
        bytes.push(b'\n');
        fs::write(dir.path().join("chat-2025-07-06.jsonl"), bytes).unwrap();

        let ids: Vec<String> = FileStorage::new(dir.path())
            .load_sessions()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_get_sessions_sorted_newest_first_and_filtered() {
        let dir = TempDir::new().unwrap();
        write_lines(
            &dir.path().join("chat-2025-07-06.jsonl"),
            &[
                line(&session("a", "gpt", 1)),
                line(&session("c", "gpt", 9)),
                line(&session("b", "llama", 5)),
            ],
        );
        let storage = FileStorage::new(dir.path());

        let all: Vec<String> = storage.get_sessions(None).unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(all, vec!["c", "b", "a"]);

        let filter = SessionFilter::parse("request.model=gpt").unwrap();
        let gpt: Vec<String> = storage
            .get_sessions(Some(&filter))
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(gpt, vec!["c", "a"]);

        let filter = SessionFilter::parse("request.model=mistral").unwrap();
        assert!(storage.get_sessions(Some(&filter)).unwrap().is_empty());
    }

    #[test]
    fn test_get_session_last_writer_wins() {
        let dir = TempDir::new().unwrap();
        let mut annotated = session("a", "gpt", 1);
        annotated.metadata.published = Some("oci://reg/app:1".into());
        write_lines(
            &dir.path().join("chat-2025-07-06.jsonl"),
            &[line(&session("a", "gpt", 1)), line(&annotated)],
        );
        let storage = FileStorage::new(dir.path());
        let found = storage.get_session("a").unwrap().unwrap();
        assert_eq!(found.metadata.published.as_deref(), Some("oci://reg/app:1"));
        assert!(storage.get_session("zzz").unwrap().is_none());
    }
}
