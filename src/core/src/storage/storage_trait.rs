//! Storage Trait
//!
//! This module defines the `Storage` trait, the read-side interface the
//! control server and the command line use to query recorded sessions.
//!
//! Writes do not go through this trait: sessions are appended by the
//! recorder (see [`crate::data_capture::recorder`]) and storage backends only
//! observe what has been written.

use crate::error_handling::types::StorageError;
use crate::session_management::Session;
use crate::storage::session_filter::SessionFilter;

/// The `Storage` trait defines the interface for session storage backends.
///
/// All methods return a `Result` to handle potential storage errors.
pub trait Storage: Send + Sync {
    /// Retrieves sessions newest first, optionally filtered.
    fn get_sessions(&self, filter: Option<&SessionFilter>) -> Result<Vec<Session>, StorageError>;

    /// Retrieves one session by id, `None` if no record carries it.
    fn get_session(&self, id: &str) -> Result<Option<Session>, StorageError>;
}
