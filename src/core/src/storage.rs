//! Storage subsystem
//!
//! This module provides the read side of the session log: loading recorded
//! sessions back from disk and querying them.
//!
//! Components:
//! - `storage_trait`: the Storage trait defining a uniform query API.
//! - `file_storage`: JSONL log-directory backend.
//! - `session_filter`: the single-clause filter language.
//! - `types`: summary projection used by listings.

pub mod file_storage;
pub mod session_filter;
pub mod storage_trait;
pub mod types;

pub use file_storage::FileStorage;
pub use session_filter::SessionFilter;
pub use storage_trait::Storage;
pub use types::SessionSummary;
