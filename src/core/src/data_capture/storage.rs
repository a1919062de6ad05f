use crate::error_handling::types::RecorderError;
use crate::session_management::Session;

/// Destination for captured sessions.
///
/// Implementations must tolerate concurrent calls: each `record` appends one
/// whole session or fails without leaving a partial entry behind.
pub trait SessionSink: Send + Sync {
    fn record(&self, session: &Session) -> Result<(), RecorderError>;
}
