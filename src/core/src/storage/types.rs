use serde::{Deserialize, Serialize};

use crate::session_management::{Origin, Session};

/// Condensed view of a session for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub model: String,
    pub origin: Origin,
    pub tokens: u64,
    pub latency_ms: u64,
    pub tags: Vec<String>,
    pub published: Option<String>,
}

impl From<&Session> for SessionSummary {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id.clone(),
            model: s.model().unwrap_or_default().to_string(),
            origin: s.origin,
            tokens: s.total_tokens(),
            latency_ms: s.metadata.latency_ms,
            tags: s.metadata.tags.clone(),
            published: s.metadata.published.clone(),
        }
    }
}
