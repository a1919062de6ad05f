//! Deterministic content hash of a session.
//!
//! The digest is the lowercase hex SHA-256 of the session's JSON encoding with
//! `metadata.session_hash` cleared, so a stored record can always be checked
//! against its own hash.

use sha2::{Digest, Sha256};

use super::session::Session;

/// Returns the content hash of `session`, ignoring its current hash field.
pub fn compute_hash(session: &Session) -> Result<String, serde_json::Error> {
    let mut copy = session.clone();
    copy.metadata.session_hash.clear();
    let encoded = serde_json::to_vec(&copy)?;
    Ok(hex::encode(Sha256::digest(&encoded)))
}

impl Session {
    /// Computes and stores the content hash.
    pub fn seal(&mut self) -> Result<(), serde_json::Error> {
        self.metadata.session_hash = compute_hash(self)?;
        Ok(())
    }

    /// `true` when the stored hash matches the record's current content.
    pub fn verify_hash(&self) -> Result<bool, serde_json::Error> {
        Ok(!self.metadata.session_hash.is_empty() && compute_hash(self)? == self.metadata.session_hash)
    }
}
