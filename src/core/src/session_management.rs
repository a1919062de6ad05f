//! Session model core module.
//!
//! This module provides the canonical record of one captured request/response
//! transaction, its origin tag, and the deterministic content hash attached to
//! every record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Submodule for the content hash of a session.
pub mod hash;
/// Submodule for the session record and its payload types.
pub mod session;

pub use hash::compute_hash;
pub use session::{CompletionRequest, CompletionResponse, Metadata, Session, Usage};

/// Describes how a session was produced.
///
/// Variants:
/// - `Manual`: recorded by hand or by an ad-hoc tool.
/// - `Framework`: emitted by an application framework integration.
/// - `ModelKit`: produced from a packaged model artifact.
/// - `Proxy`: captured by the recording proxy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    #[default]
    Manual,
    Framework,
    #[serde(rename = "modelkit")]
    ModelKit,
    Proxy,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Origin::Manual => "manual",
            Origin::Framework => "framework",
            Origin::ModelKit => "modelkit",
            Origin::Proxy => "proxy",
        };
        f.write_str(s)
    }
}
