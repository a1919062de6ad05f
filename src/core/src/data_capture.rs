//! Capture of upstream LLM traffic.
//!
//! [`http_capture::HttpCapture`] forwards each request and, for completion
//! endpoints, turns the exchange into a session that is handed to a
//! [`storage::SessionSink`], normally the daily [`recorder::SessionLog`].

pub mod http_capture;
pub mod recorder;
pub mod storage;
pub mod types;


pub use http_capture::HttpCapture;
pub use recorder::{Recorder, SessionLog};
pub use storage::SessionSink;
pub use types::{InboundRequest, UpstreamResponse, COMPLETION_ENDPOINTS};
