//! Recording proxy for LLM completion traffic.
//!
//! Requests to an upstream completion API are forwarded unchanged; completion
//! exchanges are stored as sessions in daily JSON Lines logs, can be queried
//! with a small filter language and are pushed live to subscribers as they
//! appear on disk.

pub mod configuration;
pub mod controller;
pub mod data_capture;
pub mod error_handling;
pub mod live_events;
pub mod network;
pub mod session_management;
pub mod storage;
pub mod web_interface;

pub use session_management::{Origin, Session};
