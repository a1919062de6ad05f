//! Live session events.
//!
//! The [`watcher`] notices sessions appended to the log directory and hands
//! each new one to the [`broker`], which fans it out to every subscriber
//! (typically one per open event stream).

pub mod broker;
pub mod watcher;

pub use broker::{Broker, Subscription};
pub use watcher::{SessionWatcher, WatchHandle};
