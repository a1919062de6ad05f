//! Network front door of the capture proxy.

pub mod proxy_listener;

pub use proxy_listener::ProxyListener;
