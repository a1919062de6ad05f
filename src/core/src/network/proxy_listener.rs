//! # Proxy Listener Module
//!
//! Binds the capture interceptor to a socket. Every request, whatever its
//! method or path, is buffered and handed to [`HttpCapture`]; the upstream's
//! answer is relayed back as-is.
//!
//! ```text
//! ┌─────────────┐    ┌───────────────┐    ┌─────────────┐
//! │ Client      │───▶│ ProxyListener │───▶│ Upstream    │
//! └─────────────┘    │  HttpCapture  │    └─────────────┘
//!                    └───────┬───────┘
//!                            ▼
//!                       SessionSink
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use log::info;
use warp::http::{HeaderMap, Method, StatusCode};
use warp::path::FullPath;
use warp::reply::{self, Response};
use warp::{Filter, Rejection, Reply};

use crate::data_capture::http_capture::HttpCapture;
use crate::data_capture::types::{InboundRequest, UpstreamResponse};
use crate::error_handling::types::CaptureError;

pub struct ProxyListener {
    capture: Arc<HttpCapture>,
}

impl ProxyListener {
    pub fn new(capture: Arc<HttpCapture>) -> Self {
        Self { capture }
    }

    /// Catch-all filter forwarding every request through the interceptor.
    pub fn routes(&self) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
        let capture = Arc::clone(&self.capture);
        warp::method()
            .and(warp::path::full())
            .and(warp::query::raw().or(warp::any().map(String::new)).unify())
            .and(warp::header::headers_cloned())
            .and(warp::body::bytes())
            .and_then(
                move |method: Method, path: FullPath, query: String, headers: HeaderMap, body: Bytes| {
                    let capture = Arc::clone(&capture);
                    async move {
                        let request = InboundRequest {
                            method,
                            path: path.as_str().to_string(),
                            query,
                            headers,
                            body,
                        };
                        let response = match capture.handle(request).await {
                            Ok(upstream) => relay(upstream),
                            Err(e) => gateway_error(&e),
                        };
                        Ok::<_, Rejection>(response)
                    }
                },
            )
    }

    /// Serves until the process exits.
    pub async fn run(self, addr: SocketAddr) {
        info!("Proxy listening on {} -> {}", addr, self.capture.upstream());
        warp::serve(self.routes()).run(addr).await;
    }
}

fn relay(upstream: UpstreamResponse) -> Response {
    let mut response = reply::with_status(upstream.body.to_vec(), upstream.status).into_response();
    *response.headers_mut() = upstream.headers;
    response
}

fn gateway_error(e: &CaptureError) -> Response {
    reply::with_status(e.to_string(), StatusCode::BAD_GATEWAY).into_response()
}
