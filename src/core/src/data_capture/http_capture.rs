use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{debug, error, trace, warn};
use reqwest::header;
use reqwest::{redirect, Client, Url};
use serde_json::Value;

use super::storage::SessionSink;
use super::types::{strip_hop_by_hop, InboundRequest, UpstreamResponse};
use crate::error_handling::types::CaptureError;
use crate::session_management::{CompletionRequest, CompletionResponse, Session};

/// Forwards client requests to one upstream and records completion exchanges.
///
/// Forwarding always comes first: the caller gets the upstream's status,
/// headers and body as soon as they are buffered, and recording then happens
/// on the blocking pool, where its failures are only logged.
pub struct HttpCapture {
    client: Client,
    upstream: String,
    sink: Arc<dyn SessionSink>,
}

impl HttpCapture {
    pub fn new(upstream: &str, sink: Arc<dyn SessionSink>) -> Result<Self, CaptureError> {
        let url = Url::parse(upstream).map_err(|e| CaptureError::InvalidUpstream(format!("{}: {}", upstream, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CaptureError::InvalidUpstream(format!(
                "{}: scheme must be http or https",
                upstream
            )));
        }
        let client = Client::builder().redirect(redirect::Policy::none()).build()?;
        Ok(Self {
            client,
            upstream: upstream.trim_end_matches('/').to_string(),
            sink,
        })
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Upstream base joined with the inbound path and query.
    pub fn target_url(&self, path: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}{}", self.upstream, path)
        } else {
            format!("{}{}?{}", self.upstream, path, query)
        }
    }

    /// Replays `request` against the upstream and buffers the full answer.
    pub async fn forward(&self, request: &InboundRequest) -> Result<UpstreamResponse, CaptureError> {
        let url = self.target_url(&request.path, &request.query);
        let mut headers = request.headers.clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        trace!("{} {} -> {}", request.method, request.path, url);
        let response = self
            .client
            .request(request.method.clone(), &url)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| {
                warn!("Upstream request to {} failed: {}", url, e);
                CaptureError::Upstream(e)
            })?;

        let status = response.status();
        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);
        let body = response.bytes().await.map_err(|e| {
            warn!("Reading upstream body from {} failed: {}", url, e);
            CaptureError::Upstream(e)
        })?;
        trace!("{} {} <- {} ({} bytes)", request.method, request.path, status, body.len());
        Ok(UpstreamResponse { status, headers, body })
    }

    /// Forwards `request`; completion exchanges are then recorded in the
    /// background. Only transport failures reach the caller.
    ///
    /// The recorded latency runs from receiving `request` until the upstream
    /// body is fully buffered. Writing it back to the client happens later in
    /// warp and is not included.
    pub async fn handle(&self, request: InboundRequest) -> Result<UpstreamResponse, CaptureError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let response = self.forward(&request).await?;
        let latency_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        if request.is_recordable() {
            let sink = Arc::clone(&self.sink);
            let relayed = response.clone();
            tokio::task::spawn_blocking(move || {
                record_exchange(sink.as_ref(), &request, &relayed, started_at, latency_ms);
            });
        }
        Ok(response)
    }
}

/// Builds the session for one exchange, or `None` when the request body is
/// not a JSON object.
pub fn build_session(
    request: &InboundRequest,
    response: &UpstreamResponse,
    started_at: DateTime<Utc>,
    latency_ms: u64,
) -> Option<Session> {
    let payload = match serde_json::from_slice::<Value>(&request.body) {
        Ok(v @ Value::Object(_)) => v,
        Ok(_) => {
            debug!("Not recording {}: request body is not a JSON object", request.path);
            return None;
        }
        Err(e) => {
            debug!("Not recording {}: request body is not JSON: {}", request.path, e);
            return None;
        }
    };
    let stream = payload.get("stream").and_then(Value::as_bool).unwrap_or(false);
    let body = serde_json::from_slice::<Value>(&response.body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&response.body).into_owned()));

    let mut session = Session::captured(
        started_at,
        CompletionRequest::from_payload(request.method.as_str(), &request.path, payload),
        CompletionResponse::from_upstream(response.status.as_u16(), body),
        stream,
        latency_ms,
    );
    if let Err(e) = session.seal() {
        warn!("[{}] session hash failed: {}", session.id, e);
    }
    Some(session)
}

/// Builds and records one exchange. Returns the id of the recorded session.
pub fn record_exchange(
    sink: &dyn SessionSink,
    request: &InboundRequest,
    response: &UpstreamResponse,
    started_at: DateTime<Utc>,
    latency_ms: u64,
) -> Option<String> {
    let session = build_session(request, response, started_at, latency_ms)?;
    match sink.record(&session) {
        Ok(()) => {
            debug!("[{}] recorded {} {} ({} ms)", session.id, request.method, request.path, latency_ms);
            Some(session.id)
        }
        Err(e) => {
            error!("[{}] failed to record session: {}", session.id, e);
            None
        }
    }
}
