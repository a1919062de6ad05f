use std::sync::Arc;

use log::{debug, error};
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use super::types::{ApiError, SessionsQuery, StatusResponse};
use crate::storage::session_filter::SessionFilter;
use crate::storage::storage_trait::Storage;
use crate::storage::types::SessionSummary;

fn error_reply(message: impl Into<String>, status: StatusCode) -> reply::Response {
    reply::with_status(reply::json(&ApiError::new(message)), status).into_response()
}

/// GET /status
pub fn status_route() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("status").and(warp::path::end()).and(warp::get()).map(|| {
        reply::json(&StatusResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    })
}

/// GET /sessions?filter=...&limit=...
///
/// The filter is compiled before any log is read, so a bad expression is a
/// 400 and never an empty list.
pub fn list_sessions_route(
    storage: Arc<dyn Storage>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("sessions")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<SessionsQuery>())
        .and_then(move |query: SessionsQuery| {
            let storage = storage.clone();
            async move {
                let filter = match SessionFilter::parse(query.filter.as_deref().unwrap_or("")) {
                    Ok(f) => f,
                    Err(e) => {
                        debug!("Rejected session query: {}", e);
                        return Ok::<_, Rejection>(error_reply(
                            format!("invalid filter: {}", e),
                            StatusCode::BAD_REQUEST,
                        ));
                    }
                };
                match storage.get_sessions(Some(&filter)) {
                    Ok(sessions) => {
                        let summaries: Vec<SessionSummary> = sessions
                            .iter()
                            .take(query.limit.unwrap_or(usize::MAX))
                            .map(SessionSummary::from)
                            .collect();
                        Ok(reply::json(&summaries).into_response())
                    }
                    Err(e) => {
                        error!("Failed to load sessions: {}", e);
                        Ok(error_reply("Failed to load sessions", StatusCode::INTERNAL_SERVER_ERROR))
                    }
                }
            }
        })
}

/// GET /sessions/:id
pub fn get_session_route(
    storage: Arc<dyn Storage>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("sessions" / String)
        .and(warp::get())
        .and_then(move |id: String| {
            let storage = storage.clone();
            async move {
                let res = match storage.get_session(&id) {
                    Ok(Some(session)) => reply::json(&session).into_response(),
                    Ok(None) => error_reply(format!("session not found: {}", id), StatusCode::NOT_FOUND),
                    Err(e) => {
                        error!("Failed to load session {}: {}", id, e);
                        error_reply("Failed to load session", StatusCode::INTERNAL_SERVER_ERROR)
                    }
                };
                Ok::<_, Rejection>(res)
            }
        })
}
