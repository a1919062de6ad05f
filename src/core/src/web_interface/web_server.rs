use std::net::SocketAddr;
use std::sync::Arc;

use log::info;
use warp::{Filter, Rejection, Reply};

use super::events::events_route;
use super::routes::{get_session_route, list_sessions_route, status_route};
use crate::live_events::broker::Broker;
use crate::storage::storage_trait::Storage;

/// Control server: session queries plus the live event stream.
pub struct WebServer {
    storage: Arc<dyn Storage>,
    broker: Broker,
}

impl WebServer {
    /// Create a new WebServer instance
    pub fn new(storage: Arc<dyn Storage>, broker: Broker) -> Self {
        Self { storage, broker }
    }

    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
        status_route()
            .or(list_sessions_route(self.storage.clone()))
            .or(get_session_route(self.storage.clone()))
            .or(events_route(self.broker.clone()))
    }

    /// Serves until the process exits.
    pub async fn start(&self, addr: SocketAddr) {
        info!("Control server listening on http://{}", addr);
        warp::serve(self.routes()).run(addr).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_management::Session;
    use crate::storage::file_storage::FileStorage;
    use crate::storage::types::SessionSummary;
    use crate::web_interface::types::{ApiError, StatusResponse};
    use chrono::{TimeZone, Utc};
    use futures::StreamExt;
    use serde_json::Value;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    fn free_addr() -> SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    async fn serve(server: WebServer) -> String {
        let addr = free_addr();
        tokio::spawn(async move { server.start(addr).await });
        for _ in 0..100 {
            if tokio::net::TcpStream::connect(addr).await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        format!("http://{}", addr)
    }

    fn session(id: &str, model: &str, latency_ms: u64, hour: u32) -> Session {
        let mut s = Session {
            id: id.to_string(),
            ..Default::default()
        };
        s.request.model = Some(model.to_string());
        s.metadata.latency_ms = latency_ms;
        s.metadata.timestamp = Utc.with_ymd_and_hms(2025, 7, 6, hour, 0, 0).unwrap();
        s
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let mut f = std::fs::File::create(dir.path().join("chat-2025-07-06.jsonl")).unwrap();
        for s in [
            session("a", "gpt-4", 500, 1),
            session("b", "gpt-3", 1500, 2),
            session("c", "gpt-4", 800, 3),
        ] {
            writeln!(f, "{}", serde_json::to_string(&s).unwrap()).unwrap();
        }
        dir
    }

    async fn server_for(dir: &TempDir) -> (String, Broker) {
        let broker = Broker::new();
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path()));
        let base = serve(WebServer::new(storage, broker.clone())).await;
        (base, broker)
    }

    #[tokio::test]
    async fn test_status() {
        let dir = TempDir::new().unwrap();
        let (base, _) = server_for(&dir).await;
        let status: StatusResponse = reqwest::get(format!("{}/status", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status.status, "ok");
        assert_eq!(status.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_list_sessions() {
        let dir = fixture();
        let (base, _) = server_for(&dir).await;

        let all: Vec<SessionSummary> = reqwest::get(format!("{}/sessions", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let ids: Vec<&str> = all.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(all[0].model, "gpt-4");

        let fast: Vec<SessionSummary> = reqwest::get(format!("{}/sessions?filter=metadata.latency_ms%3C1000&limit=1", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(fast.len(), 1);
        assert_eq!(fast[0].id, "c");

        let none: Vec<SessionSummary> = reqwest::get(format!("{}/sessions?filter=request.model%3Dllama", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_filter_is_bad_request() {
        let dir = fixture();
        let (base, _) = server_for(&dir).await;
        let res = reqwest::get(format!("{}/sessions?filter=request.model", base)).await.unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
        let err: ApiError = res.json().await.unwrap();
        assert!(err.message.starts_with("invalid filter"));
    }

    #[tokio::test]
    async fn test_get_session() {
        let dir = fixture();
        let (base, _) = server_for(&dir).await;

        let found: Session = reqwest::get(format!("{}/sessions/b", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(found.request.model.as_deref(), Some("gpt-3"));

        let res = reqwest::get(format!("{}/sessions/missing", base)).await.unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_events_stream_published_sessions() {
        let dir = TempDir::new().unwrap();
        let (base, broker) = server_for(&dir).await;

        let res = reqwest::get(format!("{}/events", base)).await.unwrap();
        assert!(res.status().is_success());
        for _ in 0..100 {
            if broker.subscriber_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(broker.subscriber_count(), 1);

        let published = session("live", "gpt-4", 10, 4);
        broker.publish(published.clone());

        let mut body = res.bytes_stream();
        let mut buffer = String::new();
        let frame = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(chunk) = body.next().await {
                buffer.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
                if let Some(end) = buffer.find("\n\n") {
                    return buffer[..end].to_string();
                }
            }
            panic!("stream ended before a frame arrived");
        })
        .await
        .unwrap();

        assert!(frame.lines().any(|l| l == "event:session"));
        let data = frame.lines().find_map(|l| l.strip_prefix("data:")).unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(data).unwrap(),
            serde_json::to_value(&published).unwrap()
        );
    }
}
