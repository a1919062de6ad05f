//! Live session feed over Server-Sent Events.
//!
//! Each connection owns one broker subscription for as long as its stream
//! lives. When the client goes away warp drops the stream, which drops the
//! subscription and removes it from the broker; the periodic keep-alive
//! comment makes a silent disconnect surface as a failed write. Only
//! sessions published after the connection opened are sent.

use std::convert::Infallible;

use futures::{stream, Stream, StreamExt};
use log::{debug, error};
use warp::sse::Event;
use warp::{Filter, Rejection, Reply};

use crate::live_events::broker::{Broker, Subscription};

/// Name of the SSE event carrying one session.
pub const SESSION_EVENT: &str = "session";

/// JSON encodings of the sessions arriving on `subscription`.
pub fn session_payloads(subscription: Subscription) -> impl Stream<Item = Result<String, serde_json::Error>> {
    stream::unfold(subscription, |mut sub| async move {
        let session = sub.recv().await?;
        Some((serde_json::to_string(session.as_ref()), sub))
    })
}

/// SSE frames for `subscription`. Sessions that fail to encode are skipped.
pub fn session_events(subscription: Subscription) -> impl Stream<Item = Result<Event, Infallible>> {
    let id = subscription.id();
    session_payloads(subscription).filter_map(move |payload| async move {
        match payload {
            Ok(data) => {
                debug!("Streaming session to subscriber {}", id);
                Some(Ok(Event::default().event(SESSION_EVENT).data(data)))
            }
            Err(e) => {
                error!("Failed to encode session for subscriber {}: {}", id, e);
                None
            }
        }
    })
}

/// GET /events
pub fn events_route(broker: Broker) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("events")
        .and(warp::path::end())
        .and(warp::get())
        .map(move || warp::sse::reply(warp::sse::keep_alive().stream(session_events(broker.subscribe()))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_management::Session;
    use serde_json::Value;
    use tokio_test::{assert_pending, assert_ready};

    fn session(id: &str) -> Session {
        let mut s = Session {
            id: id.to_string(),
            ..Default::default()
        };
        s.request.model = Some("gpt".into());
        s.metadata.tags = vec!["qa".into()];
        s
    }

    #[tokio::test]
    async fn test_payload_is_the_published_session() {
        let broker = Broker::new();
        let mut payloads = Box::pin(session_payloads(broker.subscribe()));
        let published = session("s1");
        broker.publish(published.clone());

        let json = payloads.next().await.unwrap().unwrap();
        let decoded: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, published);
        assert_eq!(
            serde_json::from_str::<Value>(&json).unwrap(),
            serde_json::to_value(&published).unwrap()
        );
    }

    #[tokio::test]
    async fn test_waits_until_something_is_published() {
        let broker = Broker::new();
        let mut task = tokio_test::task::spawn(session_payloads(broker.subscribe()));
        assert_pending!(task.poll_next());

        broker.publish(session("s2"));
        assert!(task.is_woken());
        let json = assert_ready!(task.poll_next()).unwrap().unwrap();
        assert!(json.contains("\"s2\""));
    }

    #[tokio::test]
    async fn test_dropping_the_stream_unsubscribes() {
        let broker = Broker::new();
        let events = session_events(broker.subscribe());
        assert_eq!(broker.subscriber_count(), 1);
        drop(events);
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_ends_with_the_broker() {
        let broker = Broker::new();
        let mut payloads = Box::pin(session_payloads(broker.subscribe()));
        drop(broker);
        assert!(payloads.next().await.is_none());
    }
}
