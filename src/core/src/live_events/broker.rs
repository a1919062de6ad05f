use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use log::debug;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::session_management::Session;

/// Queue depth of each subscriber.
pub const SUBSCRIBER_CAPACITY: usize = 10;

type Subscribers = HashMap<u64, mpsc::Sender<Arc<Session>>>;

#[derive(Debug, Default)]
struct BrokerInner {
    next_id: AtomicU64,
    subscribers: Mutex<Subscribers>,
}

impl BrokerInner {
    fn subscribers(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove(&self, id: u64) -> bool {
        let removed = self.subscribers().remove(&id).is_some();
        if removed {
            debug!("Subscriber {} left", id);
        }
        removed
    }
}

/// Fan-out hub for newly observed sessions.
///
/// Cloning yields another handle to the same subscriber set. Publishing never
/// waits: a subscriber whose queue is full simply misses that session.
#[derive(Debug, Clone, Default)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber with a bounded queue. Dropping the returned
    /// handle unsubscribes it.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers().insert(id, tx);
        debug!("Subscriber {} joined", id);
        Subscription {
            id,
            receiver: rx,
            broker: Arc::downgrade(&self.inner),
        }
    }

    /// Deregisters `subscription` and releases its queue.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Offers `session` to every subscriber. Returns how many queues took it.
    pub fn publish(&self, session: Session) -> usize {
        let session = Arc::new(session);
        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let subscribers = self.inner.subscribers();
            for (id, tx) in subscribers.iter() {
                match tx.try_send(Arc::clone(&session)) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        debug!("Subscriber {} queue full, dropping session {}", id, session.id)
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }
        for id in closed {
            self.inner.remove(id);
        }
        debug!("Published session {} to {} subscriber(s)", session.id, delivered);
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers().len()
    }
}

/// One subscriber's end of the broker.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<Arc<Session>>,
    broker: Weak<BrokerInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the next session. `None` once the broker is gone.
    pub async fn recv(&mut self) -> Option<Arc<Session>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<Session>> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.broker.upgrade() {
            inner.remove(self.id);
        }
    }
}
