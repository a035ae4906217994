// src/hub.rs

//! Broadcast hub: fans a reload notification out to every connected
//! streaming client.
//!
//! Each subscriber owns a small bounded queue. Broadcasting does a
//! non-blocking send into every queue and silently drops the message for
//! any queue that is full. The payload is an idempotent "something changed"
//! signal, so a dropped notification is harmless as long as a later one
//! gets through.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tracing::debug;

/// Per-subscriber queue depth. Slow consumers lose intermediate reload
/// signals once this fills up; the broadcaster never waits for them.
pub const SUBSCRIBER_CAPACITY: usize = 10;

/// Concurrency-safe registry of subscriber queues.
///
/// Constructed once at startup and handed to both the debouncer (producer)
/// and every streaming connection (consumers). The membership map is the
/// only state touched from multiple tasks; the lock is held only for map
/// mutation and iteration, never across a blocking send.
#[derive(Debug, Default)]
pub struct ReloadHub {
    subscribers: Mutex<HashMap<u64, mpsc::Sender<String>>>,
    next_id: AtomicU64,
}

impl ReloadHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new subscriber and adds it to the membership map.
    ///
    /// The returned [`Subscriber`] removes itself from the hub when
    /// dropped, so every exit path of a streaming connection unregisters
    /// exactly once.
    pub fn register(self: &Arc<Self>) -> Subscriber {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_subscribers().insert(id, tx);
        debug!("subscriber {id} registered");
        Subscriber {
            id,
            rx,
            hub: Arc::clone(self),
        }
    }

    /// Removes a subscriber from the membership map, closing its queue.
    /// A subscriber absent from the map receives nothing further.
    pub fn unregister(&self, id: u64) {
        if self.lock_subscribers().remove(&id).is_some() {
            debug!("subscriber {id} unregistered");
        }
    }

    /// Delivers `message` to every currently registered subscriber with a
    /// non-blocking send. A full queue drops the message for that
    /// subscriber only; other subscribers are unaffected.
    pub fn broadcast(&self, message: &str) {
        let subscribers = self.lock_subscribers();
        for (id, tx) in subscribers.iter() {
            if tx.try_send(message.to_owned()).is_err() {
                debug!("subscriber {id} queue full, dropping notification");
            }
        }
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, HashMap<u64, mpsc::Sender<String>>> {
        // A poisoned lock only means a panic elsewhere; the map itself is
        // still a valid HashMap.
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// One streaming connection's end of the hub: a bounded queue of reload
/// payloads. Unregisters itself from the hub on drop.
pub struct Subscriber {
    id: u64,
    rx: mpsc::Receiver<String>,
    hub: Arc<ReloadHub>,
}

impl Subscriber {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the next broadcast payload. Returns `None` once the
    /// subscriber has been unregistered and its queue drained.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Non-blocking receive, mainly useful in tests.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Subscriber {
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.hub.unregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_registered_subscriber() {
        let hub = Arc::new(ReloadHub::new());
        let mut subs: Vec<Subscriber> = (0..3).map(|_| hub.register()).collect();
        assert_eq!(hub.subscriber_count(), 3);

        hub.broadcast("reload");
        for sub in &mut subs {
            assert_eq!(sub.recv().await.as_deref(), Some("reload"));
        }
    }

    #[tokio::test]
    async fn full_queue_drops_silently_without_blocking_others() {
        let hub = Arc::new(ReloadHub::new());
        let mut full = hub.register();
        let mut empty = hub.register();

        // Saturate one queue past its capacity.
        for _ in 0..SUBSCRIBER_CAPACITY + 5 {
            hub.broadcast("reload");
        }
        // Only the first SUBSCRIBER_CAPACITY broadcasts fit in each queue.
        let mut delivered_to_full = 0;
        while full.try_recv().is_some() {
            delivered_to_full += 1;
        }
        assert_eq!(delivered_to_full, SUBSCRIBER_CAPACITY);

        let mut delivered_to_empty = 0;
        while empty.try_recv().is_some() {
            delivered_to_empty += 1;
        }
        assert_eq!(delivered_to_empty, SUBSCRIBER_CAPACITY);

        // The saturated subscriber does not prevent later deliveries.
        hub.broadcast("reload");
        assert_eq!(full.recv().await.as_deref(), Some("reload"));
    }

    #[tokio::test]
    async fn messages_arrive_in_broadcast_order() {
        let hub = Arc::new(ReloadHub::new());
        let mut sub = hub.register();
        hub.broadcast("one");
        hub.broadcast("two");
        hub.broadcast("three");
        assert_eq!(sub.recv().await.as_deref(), Some("one"));
        assert_eq!(sub.recv().await.as_deref(), Some("two"));
        assert_eq!(sub.recv().await.as_deref(), Some("three"));
    }

    #[tokio::test]
    async fn dropping_a_subscriber_unregisters_it() {
        let hub = Arc::new(ReloadHub::new());
        let first = hub.register();
        let mut second = hub.register();
        assert_eq!(hub.subscriber_count(), 2);

        drop(first);
        assert_eq!(hub.subscriber_count(), 1);

        // The survivor keeps receiving.
        hub.broadcast("reload");
        assert_eq!(second.recv().await.as_deref(), Some("reload"));
    }

    #[tokio::test]
    async fn unregistered_queue_is_closed() {
        let hub = Arc::new(ReloadHub::new());
        let mut sub = hub.register();
        hub.unregister(sub.id());
        assert_eq!(hub.subscriber_count(), 0);

        hub.broadcast("reload");
        // Sender side is gone, so the queue reports closed rather than
        // delivering anything broadcast after unregistration.
        assert_eq!(sub.recv().await, None);
    }
}
