use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::events::TelemetryEvent;
use super::sink::EventSink;
use crate::error::MonitorError;
use crate::shutdown::Shutdown;

/// Identifier handed out by [`Broadcaster::subscribe`]
pub type SubscriberId = u64;

type SharedSink = Arc<tokio::sync::Mutex<Box<dyn EventSink>>>;

struct BroadcasterInner {
    subscribers: Mutex<HashMap<SubscriberId, SharedSink>>,
    next_id: AtomicU64,
    write_timeout: Duration,
}

/// Fan-out of telemetry events to live subscribers
///
/// The subscriber map lock is only held to snapshot, insert or remove
/// entries, never across a network write. A write that fails or exceeds
/// the write timeout evicts that subscriber only.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<BroadcasterInner>,
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("subscribers", &self.subscriber_count())
            .field("write_timeout", &self.inner.write_timeout)
            .finish()
    }
}

impl Broadcaster {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(BroadcasterInner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                write_timeout,
            }),
        }
    }

    /// Register a subscriber for all subsequent events
    pub fn subscribe(&self, sink: Box<dyn EventSink>) -> SubscriberId {
        self.register(Arc::new(tokio::sync::Mutex::new(sink)))
    }

    /// Register a subscriber and write `catch_up()` to it ahead of any broadcast
    ///
    /// `catch_up` runs after registration, so nothing published in between is
    /// lost; broadcasts queue behind the catch-up writes. Returns `None` (and
    /// drops the subscriber) if a catch-up write fails or stalls.
    pub async fn subscribe_with_catch_up<F>(&self, sink: Box<dyn EventSink>, catch_up: F) -> Option<SubscriberId>
    where
        F: FnOnce() -> Vec<TelemetryEvent>,
    {
        let shared: SharedSink = Arc::new(tokio::sync::Mutex::new(sink));
        let mut guard = Arc::clone(&shared).lock_owned().await;
        let id = self.register(shared);

        for event in catch_up() {
            let json = match event.to_json() {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to encode {} event: {}", event.kind(), e);
                    continue;
                }
            };
            let written = tokio::time::timeout(self.inner.write_timeout, guard.send_json(&json)).await;
            if let Err(e) = written.unwrap_or_else(|_| Err(self.stalled())) {
                debug!("Subscriber {} lost during catch-up: {}", id, e);
                drop(guard);
                self.unsubscribe(id).await;
                return None;
            }
        }

        Some(id)
    }

    fn register(&self, sink: SharedSink) -> SubscriberId {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.insert(id, sink);
        info!("Subscriber {} connected (total: {})", id, subscribers.len());
        id
    }

    /// Remove a subscriber and close its transport
    ///
    /// The close gets at most one write timeout; a transport that cannot take
    /// the close frame is dropped. Returns `false` if it was already gone.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.inner.subscribers.lock().remove(&id);
        match removed {
            Some(sink) => {
                let close = async move { sink.lock().await.close().await };
                if tokio::time::timeout(self.inner.write_timeout, close).await.is_err() {
                    debug!("Subscriber {} did not close in time, dropping it", id);
                }
                info!("Subscriber {} disconnected (total: {})", id, self.subscriber_count());
                true
            }
            None => false,
        }
    }

    fn stalled(&self) -> MonitorError {
        MonitorError::Subscriber(format!("write stalled for {:?}", self.inner.write_timeout))
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Write one event to every current subscriber
    pub async fn deliver(&self, event: &TelemetryEvent) {
        let json = match event.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to encode {} event: {}", event.kind(), e);
                return;
            }
        };

        let snapshot: Vec<(SubscriberId, SharedSink)> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(id, sink)| (*id, Arc::clone(sink)))
            .collect();

        if snapshot.is_empty() {
            return;
        }

        let write_timeout = self.inner.write_timeout;
        let writes = snapshot.into_iter().map(|(id, sink)| {
            let json = &json;
            async move {
                let write = async { sink.lock().await.send_json(json).await };
                let result = match tokio::time::timeout(write_timeout, write).await {
                    Ok(result) => result,
                    Err(_) => Err(self.stalled()),
                };
                (id, result)
            }
        });

        let failed: Vec<SubscriberId> = join_all(writes)
            .await
            .into_iter()
            .filter_map(|(id, result)| match result {
                Ok(()) => None,
                Err(e) => {
                    warn!("Subscriber {} write error: {}", id, e);
                    Some(id)
                }
            })
            .collect();

        join_all(failed.into_iter().map(|id| self.unsubscribe(id))).await;
    }

    /// Dispatch queued events in order until the queue closes or shutdown
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<TelemetryEvent>, mut shutdown: Shutdown) {
        info!("Broadcaster started");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        debug!("Dispatching {} event", event.kind());
                        self.deliver(&event).await;
                    }
                    None => break,
                },
                _ = shutdown.wait() => break,
            }
        }

        let ids: Vec<SubscriberId> = self.inner.subscribers.lock().keys().copied().collect();
        join_all(ids.into_iter().map(|id| self.unsubscribe(id))).await;
        info!("Broadcaster stopped");
    }
}
