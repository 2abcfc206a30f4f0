use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

const BROADCAST_CAPACITY: usize = 256;
const SUBSCRIBER_CAPACITY: usize = 16;

/// One event on its way to streaming subscribers.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub kind: String,
    pub payload: serde_json::Value,
}

/// A registered streaming consumer. Dropping the subscriber (or calling
/// `EventHub::unregister`) closes its channel.
pub struct Subscriber {
    pub id: Uuid,
    pub rx: mpsc::Receiver<StreamEvent>,
}

/// In-process broadcast of domain events to streaming subscribers.
/// Delivery is non-blocking end to end: the broadcast input drops (with a
/// warning) when full, and a full subscriber channel drops the event for
/// that subscriber only, so slow consumers never stall fast ones.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<StreamEvent>>>,
    tx: mpsc::Sender<StreamEvent>,
    closed: AtomicBool,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(BROADCAST_CAPACITY);
        let inner = Arc::new(HubInner {
            subscribers: Mutex::new(HashMap::new()),
            tx,
            closed: AtomicBool::new(false),
        });

        tokio::spawn(Self::run(inner.clone(), rx));
        info!("event hub started");

        Self { inner }
    }

    async fn run(inner: Arc<HubInner>, mut rx: mpsc::Receiver<StreamEvent>) {
        while let Some(event) = rx.recv().await {
            let subscribers = inner.subscribers.lock().unwrap();
            if subscribers.is_empty() {
                debug!(kind = %event.kind, "no subscribers connected - skipping broadcast");
                continue;
            }

            for (id, tx) in subscribers.iter() {
                match tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!(subscriber_id = %id, kind = %event.kind,
                            "subscriber channel full - dropping event");
                    }
                    Err(TrySendError::Closed(_)) => {
                        // Subscriber is unregistering; nothing to do.
                    }
                }
            }
        }
    }

    pub fn register(&self) -> Subscriber {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let id = Uuid::new_v4();

        let total = {
            let mut subscribers = self.inner.subscribers.lock().unwrap();
            subscribers.insert(id, tx);
            subscribers.len()
        };
        info!(subscriber_id = %id, total_subscribers = total, "subscriber registered");

        Subscriber { id, rx }
    }

    /// Removes the subscriber, closing its channel exactly once.
    pub fn unregister(&self, id: Uuid) {
        let removed = {
            let mut subscribers = self.inner.subscribers.lock().unwrap();
            (subscribers.remove(&id).is_some(), subscribers.len())
        };
        if removed.0 {
            info!(subscriber_id = %id, total_subscribers = removed.1, "subscriber unregistered");
        }
    }

    /// Non-blocking enqueue. After `shutdown` this is a silent drop.
    pub fn broadcast(&self, event: StreamEvent) {
        if self.inner.closed.load(Ordering::Relaxed) {
            return;
        }

        if let Err(TrySendError::Full(event)) = self.inner.tx.try_send(event) {
            warn!(kind = %event.kind, "broadcast channel full - dropping event");
        }
    }

    /// Drains the subscriber set; every subscriber channel closes.
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::Relaxed);
        self.inner.subscribers.lock().unwrap().clear();
        info!("event hub shut down");
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().unwrap().len()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
