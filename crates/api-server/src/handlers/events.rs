use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;
use uuid::Uuid;

use infrastructure::EventHub;

use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Unregisters the subscriber when the SSE stream is dropped, which is how
/// a client disconnect reaches the hub.
struct UnregisterGuard {
    hub: EventHub,
    id: Uuid,
}

impl Drop for UnregisterGuard {
    fn drop(&mut self) {
        self.hub.unregister(self.id);
    }
}

pub async fn stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscriber = state.hub.register();
    let id = subscriber.id;
    info!(subscriber_id = %id, "SSE client connected");

    let guard = UnregisterGuard {
        hub: state.hub.clone(),
        id,
    };

    let connected = Event::default()
        .event("connected")
        .data(json!({ "client_id": id }).to_string());

    let events = ReceiverStream::new(subscriber.rx).map(move |event| {
        // Keeps the guard alive for the stream's lifetime.
        let _ = &guard;
        Ok(Event::default()
            .event(event.kind)
            .data(event.payload.to_string()))
    });

    let stream = stream::once(async move { Ok(connected) }).chain(events);

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}
