use std::time::Duration;

use axum::response::sse::{Event, KeepAlive};
use chrono::{DateTime, Utc};
use domain_wrap_core::MintState;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::debug;

const BROADCAST_BUFFER: usize = 128;

/// A single workflow transition as seen by observers.
#[derive(Debug, Clone, Serialize)]
pub struct MintEvent {
    pub ts: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<u64>,
    #[serde(flatten)]
    pub state: MintState,
}

impl MintEvent {
    pub fn new(ts: DateTime<Utc>, attempt_id: Option<u64>, state: MintState) -> Self {
        Self {
            ts,
            attempt_id,
            state,
        }
    }

    pub fn event_name(&self) -> &'static str {
        self.state.name()
    }

    pub fn into_sse_event(self) -> Result<Event, serde_json::Error> {
        let mut event = Event::default().event(self.event_name());
        if let Some(attempt_id) = self.attempt_id {
            event = event.id(attempt_id.to_string());
        }
        let data = serde_json::to_string(&self)?;
        Ok(event.data(data))
    }
}

/// Fan-out of workflow transitions to any number of subscribers.
#[derive(Clone)]
pub struct MintEventHub {
    sender: broadcast::Sender<MintEvent>,
}

impl MintEventHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_BUFFER);
        Self { sender }
    }

    pub fn publish(&self, event: MintEvent) {
        // Sending only fails when nobody is listening.
        if self.sender.send(event).is_err() {
            debug!(stage = "events", "no subscribers for mint event");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MintEvent> {
        self.sender.subscribe()
    }
}

impl Default for MintEventHub {
    fn default() -> Self {
        Self::new()
    }
}

pub fn event_stream(
    hub: &MintEventHub,
) -> impl Stream<Item = Result<Event, serde_json::Error>> + Send + 'static {
    BroadcastStream::new(hub.subscribe()).filter_map(|result| match result {
        Ok(event) => Some(event.into_sse_event()),
        Err(_) => None,
    })
}

pub fn event_keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(Duration::from_secs(20))
        .text("heartbeat")
}
