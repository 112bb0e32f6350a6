use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use super::NormalizeEvent;

/// Envelope wrapping a normalize event with metadata
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    /// Source path the event belongs to.
    pub source: String,
    #[serde(flatten)]
    pub event: NormalizeEvent,
}

/// Handle for emitting normalize events
///
/// Cheaply cloneable. A full or closed channel is logged and never fails
/// the caller.
#[derive(Clone)]
pub struct EventHandle {
    tx: mpsc::Sender<EventEnvelope>,
}

impl EventHandle {
    pub fn new(tx: mpsc::Sender<EventEnvelope>) -> Self {
        Self { tx }
    }

    /// Emit an event, waiting for channel capacity.
    pub async fn emit(&self, source: &str, event: NormalizeEvent) {
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            source: source.to_string(),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::error!("Failed to emit normalize event: {}", e);
        }
    }
}

/// Create an event channel with the given buffer size.
pub fn create_event_channel(buffer: usize) -> (EventHandle, mpsc::Receiver<EventEnvelope>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventHandle::new(tx), rx)
}
