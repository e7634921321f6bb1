use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const STREAM_CAPACITY: usize = 256;

/// One tool call as announced to stream subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolEvent {
    pub tool: String,
    pub result_count: usize,
    pub is_error: bool,
}

/// Fan-out registry for live subscribers.
///
/// A subscriber is registered for as long as its receiver lives; dropping it (for example when an
/// SSE client disconnects) deregisters it. Slow subscribers lag and skip events instead of
/// blocking publishers.
#[derive(Debug, Clone)]
pub struct StreamHub {
    sender: broadcast::Sender<ToolEvent>,
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(STREAM_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ToolEvent> {
        self.sender.subscribe()
    }

    /// Number of subscribers that received the event. Zero subscribers is fine.
    pub fn publish(&self, event: ToolEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
