//! Streaming Bus (§4.8): per-session fan-out of agent-loop events to
//! however many transports are watching a turn in progress.
//!
//! One `tokio::sync::broadcast` channel per session, created lazily on
//! first publish or subscribe — the same "lazy entry in a mutex-guarded
//! map" shape [`super::cancel::CancelMap`] and [`super::session_lock::SessionLockMap`]
//! already use for per-session state. A publish never blocks: a lagging
//! subscriber simply misses the oldest queued events and discovers this
//! on its next `recv()` as `RecvError::Lagged`, which the transport layer
//! turns into a `turn.error` event rather than a panic or a stalled
//! publisher.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

/// Per-subscriber queue depth. A slow subscriber drops the oldest events
/// once this fills rather than pushing back on the agent loop.
const CHANNEL_CAPACITY: usize = 256;

/// The fixed event vocabulary a chat transport streams to its clients.
/// `turn.start` opens a turn, `turn.done`/`turn.error` close it; every
/// other variant occurs zero or more times in between.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum BusEvent {
    #[serde(rename = "turn.start")]
    TurnStart,
    #[serde(rename = "text.delta")]
    TextDelta { content: String },
    #[serde(rename = "tool.call")]
    ToolCall {
        id: String,
        name: String,
        args: serde_json::Value,
    },
    #[serde(rename = "tool.result")]
    ToolResult {
        id: String,
        status: String,
        content: String,
    },
    #[serde(rename = "turn.done")]
    TurnDone { in_tok: u32, out_tok: u32 },
    #[serde(rename = "turn.error")]
    TurnError { error: String },
}

/// Per-session broadcast hub. Multiple subscribers (an SSE stream, a
/// WebSocket connection, a future dashboard) may watch the same session
/// concurrently; none of them can stall the agent loop that publishes.
pub struct StreamingBus {
    channels: Mutex<HashMap<String, broadcast::Sender<BusEvent>>>,
}

impl StreamingBus {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn sender(&self, session_id: &str) -> broadcast::Sender<BusEvent> {
        let mut channels = self.channels.lock();
        channels
            .entry(session_id.to_owned())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Subscribe to a session's event stream, creating the channel if this
    /// is the first subscriber. Per §9's Open Question resolution, a new
    /// subscription never replays past events — durable session history
    /// (`SessionStore::history`) is the catch-up source of truth, not the bus.
    pub fn subscribe(&self, session_id: &str) -> broadcast::Receiver<BusEvent> {
        self.sender(session_id).subscribe()
    }

    /// Publish an event to every current subscriber of a session. A
    /// session with zero subscribers simply drops the event; the agent
    /// loop does not wait for anyone to be listening.
    pub fn publish(&self, session_id: &str, event: BusEvent) {
        let tx = self.sender(session_id);
        let _ = tx.send(event);
    }

    /// Drop channels with no subscribers and no in-flight sender other
    /// than our own table entry. Called periodically so long-lived
    /// deployments don't accumulate one broadcast channel per session
    /// that ever ran a turn.
    pub fn prune_idle(&self) {
        let mut channels = self.channels.lock();
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }

    pub fn session_count(&self) -> usize {
        self.channels.lock().len()
    }
}

impl Default for StreamingBus {
    fn default() -> Self {
        Self::new()
    }
}
