//! # In-process event fan-out.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so that in-process observers
//! (tests, a metrics adapter, a UI bridge) can watch the same event stream the
//! host sink receives.
//!
//! ```text
//! Orchestrator ──┐
//! Supervisor   ──┼──► TelemetryHub::emit ──┬──► Bus ───► subscribe() receivers
//! Guarded task ──┘                         └──► host EventSink (synchronous)
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails; without receivers the event is dropped.
//! - One shared ring buffer of `capacity` events; lagging receivers see
//!   `RecvError::Lagged(n)` and skip the `n` oldest events.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for lifecycle events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// A receiver observing events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
