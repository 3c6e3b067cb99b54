//! Host event sink and its swappable slot.
//!
//! The slot is guarded by its own lock, independent of the orchestrator's, so
//! the host may register or clear a sink while events are in flight.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock};

use crate::tasks::panic_message;

/// Receives `(name, json payload)` pairs. Implemented by the host.
///
/// Called synchronously on the emitting task; implementations should hand
/// the event off quickly.
pub trait EventSink: Send + Sync + 'static {
    fn on_event(&self, name: &str, payload: &str);
}

impl<F> EventSink for F
where
    F: Fn(&str, &str) + Send + Sync + 'static,
{
    fn on_event(&self, name: &str, payload: &str) {
        self(name, payload)
    }
}

#[derive(Default)]
pub(crate) struct SinkSlot {
    inner: RwLock<Option<Arc<dyn EventSink>>>,
}

impl SinkSlot {
    pub(crate) fn set(&self, sink: Option<Arc<dyn EventSink>>) {
        let mut guard = self.inner.write().unwrap_or_else(|p| p.into_inner());
        *guard = sink;
    }

    pub(crate) fn is_set(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .is_some()
    }

    /// Delivers to the current sink; no sink means drop.
    pub(crate) fn deliver(&self, name: &str, payload: &str) {
        let sink = self
            .inner
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        let Some(sink) = sink else {
            return;
        };
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| sink.on_event(name, payload))) {
            tracing::error!(event = name, "event sink panicked: {}", panic_message(&*panic));
        }
    }
}
