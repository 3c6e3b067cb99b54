//! # Process-wide counters, identity and event publication.
//!
//! [`TelemetryHub`] is the only state in the crate built for unsynchronized
//! concurrent access. Every counter is an independent atomic cell, so a
//! [`TelemetrySnapshot`] is a best-effort composite, not a transaction.
//!
//! ```text
//!  Counted<T> ── add_bytes_in/out ──┐
//!  Transport  ── set_rtt ───────────┤
//!  Supervisor ── incr_reconnects ───┼──► TelemetryHub ──► snapshot() / health_json()
//!             ── set_last_backoff ──┤
//!             ── record_error ──────┘
//!
//!  emit(Event) ──► Bus (in-process receivers)
//!              └─► EventSink (host, optional)
//! ```
//!
//! ## Rules
//! - `reset()` uses plain atomic stores; readers never observe torn values.
//! - Identity fields are only overwritten by non-empty values.
//! - Emission with no sink registered is a silent drop.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;

use super::sink::{EventSink, SinkSlot};
use super::snapshot::TelemetrySnapshot;
use crate::events::{Bus, Event};

#[derive(Default, Clone)]
struct Identity {
    sni: String,
    alpn: String,
}

/// Atomic counters plus the event fan-out.
pub struct TelemetryHub {
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    reconnects: AtomicU32,
    rtt_ms: AtomicU64,
    last_backoff_ms: AtomicU64,
    last_error_ts: AtomicI64,
    start_unix: AtomicI64,
    identity: RwLock<Identity>,
    sink: SinkSlot,
    bus: Bus,
}

impl TelemetryHub {
    pub fn new(bus_capacity: usize) -> Self {
        Self {
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            reconnects: AtomicU32::new(0),
            rtt_ms: AtomicU64::new(0),
            last_backoff_ms: AtomicU64::new(0),
            last_error_ts: AtomicI64::new(0),
            start_unix: AtomicI64::new(0),
            identity: RwLock::new(Identity::default()),
            sink: SinkSlot::default(),
            bus: Bus::new(bus_capacity),
        }
    }

    /// Shared hub with the given bus capacity.
    pub fn shared(bus_capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(bus_capacity))
    }

    // --- counters ---

    #[inline]
    pub fn add_bytes_in(&self, n: u64) {
        self.bytes_in.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_bytes_out(&self, n: u64) {
        self.bytes_out.fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr_reconnects(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_rtt(&self, rtt: Duration) {
        self.rtt_ms.store(millis(rtt), Ordering::Relaxed);
    }

    pub fn set_last_backoff(&self, delay: Duration) {
        self.last_backoff_ms.store(millis(delay), Ordering::Relaxed);
    }

    /// Stamps `last_error_ts` with the current unix time.
    pub fn record_error(&self) {
        self.last_error_ts.store(now_unix(), Ordering::Relaxed);
    }

    /// Zeroes traffic, reconnect and RTT counters.
    pub fn reset(&self) {
        self.bytes_in.store(0, Ordering::Relaxed);
        self.bytes_out.store(0, Ordering::Relaxed);
        self.reconnects.store(0, Ordering::Relaxed);
        self.rtt_ms.store(0, Ordering::Relaxed);
    }

    pub fn mark_started(&self) {
        self.start_unix.store(now_unix(), Ordering::Relaxed);
    }

    pub fn mark_stopped(&self) {
        self.start_unix.store(0, Ordering::Relaxed);
    }

    /// Records the negotiated identity; empty values keep the previous one.
    pub fn set_identity(&self, sni: &str, alpn: &str) {
        let mut id = self.identity.write().unwrap_or_else(|p| p.into_inner());
        if !sni.is_empty() {
            id.sni = sni.to_string();
        }
        if !alpn.is_empty() {
            id.alpn = alpn.to_string();
        }
    }

    pub fn reconnects(&self) -> u32 {
        self.reconnects.load(Ordering::Relaxed)
    }

    pub fn rtt(&self) -> Duration {
        Duration::from_millis(self.rtt_ms.load(Ordering::Relaxed))
    }

    /// Composes the counters into a snapshot.
    ///
    /// `running`, `engine` and `version` belong to the orchestrator and are
    /// passed in.
    pub fn snapshot(&self, running: bool, engine: &str, version: &str) -> TelemetrySnapshot {
        let start = self.start_unix.load(Ordering::Relaxed);
        let uptime_s = if start > 0 {
            u64::try_from(now_unix() - start).unwrap_or(0)
        } else {
            0
        };
        let id = self
            .identity
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone();

        TelemetrySnapshot {
            running,
            engine: engine.to_string(),
            version: version.to_string(),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            quic_rtt_ms: self.rtt_ms.load(Ordering::Relaxed),
            uptime_s,
            sni: id.sni,
            alpn: id.alpn,
            last_backoff_ms: self.last_backoff_ms.load(Ordering::Relaxed),
            last_error_ts: self.last_error_ts.load(Ordering::Relaxed),
        }
    }

    // --- events ---

    /// Registers, replaces or clears (`None`) the host event sink.
    pub fn set_event_sink(&self, sink: Option<Arc<dyn EventSink>>) {
        self.sink.set(sink);
    }

    pub fn has_event_sink(&self) -> bool {
        self.sink.is_set()
    }

    /// Hands the event to the host sink, then publishes it on the bus.
    pub fn emit(&self, ev: Event) {
        tracing::debug!(event = ev.name(), seq = ev.seq, payload = %ev.payload, "emit");
        self.sink.deliver(ev.name(), &ev.payload);
        self.bus.publish(ev);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256)
    }
}

#[inline]
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
