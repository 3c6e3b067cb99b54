//! # Lifecycle events published to the host.
//!
//! The host contract is a `(name, json payload)` pair. Names are fixed:
//!
//! | kind           | emitted by      | payload                              |
//! |----------------|-----------------|--------------------------------------|
//! | `started`      | orchestrator    | `{"engine":"sing"}`                  |
//! | `stopped`      | orchestrator    | `{}`                                 |
//! | `reloaded`     | orchestrator    | `{"session":true}`                   |
//! | `reconnecting` | supervisor      | `{"reason","attempt","next_ms"}`     |
//! | `reconnected`  | supervisor      | `{"rtt_ms"}`                         |
//! | `error`        | orchestrator    | `{"code","msg"}`                     |
//! | `panic`        | guarded tasks   | `{"task","msg"}`                     |
//!
//! ## Ordering guarantees
//! Each event carries a process-wide sequence number (`seq`) that increases
//! monotonically. Events emitted by one task are observed in `seq` order;
//! events from different tasks may interleave.
//!
//! ## Example
//! ```rust
//! use hy2core::events::{Event, EventKind, ReconnectingPayload};
//!
//! let ev = Event::new(EventKind::Reconnecting).with_payload(&ReconnectingPayload {
//!     reason: "lost".into(),
//!     attempt: 1,
//!     next_ms: 500,
//! });
//! assert_eq!(ev.name(), "reconnecting");
//! assert_eq!(&*ev.payload, r#"{"reason":"lost","attempt":1,"next_ms":500}"#);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Contractually fixed event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A session was started by the host.
    Started,
    /// The session was stopped by the host.
    Stopped,
    /// A new payload was accepted.
    Reloaded,
    /// Supervisor lost the transport and scheduled a retry.
    Reconnecting,
    /// A retry re-established the transport.
    Reconnected,
    /// The engine could not be initialized.
    Error,
    /// A background task panicked and was contained.
    Panic,
}

impl EventKind {
    /// Wire name delivered to the host sink.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Started => "started",
            EventKind::Stopped => "stopped",
            EventKind::Reloaded => "reloaded",
            EventKind::Reconnecting => "reconnecting",
            EventKind::Reconnected => "reconnected",
            EventKind::Error => "error",
            EventKind::Panic => "panic",
        }
    }
}

/// One published event.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    pub kind: EventKind,
    /// JSON object text, `{}` when nothing is attached.
    pub payload: Arc<str>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            payload: Arc::from("{}"),
        }
    }

    /// Serializes `payload` as the event body.
    ///
    /// Serialization of the plain structs below cannot fail; if a foreign type
    /// does, the body stays `{}`.
    #[inline]
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        if let Ok(text) = serde_json::to_string(payload) {
            self.payload = Arc::from(text);
        }
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn reconnecting(reason: impl Into<String>, attempt: u32, next_ms: u64) -> Self {
        Event::new(EventKind::Reconnecting).with_payload(&ReconnectingPayload {
            reason: reason.into(),
            attempt,
            next_ms,
        })
    }

    pub fn reconnected(rtt_ms: u64) -> Self {
        Event::new(EventKind::Reconnected).with_payload(&ReconnectedPayload { rtt_ms })
    }

    pub fn panicked(task: impl Into<String>, msg: impl Into<String>) -> Self {
        Event::new(EventKind::Panic).with_payload(&PanicPayload {
            task: task.into(),
            msg: msg.into(),
        })
    }
}

/// Body of `reconnecting`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectingPayload {
    /// `"lost"` for the first failure, then the last error's label.
    pub reason: String,
    /// 1-based count of consecutive failures.
    pub attempt: u32,
    /// Delay before the next attempt in milliseconds.
    pub next_ms: u64,
}

/// Body of `reconnected`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectedPayload {
    pub rtt_ms: u64,
}

/// Body of `error`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: i32,
    pub msg: String,
}

/// Body of `panic`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanicPayload {
    pub task: String,
    pub msg: String,
}

/// Body of `started`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedPayload {
    pub engine: String,
}

/// Body of `reloaded`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadedPayload {
    /// Whether the payload defined a session.
    pub session: bool,
}
