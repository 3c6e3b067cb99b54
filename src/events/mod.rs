//! Lifecycle events: data model and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] fixed event names and JSON bodies
//! - typed payloads ([`ReconnectingPayload`], [`ReconnectedPayload`], ...)
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! Events are emitted through [`TelemetryHub::emit`](crate::telemetry::TelemetryHub::emit),
//! which publishes to the bus and forwards to the host sink.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{
    ErrorPayload, Event, EventKind, PanicPayload, ReconnectedPayload, ReconnectingPayload,
    ReloadedPayload, StartedPayload,
};
