//! Telemetry: counters, health snapshot and event publication.
//!
//! ## Contents
//! - [`TelemetryHub`] atomic counters, identity, event bus and host sink slot
//! - [`TelemetrySnapshot`] serializable health view with stable field names
//! - [`EventSink`] host capability receiving `(name, json)` pairs
//! - [`Counted`] stream adapter feeding the byte counters

mod counting;
mod hub;
mod sink;
mod snapshot;

pub use counting::Counted;
pub use hub::TelemetryHub;
pub use sink::EventSink;
pub use snapshot::TelemetrySnapshot;
