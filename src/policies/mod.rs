//! Reconnect policies.
//!
//! This module groups the knobs that control **how long** a supervisor waits
//! between reconnect attempts and when it stops escalating because the link
//! is flapping.
//!
//! ## Contents
//! - [`BackoffConfig`] immutable parameters (base / factor / max / jitter / flap / cooldown)
//! - [`BackoffController`] per-supervisor state machine computing the next delay
//! - [`Jitter`] symmetric proportional randomization
//!
//! ## Quick wiring
//! ```text
//! RuntimeConfig { backoff: BackoffConfig, .. }
//!      └─► core::supervisor worker owns one BackoffController:
//!           - next()  after every detected loss / failed reconnect
//!           - reset() after a successful reconnect
//! ```

mod backoff;
mod jitter;

pub use backoff::{BackoffConfig, BackoffController};
pub use jitter::Jitter;
