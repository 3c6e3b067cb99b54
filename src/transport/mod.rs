//! # Transport capability and engines.
//!
//! A [`Transport`] is one tunneled network session the [`Supervisor`](crate::core::Supervisor)
//! keeps alive. Two engines implement it through the same [`QuicTransport`]; they
//! differ only in how the client library gets its protected sockets.
//!
//! ## Contract
//! - `start(ctx)` is idempotent: a no-op while a healthy session exists. It
//!   returns once the session is up (or failed); background work is spawned.
//! - `stop(deadline)` is idempotent and never fails. It returns once every task
//!   the transport spawned has exited, or when `deadline` elapses.
//! - `status()` and `is_alive()` never perform I/O.
//!
//! ## Contents
//! - [`Connector`], [`Link`], [`DialHook`], [`DialParams`], [`EngineHook`] client-library seams
//! - [`QuicTransport`], [`SingTransport`], [`HcTransport`]
//! - [`select`], [`ConnectorRegistry`] engine selection

mod engine;
mod hc;
mod quic;
mod select;
mod sing;
mod status;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::EngineKind;
use crate::error::TransportError;

pub use engine::{Connector, DialHook, DialParams, EngineHook, Link};
pub use hc::{Hc, HcTransport};
pub use quic::{QuicTransport, SessionTiming};
pub use select::{ConnectorRegistry, select};
pub use sing::{Sing, SingTransport};
pub use status::TransportStatus;

/// One live tunneled session.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    fn engine(&self) -> EngineKind;

    /// Establishes the session unless a healthy one exists.
    async fn start(&self, ctx: &CancellationToken) -> Result<(), TransportError>;

    /// Tears the session down, waiting at most `deadline`.
    async fn stop(&self, deadline: Duration);

    fn status(&self) -> TransportStatus;

    /// Cheap liveness check polled by the supervisor.
    fn is_alive(&self) -> bool;
}
