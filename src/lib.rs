//! # hy2core
//!
//! **hy2core** is the connection lifecycle and resilience engine of a mobile
//! VPN client SDK. It owns a tunnel transport's up/down lifecycle, detects
//! loss of connectivity, computes reconnect delays with jitter and flap
//! suppression, and republishes state as typed events and a health snapshot.
//!
//! Tunnel protocol internals (QUIC, TLS, SOCKS, TUN packet I/O) are external:
//! a client library plugs in through [`Connector`] / [`Link`].
//!
//! ## Architecture
//! ```text
//!            host app (Kotlin / Swift bindings)
//!   start / stop / reload │      ▲ EventSink::on_event(name, json)
//!   health_json           │      │ LogSink::log(level, msg)
//!                         ▼      │ protect(fd) -> bool
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Orchestrator (one lock: running flag + stored config)       │
//! │  - ConnectorRegistry (engine → client library)              │
//! │  - NetHooks (protect callback)                              │
//! │  - LogBridge (tracing → host log sink)                      │
//! └──────┬──────────────────────────────────────────────────────┘
//!        ▼
//! ┌──────────────┐  is_alive / start   ┌───────────────────────────────┐
//! │  Supervisor  │ ──────────────────► │ QuicTransport<Sing | Hc>      │
//! │ guarded      │                     │  Connector::connect(DialHook) │
//! │ worker loop  │                     │  Link::ping (RTT probe task)  │
//! └──────┬───────┘                     └──────────────┬────────────────┘
//!        │ BackoffController                          │ set_rtt / identity
//!        ▼                                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │ TelemetryHub: atomics + Bus (broadcast) + host EventSink    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reconnect loop
//! ```text
//! loop {
//!   ├─ alive ──► sleep(poll_interval), re-check
//!   └─ lost  ──► delay = backoff.next()
//!                emit reconnecting{reason, attempt, next_ms}
//!                sleep(delay) (cancellable)
//!                transport.start()
//!                  ├─ Err ─► record_error, loop
//!                  └─ Ok  ─► backoff.reset(), reconnects += 1, emit reconnected{rtt_ms}
//! }
//! ```
//!
//! ## Features
//! | Area            | Description                                              | Key types                                   |
//! |-----------------|----------------------------------------------------------|---------------------------------------------|
//! | **Lifecycle**   | Idempotent start/stop, atomic reload                     | [`Orchestrator`], [`Supervisor`]            |
//! | **Backoff**     | Exponential delay, jitter, flap cooldown                 | [`BackoffConfig`], [`BackoffController`]    |
//! | **Transports**  | Two engines over one session-backed transport            | [`Transport`], [`SingTransport`], [`HcTransport`] |
//! | **Telemetry**   | Atomic counters, health JSON, event sink                 | [`TelemetryHub`], [`TelemetrySnapshot`]     |
//! | **Errors**      | Typed errors and stable numeric host codes               | [`SdkError`], [`ErrorCode`]                 |
//! | **Logging**     | `tracing` bridged to the host log sink                   | [`LogBridge`], [`LogLevel`]                 |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use hy2core::{
//!     Connector, DialHook, DialParams, EngineKind, Link, Orchestrator, RuntimeConfig,
//!     TransportError,
//! };
//!
//! struct Loopback;
//!
//! #[async_trait]
//! impl Link for Loopback {
//!     async fn ping(&self) -> Result<Duration, TransportError> {
//!         Ok(Duration::from_millis(1))
//!     }
//!     fn remote(&self) -> String {
//!         "127.0.0.1:443".into()
//!     }
//!     async fn close(&self) {}
//! }
//!
//! struct LoopbackConnector;
//!
//! #[async_trait]
//! impl Connector for LoopbackConnector {
//!     async fn connect(
//!         &self,
//!         _hook: DialHook,
//!         _params: &DialParams,
//!     ) -> Result<Arc<dyn Link>, TransportError> {
//!         Ok(Arc::new(Loopback))
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sdk = Orchestrator::builder(RuntimeConfig::default())
//!         .with_connector(EngineKind::Sing, Arc::new(LoopbackConnector))
//!         .build();
//!     sdk.set_protect_hook(Some(Arc::new(|_fd: i32| true)));
//!     sdk.set_event_sink(Some(Arc::new(|name: &str, payload: &str| {
//!         println!("{name} {payload}");
//!     })));
//!
//!     sdk.start(r#"{"server":"example.com:443","password":"secret"}"#).await?;
//!     assert_eq!(sdk.status().await, "running");
//!     println!("{}", sdk.health_json().await);
//!     sdk.stop().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod logging;
pub mod net;
pub mod policies;
pub mod tasks;
pub mod telemetry;
pub mod transport;
pub mod version;

// ---- Public re-exports ----

pub use config::{ConfigPayload, EngineKind, PayloadKind, SessionConfig};
pub use core::{Orchestrator, OrchestratorBuilder, RuntimeConfig, Supervisor, SupervisorState};
pub use error::{ConfigError, ErrorCode, SdkError, TaskPanic, TransportError};
pub use events::{Event, EventKind};
pub use logging::{LogBridge, LogLevel, LogSink};
pub use net::{NetHooks, ProtectFn, ProtectedDialer};
pub use policies::{BackoffConfig, BackoffController, Jitter};
pub use tasks::{TaskHandle, spawn_guarded};
pub use telemetry::{Counted, EventSink, TelemetryHub, TelemetrySnapshot};
pub use transport::{
    Connector, ConnectorRegistry, DialHook, DialParams, HcTransport, Link, SingTransport,
    Transport, TransportStatus,
};
