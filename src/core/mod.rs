//! Lifecycle core: orchestration, supervision and runtime configuration.
//!
//! ```text
//! Host ──► Orchestrator (one lock: running flag + stored config)
//!            │ start / reload
//!            ▼
//!          transport::select(cfg) ──► Arc<dyn Transport>
//!            │
//!            ▼
//!          Supervisor ──► guarded worker ──► Transport::start / is_alive
//!            │                 │
//!            │                 └──► BackoffController (owned, never shared)
//!            ▼
//!          TelemetryHub (counters, events) ──► Bus / host EventSink
//! ```
//!
//! - [`orchestrator`]: host-facing start/stop/reload, health and registrations;
//! - [`supervisor`]: keeps one transport alive with backoff;
//! - [`config`]: runtime knobs not carried in the host payload.

mod builder;
pub mod config;
pub mod orchestrator;
pub mod supervisor;

pub use builder::OrchestratorBuilder;
pub use config::RuntimeConfig;
pub use orchestrator::Orchestrator;
pub use supervisor::{Supervisor, SupervisorState};
