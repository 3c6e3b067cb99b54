//! # Orchestrator: the host-facing lifecycle surface.
//!
//! Every operation runs under one `tokio::sync::Mutex`, so `started`, `stopped`
//! and `reloaded` are totally ordered with respect to each other and to the
//! calls that produce them. Reconnect events come from the supervisor's
//! worker and are not ordered against these.
//!
//! ```text
//! start(json) ──► ConfigPayload::parse ──► transport::select ──► emit started ──► Supervisor::start
//!                  └─ Err: InvalidConfig    └─ Err: EngineInitFailed (+ error event)
//!
//! reload(json)
//!   ├─ invalid ───────────────► Err, running session untouched
//!   ├─ settings only ─────────► store, emit reloaded
//!   ├─ session, not running ──► store, emit reloaded
//!   └─ session, running ──────► build new transport ──► stop old ──► start new ──► emit reloaded
//!
//! stop() ──► Supervisor::stop(stop_grace) ──► emit stopped
//! ```
//!
//! ## Rules
//! - A rejected payload never mutates state.
//! - `start` while running and `stop` while stopped are successful no-ops.
//!   `start_with_code` reports a repeated start as `ok`; `stop_with_code`
//!   reports a stop while stopped as `not_running`.
//! - `started` is emitted before the supervisor launches, so it precedes any
//!   `reconnecting` caused by a failed first dial.
//! - `stop` never fails and always leaves the orchestrator stopped.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

use super::builder::OrchestratorBuilder;
use super::config::RuntimeConfig;
use super::supervisor::Supervisor;
use crate::config::{ConfigPayload, EngineKind, PayloadKind, SessionConfig};
use crate::error::{ConfigError, ErrorCode, SdkError};
use crate::events::{ErrorPayload, Event, EventKind, ReloadedPayload, StartedPayload};
use crate::logging::{LogBridge, LogLevel, LogSink};
use crate::net::{NetHooks, ProtectFn};
use crate::telemetry::{EventSink, TelemetryHub, TelemetrySnapshot};
use crate::transport::{ConnectorRegistry, Transport, select};
use crate::version;

#[derive(Default)]
struct Inner {
    running: bool,
    config: Option<ConfigPayload>,
    engine: Option<EngineKind>,
    supervisor: Option<Supervisor>,
}

/// Start/stop/reload of one tunnel session plus host registrations.
pub struct Orchestrator {
    runtime: RuntimeConfig,
    registry: ConnectorRegistry,
    hub: Arc<TelemetryHub>,
    hooks: Arc<NetHooks>,
    logs: Arc<LogBridge>,
    root: CancellationToken,
    inner: Mutex<Inner>,
}

impl Orchestrator {
    pub fn builder(runtime: RuntimeConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(runtime)
    }

    pub(super) fn new_internal(
        runtime: RuntimeConfig,
        registry: ConnectorRegistry,
        hub: Arc<TelemetryHub>,
        hooks: Arc<NetHooks>,
        logs: Arc<LogBridge>,
        root: CancellationToken,
    ) -> Self {
        Self {
            runtime,
            registry,
            hub,
            hooks,
            logs,
            root,
            inner: Mutex::new(Inner::default()),
        }
    }

    // --- lifecycle ---

    /// Starts a session from a JSON payload. Idempotent while running.
    pub async fn start(&self, json: &str) -> Result<(), SdkError> {
        match self.try_start(json).await {
            Err(SdkError::AlreadyRunning) => Ok(()),
            other => other,
        }
    }

    /// [`start`](Self::start) reporting a numeric code; a repeated start is `ok`.
    pub async fn start_with_code(&self, json: &str) -> ErrorCode {
        match self.start(json).await {
            Ok(()) => ErrorCode::Ok,
            Err(e) => e.code(),
        }
    }

    async fn try_start(&self, json: &str) -> Result<(), SdkError> {
        let mut inner = self.inner.lock().await;
        if inner.running {
            return Err(SdkError::AlreadyRunning);
        }

        let payload = ConfigPayload::parse(json).inspect_err(|e| {
            tracing::warn!(error = %e, "start rejected");
        })?;
        let session = match payload.kind() {
            PayloadKind::Session(cfg) => cfg.clone(),
            // A settings-only payload cannot start anything.
            PayloadKind::Settings => return Err(ConfigError::Server.into()),
        };

        let transport = self.build_transport(&session)?;
        self.apply_log_level(&payload);
        let engine = session.engine_kind();

        tracing::info!(engine = engine.id(), server = %session.server, "started");
        self.hub.emit(Event::new(EventKind::Started).with_payload(&StartedPayload {
            engine: engine.id().to_string(),
        }));

        let supervisor = self.start_supervisor(&session, transport).await;
        inner.running = true;
        inner.engine = Some(engine);
        inner.config = Some(payload);
        inner.supervisor = Some(supervisor);
        Ok(())
    }

    /// Stops the session. No-op when not running; never fails.
    pub async fn stop(&self) {
        let _ = self.try_stop().await;
    }

    /// [`stop`](Self::stop) reporting a numeric code; stopping while stopped is `not_running`.
    pub async fn stop_with_code(&self) -> ErrorCode {
        match self.try_stop().await {
            Ok(()) => ErrorCode::Ok,
            Err(e) => e.code(),
        }
    }

    async fn try_stop(&self) -> Result<(), SdkError> {
        let mut inner = self.inner.lock().await;
        if !inner.running {
            return Err(SdkError::NotRunning);
        }
        if let Some(supervisor) = inner.supervisor.take() {
            supervisor.stop(self.runtime.stop_grace).await;
        }
        inner.running = false;
        self.hub.mark_stopped();

        tracing::info!("stopped");
        self.hub.emit(Event::new(EventKind::Stopped));
        Ok(())
    }

    /// Applies a new payload.
    ///
    /// Invalid payloads are rejected without touching the running session.
    /// A session payload while running replaces the session atomically: if
    /// the new transport cannot be built, the old session keeps running.
    pub async fn reload(&self, json: &str) -> Result<(), SdkError> {
        let mut inner = self.inner.lock().await;

        let payload = ConfigPayload::parse(json).inspect_err(|e| {
            tracing::warn!(error = %e, "reload rejected");
        })?;

        let session = payload.session().cloned();
        match session {
            Some(session) if inner.running => {
                let transport = self.build_transport(&session)?;
                if let Some(old) = inner.supervisor.take() {
                    old.stop(self.runtime.stop_grace).await;
                }
                let supervisor = self.start_supervisor(&session, transport).await;
                inner.engine = Some(session.engine_kind());
                inner.supervisor = Some(supervisor);
                tracing::info!(engine = session.engine_kind().id(), "session reloaded");
            }
            Some(_) => tracing::info!("session config stored while stopped"),
            None => tracing::debug!("settings reloaded"),
        }

        let defines_session = payload.session().is_some();
        self.apply_log_level(&payload);
        inner.config = Some(payload);
        self.hub.emit(Event::new(EventKind::Reloaded).with_payload(&ReloadedPayload {
            session: defines_session,
        }));
        Ok(())
    }

    fn build_transport(&self, session: &SessionConfig) -> Result<Arc<dyn Transport>, SdkError> {
        select(session, &self.registry, &self.hooks, &self.hub, &self.runtime).inspect_err(|e| {
            tracing::error!(error = %e, "engine init failed");
            self.hub.record_error();
            self.hub.emit(Event::new(EventKind::Error).with_payload(&ErrorPayload {
                code: e.code().into(),
                msg: e.to_string(),
            }));
        })
    }

    async fn start_supervisor(
        &self,
        session: &SessionConfig,
        transport: Arc<dyn Transport>,
    ) -> Supervisor {
        self.hub.reset();
        self.hub.mark_started();
        self.hub.set_identity(&session.sni, session.primary_alpn());

        let supervisor = Supervisor::new(
            transport,
            Arc::clone(&self.hub),
            self.runtime.clone(),
            &self.root,
        );
        supervisor.start().await;
        supervisor
    }

    fn apply_log_level(&self, payload: &ConfigPayload) {
        if let Some(level) = payload.log_level() {
            self.logs.set_level(level);
        }
    }

    // --- queries ---

    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.running
    }

    /// `"running"` or `"stopped"`.
    pub async fn status(&self) -> &'static str {
        if self.is_running().await {
            "running"
        } else {
            "stopped"
        }
    }

    /// Raw text of the last accepted payload.
    pub async fn current_config(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .config
            .as_ref()
            .map(|c| c.raw().to_string())
    }

    pub fn version(&self) -> String {
        version::version()
    }

    pub async fn health(&self) -> TelemetrySnapshot {
        let (running, engine) = {
            let inner = self.inner.lock().await;
            (inner.running, inner.engine.map(|e| e.id()).unwrap_or(""))
        };
        self.hub.snapshot(running, engine, &self.version())
    }

    pub async fn health_json(&self) -> String {
        self.health().await.to_json()
    }

    /// Zeroes traffic and reconnect counters.
    pub fn reset_stats(&self) {
        self.hub.reset();
    }

    // --- host registrations ---

    pub fn set_event_sink(&self, sink: Option<Arc<dyn EventSink>>) {
        self.hub.set_event_sink(sink);
    }

    pub fn set_log_sink(&self, sink: Option<Arc<dyn LogSink>>) {
        self.logs.set_sink(sink);
    }

    /// Unknown level names are ignored and reported as `false`.
    pub fn set_log_level(&self, level: &str) -> bool {
        self.logs.set_level_str(level)
    }

    pub fn log_level(&self) -> LogLevel {
        self.logs.level()
    }

    pub fn set_protect_hook(&self, hook: Option<ProtectFn>) {
        self.hooks.set_protect(hook);
    }

    /// In-process view of every emitted event.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.hub.subscribe()
    }

    pub fn telemetry(&self) -> &Arc<TelemetryHub> {
        &self.hub
    }

    pub fn log_bridge(&self) -> &Arc<LogBridge> {
        &self.logs
    }

    /// Installs the log bridge as the global `tracing` subscriber.
    pub fn install_logging(&self) -> bool {
        crate::logging::install(&self.logs)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
