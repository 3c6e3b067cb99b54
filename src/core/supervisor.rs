//! # Supervisor: keeps one transport alive.
//!
//! Owns a [`Transport`] and a [`BackoffController`]. One guarded background
//! worker polls liveness and reconnects with backoff.
//!
//! ## Worker loop
//! ```text
//! start(): transport.start(token)   (best effort, failure is only recorded)
//!          spawn_guarded("supervisor", worker)
//!
//! loop {
//!   ├─ closed / cancelled ───────────────► exit
//!   ├─ transport.is_alive()
//!   │     └─► sleep(poll_interval) raced against cancel, re-check
//!   └─ not alive
//!         ├─► delay = backoff.next()
//!         ├─► emit reconnecting{reason, attempt, next_ms}; set_last_backoff(delay)
//!         ├─► sleep(delay) raced against cancel ──► cancelled: exit, no attempt
//!         ├─► closed meanwhile ─────────────────► exit
//!         └─► transport.start(token)
//!               ├─ Err ─► record_error, remember label, loop
//!               └─ Ok  ─► backoff.reset(), reconnects += 1, emit reconnected{rtt_ms}
//! }
//! ```
//!
//! ## States
//! `Idle → Starting → Running → (ConnectionLost → Reconnecting → Running)* → Stopping → Idle`
//!
//! ## Rules
//! - `attempt` counts consecutive failures (1-based) and survives flap cooldowns;
//!   it returns to 0 only after a successful reconnect.
//! - The first `reconnecting` after a loss carries reason `"lost"`; later ones
//!   carry the label of the last failed attempt.
//! - Reconnect failures never surface to callers; they go to telemetry.
//! - `stop()` sets `closed`, cancels, then waits for the worker and the
//!   transport within one shared deadline.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::core::RuntimeConfig;
use crate::events::Event;
use crate::policies::BackoffController;
use crate::tasks::{TaskHandle, spawn_guarded};
use crate::telemetry::TelemetryHub;
use crate::transport::Transport;

/// Lifecycle state of a [`Supervisor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SupervisorState {
    Idle = 0,
    Starting = 1,
    Running = 2,
    ConnectionLost = 3,
    Reconnecting = 4,
    Stopping = 5,
}

impl SupervisorState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => SupervisorState::Starting,
            2 => SupervisorState::Running,
            3 => SupervisorState::ConnectionLost,
            4 => SupervisorState::Reconnecting,
            5 => SupervisorState::Stopping,
            _ => SupervisorState::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorState::Idle => "idle",
            SupervisorState::Starting => "starting",
            SupervisorState::Running => "running",
            SupervisorState::ConnectionLost => "connection_lost",
            SupervisorState::Reconnecting => "reconnecting",
            SupervisorState::Stopping => "stopping",
        }
    }
}

#[derive(Default)]
struct StateCell(AtomicU8);

impl StateCell {
    fn set(&self, state: SupervisorState) {
        self.0.store(state as u8, Ordering::Release);
    }

    fn get(&self) -> SupervisorState {
        SupervisorState::from_u8(self.0.load(Ordering::Acquire))
    }
}

/// Keeps exactly one [`Transport`] alive.
pub struct Supervisor {
    transport: Arc<dyn Transport>,
    hub: Arc<TelemetryHub>,
    runtime: RuntimeConfig,
    token: CancellationToken,
    closed: Arc<AtomicBool>,
    state: Arc<StateCell>,
    worker: Mutex<Option<TaskHandle>>,
}

impl Supervisor {
    /// Creates an idle supervisor whose token is a child of `parent`.
    pub fn new(
        transport: Arc<dyn Transport>,
        hub: Arc<TelemetryHub>,
        runtime: RuntimeConfig,
        parent: &CancellationToken,
    ) -> Self {
        Self {
            transport,
            hub,
            runtime,
            token: parent.child_token(),
            closed: Arc::new(AtomicBool::new(false)),
            state: Arc::new(StateCell::default()),
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state.get()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// One synchronous start attempt, then launches the worker.
    ///
    /// A failed first attempt is recorded in telemetry and left to the worker.
    /// Calling `start` on a running or stopped supervisor does nothing.
    pub async fn start(&self) {
        if self.is_closed() || self.lock_worker().is_some() {
            return;
        }
        self.state.set(SupervisorState::Starting);

        match self.transport.start(&self.token).await {
            Ok(()) => self.state.set(SupervisorState::Running),
            Err(e) => {
                tracing::warn!(engine = self.transport.engine().id(), error = %e, "initial start failed, retrying in background");
                self.hub.record_error();
                self.state.set(SupervisorState::ConnectionLost);
            }
        }

        let worker = Worker {
            transport: Arc::clone(&self.transport),
            hub: Arc::clone(&self.hub),
            backoff: BackoffController::new(self.runtime.backoff.clone()),
            poll: self.runtime.poll_interval(),
            token: self.token.clone(),
            closed: Arc::clone(&self.closed),
            state: Arc::clone(&self.state),
        };
        let handle = spawn_guarded("supervisor", Arc::clone(&self.hub), worker.run());
        *self.lock_worker() = Some(handle);
    }

    /// Stops the worker and the transport within `grace`.
    ///
    /// Never fails. Past the deadline the worker is aborted and the transport
    /// is left to finish closing on its own.
    pub async fn stop(&self, grace: Duration) {
        let begun = Instant::now();
        self.closed.store(true, Ordering::Release);
        self.state.set(SupervisorState::Stopping);
        self.token.cancel();

        let worker = self.lock_worker().take();
        if let Some(mut worker) = worker {
            if !worker.join_within(grace).await {
                tracing::warn!(?grace, "supervisor worker did not exit in time, aborting");
                worker.abort();
            }
        }
        self.transport
            .stop(grace.saturating_sub(begun.elapsed()))
            .await;
        self.state.set(SupervisorState::Idle);
    }

    fn lock_worker(&self) -> std::sync::MutexGuard<'_, Option<TaskHandle>> {
        self.worker.lock().unwrap_or_else(|p| p.into_inner())
    }
}

struct Worker {
    transport: Arc<dyn Transport>,
    hub: Arc<TelemetryHub>,
    backoff: BackoffController,
    poll: Duration,
    token: CancellationToken,
    closed: Arc<AtomicBool>,
    state: Arc<StateCell>,
}

impl Worker {
    fn should_exit(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.token.is_cancelled()
    }

    async fn run(mut self) {
        let mut failures: u32 = 0;
        let mut last_error: Option<&'static str> = None;

        loop {
            if self.should_exit() {
                break;
            }

            if self.transport.is_alive() {
                self.state.set(SupervisorState::Running);
                select! {
                    _ = self.token.cancelled() => break,
                    _ = time::sleep(self.poll) => continue,
                }
            }

            if failures == 0 {
                self.state.set(SupervisorState::ConnectionLost);
                tracing::warn!(engine = self.transport.engine().id(), "connection lost");
            }
            failures = failures.saturating_add(1);
            let delay = self.backoff.next();
            let reason = last_error.take().unwrap_or("lost");

            self.hub.emit(Event::reconnecting(
                reason,
                failures,
                u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            ));
            self.hub.set_last_backoff(delay);

            select! {
                _ = self.token.cancelled() => break,
                _ = time::sleep(delay) => {}
            }
            if self.closed.load(Ordering::Acquire) {
                break;
            }

            self.state.set(SupervisorState::Reconnecting);
            match self.transport.start(&self.token).await {
                Ok(()) => {
                    self.backoff.reset();
                    self.hub.incr_reconnects();
                    let rtt_ms = self.transport.status().rtt_ms;
                    tracing::info!(attempt = failures, rtt_ms, "reconnected");
                    self.hub.emit(Event::reconnected(rtt_ms));
                    self.state.set(SupervisorState::Running);
                    failures = 0;
                }
                Err(e) if !e.is_retryable() => {
                    tracing::debug!(error = %e, "reconnect aborted");
                    break;
                }
                Err(e) => {
                    tracing::warn!(attempt = failures, error = %e, "reconnect failed");
                    self.hub.record_error();
                    last_error = Some(e.as_label());
                }
            }
        }
        tracing::debug!("supervisor worker exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineKind;
    use crate::error::TransportError;
    use crate::events::{EventKind, ReconnectingPayload};
    use crate::policies::{BackoffConfig, Jitter};
    use crate::transport::TransportStatus;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    /// Transport whose `start` outcomes are scripted; alive after a success.
    #[derive(Default)]
    struct Scripted {
        script: Mutex<VecDeque<Result<(), TransportError>>>,
        alive: AtomicBool,
        starts: AtomicUsize,
        stops: AtomicUsize,
        panic_on_start: AtomicBool,
    }

    impl Scripted {
        fn with(script: Vec<Result<(), TransportError>>) -> Arc<Self> {
            let t = Self::default();
            *t.script.lock().unwrap() = script.into();
            Arc::new(t)
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        fn engine(&self) -> EngineKind {
            EngineKind::Sing
        }

        async fn start(&self, _ctx: &CancellationToken) -> Result<(), TransportError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_start.load(Ordering::SeqCst) {
                panic!("client library bug");
            }
            let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
            if next.is_ok() {
                self.alive.store(true, Ordering::SeqCst);
            }
            next
        }

        async fn stop(&self, _deadline: Duration) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.alive.store(false, Ordering::SeqCst);
        }

        fn status(&self) -> TransportStatus {
            TransportStatus {
                rtt_ms: 42,
                ..TransportStatus::default()
            }
        }

        fn is_alive(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }
    }

    fn runtime(base: Duration) -> RuntimeConfig {
        RuntimeConfig {
            poll_interval: Duration::from_millis(5),
            backoff: BackoffConfig {
                base,
                factor: 2.0,
                max: base * 8,
                jitter: Jitter(0.0),
                flap_threshold: 100,
                flap_window: Duration::from_secs(60),
                cooldown: base * 8,
            },
            ..RuntimeConfig::default()
        }
    }

    async fn next_event(
        rx: &mut tokio::sync::broadcast::Receiver<Event>,
    ) -> Event {
        time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event within 2s")
            .expect("bus open")
    }

    #[tokio::test]
    async fn test_two_failures_then_success() {
        let transport = Scripted::with(vec![
            Err(TransportError::dial("refused")),
            Err(TransportError::dial("refused")),
            Ok(()),
        ]);
        let hub = Arc::new(TelemetryHub::default());
        let mut rx = hub.subscribe();
        let sup = Supervisor::new(
            transport.clone(),
            Arc::clone(&hub),
            runtime(Duration::from_millis(5)),
            &CancellationToken::new(),
        );

        sup.start().await;

        let first = next_event(&mut rx).await;
        assert_eq!(first.kind, EventKind::Reconnecting);
        let body: ReconnectingPayload = serde_json::from_str(&first.payload).unwrap();
        assert_eq!((body.attempt, body.reason.as_str(), body.next_ms), (1, "lost", 5));

        let second = next_event(&mut rx).await;
        let body: ReconnectingPayload = serde_json::from_str(&second.payload).unwrap();
        assert_eq!((body.attempt, body.reason.as_str(), body.next_ms), (2, "dial_failed", 10));

        let third = next_event(&mut rx).await;
        assert_eq!(third.kind, EventKind::Reconnected);
        assert_eq!(&*third.payload, r#"{"rtt_ms":42}"#);

        assert_eq!(hub.reconnects(), 1);
        assert_eq!(transport.starts.load(Ordering::SeqCst), 3);
        assert!(hub.snapshot(true, "sing", "v").last_error_ts > 0);

        sup.stop(Duration::from_secs(1)).await;
        assert_eq!(sup.state(), SupervisorState::Idle);
        assert_eq!(transport.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_during_backoff_skips_attempt() {
        let transport = Scripted::with(vec![Err(TransportError::dial("refused"))]);
        let hub = Arc::new(TelemetryHub::default());
        let mut rx = hub.subscribe();
        let sup = Supervisor::new(
            transport.clone(),
            Arc::clone(&hub),
            runtime(Duration::from_secs(30)),
            &CancellationToken::new(),
        );

        sup.start().await;
        assert_eq!(next_event(&mut rx).await.kind, EventKind::Reconnecting);

        let begun = Instant::now();
        sup.stop(Duration::from_secs(1)).await;
        assert!(begun.elapsed() < Duration::from_secs(1));
        assert_eq!(transport.starts.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_healthy_transport_emits_nothing() {
        let transport = Scripted::with(vec![Ok(())]);
        let hub = Arc::new(TelemetryHub::default());
        let mut rx = hub.subscribe();
        let sup = Supervisor::new(
            transport.clone(),
            Arc::clone(&hub),
            runtime(Duration::from_millis(5)),
            &CancellationToken::new(),
        );

        sup.start().await;
        assert_eq!(sup.state(), SupervisorState::Running);
        time::sleep(Duration::from_millis(30)).await;
        assert!(rx.try_recv().is_err());

        sup.stop(Duration::from_secs(1)).await;
        // A stopped supervisor cannot be restarted.
        sup.start().await;
        assert_eq!(transport.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_worker_panic_is_reported() {
        let transport = Scripted::with(vec![Err(TransportError::dial("refused"))]);
        let hub = Arc::new(TelemetryHub::default());
        let mut rx = hub.subscribe();
        let sup = Supervisor::new(
            transport.clone(),
            Arc::clone(&hub),
            runtime(Duration::from_millis(5)),
            &CancellationToken::new(),
        );

        sup.start().await;
        transport.panic_on_start.store(true, Ordering::SeqCst);

        assert_eq!(next_event(&mut rx).await.kind, EventKind::Reconnecting);
        let ev = next_event(&mut rx).await;
        assert_eq!(ev.kind, EventKind::Panic);
        assert!(ev.payload.contains("client library bug"));

        sup.stop(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_parent_cancel_stops_worker() {
        let transport = Scripted::with(vec![Err(TransportError::dial("refused"))]);
        let hub = Arc::new(TelemetryHub::default());
        let parent = CancellationToken::new();
        let sup = Supervisor::new(
            transport.clone(),
            hub,
            runtime(Duration::from_secs(30)),
            &parent,
        );

        sup.start().await;
        parent.cancel();
        let mut worker = sup.lock_worker().take().unwrap();
        assert!(worker.join_within(Duration::from_secs(1)).await);
    }
}
