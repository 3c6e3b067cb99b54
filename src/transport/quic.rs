//! # Session-backed transport shared by both engines.
//!
//! [`QuicTransport`] turns a [`Connector`] into a [`Transport`]: it owns at
//! most one [`Link`], samples its RTT and decides liveness. The engine type
//! parameter only selects the dial hook.
//!
//! ## Start
//! ```text
//! start(ctx)
//!   ├─ session alive ───────────────────────► Ok (no-op)
//!   ├─ lost or stale session ──► teardown
//!   ├─ E::dial_hook(hooks)                    (protect failures end here)
//!   ├─ connector.connect(hook, params)        raced against ctx, bounded by handshake_timeout
//!   ├─ link.ping()                            initial RTT sample
//!   ├─ telemetry: set_rtt, set_identity
//!   └─ spawn_guarded("<engine>-rtt-probe")    every probe_interval until cancelled or a ping fails
//! ```
//!
//! ## Liveness
//! Alive iff a session exists, no probe has failed, and the last RTT sample is
//! younger than `liveness_timeout`.
//!
//! ## Stop
//! Cancels the probe, closes the link and joins the probe task, all bounded by
//! the caller's deadline. Past the deadline the probe is aborted.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::Transport;
use super::engine::{Connector, DialParams, EngineHook, Link};
use super::status::TransportStatus;
use crate::config::EngineKind;
use crate::core::RuntimeConfig;
use crate::error::TransportError;
use crate::net::NetHooks;
use crate::tasks::{TaskHandle, spawn_guarded};
use crate::telemetry::TelemetryHub;

/// Timeouts a session runs under, taken from [`RuntimeConfig`].
#[derive(Clone, Copy, Debug)]
pub struct SessionTiming {
    pub handshake_timeout: Option<Duration>,
    pub probe_interval: Option<Duration>,
    pub liveness_timeout: Option<Duration>,
}

impl From<&RuntimeConfig> for SessionTiming {
    /// Without probing the initial sample never refreshes, so staleness is off too.
    fn from(cfg: &RuntimeConfig) -> Self {
        let probe_interval = cfg.probe_interval();
        Self {
            handshake_timeout: cfg.handshake_timeout(),
            probe_interval,
            liveness_timeout: probe_interval.and(cfg.liveness_timeout()),
        }
    }
}

#[derive(Default)]
struct LinkState {
    established: bool,
    lost: bool,
    rtt: Duration,
    sampled_at: Option<Instant>,
    remote: String,
    last_error: String,
}

/// State shared between the transport and its probe task.
#[derive(Default)]
struct Shared {
    inner: Mutex<LinkState>,
}

impl Shared {
    fn with<R>(&self, f: impl FnOnce(&mut LinkState) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }

    fn sample(&self, rtt: Duration) {
        self.with(|s| {
            s.rtt = rtt;
            s.sampled_at = Some(Instant::now());
        });
    }

    fn fail(&self, err: &TransportError) {
        let text = err.to_string();
        self.with(|s| s.last_error = text);
    }
}

struct Session {
    link: Arc<dyn Link>,
    cancel: CancellationToken,
    probe: Option<TaskHandle>,
}

/// [`Transport`] over a [`Connector`], parameterized by engine.
pub struct QuicTransport<E: EngineHook> {
    connector: Arc<dyn Connector>,
    params: DialParams,
    hooks: Arc<NetHooks>,
    hub: Arc<TelemetryHub>,
    timing: SessionTiming,
    session: tokio::sync::Mutex<Option<Session>>,
    shared: Arc<Shared>,
    _engine: PhantomData<fn() -> E>,
}

impl<E: EngineHook> QuicTransport<E> {
    pub fn new(
        connector: Arc<dyn Connector>,
        params: DialParams,
        hooks: Arc<NetHooks>,
        hub: Arc<TelemetryHub>,
        timing: SessionTiming,
    ) -> Self {
        Self {
            connector,
            params,
            hooks,
            hub,
            timing,
            session: tokio::sync::Mutex::new(None),
            shared: Arc::new(Shared::default()),
            _engine: PhantomData,
        }
    }

    pub fn params(&self) -> &DialParams {
        &self.params
    }

    async fn establish(&self, ctx: &CancellationToken) -> Result<Session, TransportError> {
        let hook = E::dial_hook(&self.hooks).await?;
        tracing::debug!(engine = E::KIND.id(), hook = hook.as_label(), server = %self.params.server, "dialing");

        let link = tokio::select! {
            _ = ctx.cancelled() => return Err(TransportError::Canceled),
            res = bounded(self.timing.handshake_timeout, self.connector.connect(hook, &self.params)) => res?,
        };

        let rtt = tokio::select! {
            _ = ctx.cancelled() => Err(TransportError::Canceled),
            res = bounded(self.timing.handshake_timeout, link.ping()) => res,
        };
        let rtt = match rtt {
            Ok(rtt) => rtt,
            Err(e) => {
                link.close().await;
                return Err(e);
            }
        };

        let remote = link.remote();
        self.shared.with(|s| {
            s.established = true;
            s.lost = false;
            s.rtt = rtt;
            s.sampled_at = Some(Instant::now());
            s.remote = remote.clone();
        });
        self.hub.set_rtt(rtt);
        self.hub
            .set_identity(&self.params.sni, self.params.primary_alpn());

        let cancel = ctx.child_token();
        let probe = self.timing.probe_interval.map(|every| {
            spawn_guarded(
                format!("{}-rtt-probe", E::KIND.id()),
                Arc::clone(&self.hub),
                probe_loop(
                    Arc::clone(&link),
                    Arc::clone(&self.shared),
                    Arc::clone(&self.hub),
                    every,
                    cancel.clone(),
                ),
            )
        });

        tracing::info!(
            engine = E::KIND.id(),
            remote = %remote,
            rtt_ms = rtt.as_millis() as u64,
            "session established"
        );
        Ok(Session {
            link,
            cancel,
            probe,
        })
    }

    async fn teardown(&self, session: Session, deadline: Duration) {
        let begun = Instant::now();
        session.cancel.cancel();
        if tokio::time::timeout(deadline, session.link.close())
            .await
            .is_err()
        {
            tracing::warn!(engine = E::KIND.id(), "link close exceeded deadline");
        }
        if let Some(mut probe) = session.probe {
            let remaining = deadline.saturating_sub(begun.elapsed());
            if !probe.join_within(remaining).await {
                tracing::warn!(task = probe.name(), "probe did not exit in time, aborting");
                probe.abort();
            }
        }
        self.shared.with(|s| {
            s.established = false;
            s.remote.clear();
        });
    }
}

#[async_trait]
impl<E: EngineHook> Transport for QuicTransport<E> {
    fn engine(&self) -> EngineKind {
        E::KIND
    }

    async fn start(&self, ctx: &CancellationToken) -> Result<(), TransportError> {
        let mut slot = self.session.lock().await;
        if slot.is_some() && self.is_alive() {
            return Ok(());
        }
        if let Some(stale) = slot.take() {
            self.teardown(stale, self.timing.handshake_timeout.unwrap_or(STALE_GRACE))
                .await;
        }
        if ctx.is_cancelled() {
            return Err(TransportError::Canceled);
        }

        match self.establish(ctx).await {
            Ok(session) => {
                *slot = Some(session);
                Ok(())
            }
            Err(e) => {
                self.shared.fail(&e);
                Err(e)
            }
        }
    }

    async fn stop(&self, deadline: Duration) {
        let begun = Instant::now();
        let session = match tokio::time::timeout(deadline, self.session.lock()).await {
            Ok(mut slot) => slot.take(),
            Err(_) => {
                tracing::warn!(engine = E::KIND.id(), "stop could not acquire session");
                return;
            }
        };
        if let Some(session) = session {
            self.teardown(session, deadline.saturating_sub(begun.elapsed()))
                .await;
            tracing::info!(engine = E::KIND.id(), "session closed");
        }
    }

    fn status(&self) -> TransportStatus {
        let (rtt, remote, last_error) =
            self.shared
                .with(|s| (s.rtt, s.remote.clone(), s.last_error.clone()));
        TransportStatus {
            rtt_ms: rtt.as_millis() as u64,
            remote,
            alpn: self.params.primary_alpn().to_string(),
            sni: self.params.sni.clone(),
            last_error,
        }
    }

    fn is_alive(&self) -> bool {
        let liveness = self.timing.liveness_timeout;
        self.shared.with(|s| {
            s.established
                && !s.lost
                && match liveness {
                    None => true,
                    Some(limit) => s.sampled_at.is_some_and(|at| at.elapsed() < limit),
                }
        })
    }
}

/// Used for stale-session teardown when no handshake deadline is configured.
const STALE_GRACE: Duration = Duration::from_secs(5);

async fn bounded<T>(
    limit: Option<Duration>,
    fut: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    match limit {
        None => fut.await,
        Some(timeout) => tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| TransportError::Timeout { timeout })?,
    }
}

async fn probe_loop(
    link: Arc<dyn Link>,
    shared: Arc<Shared>,
    hub: Arc<TelemetryHub>,
    every: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(every) => {}
        }
        let res = tokio::select! {
            _ = cancel.cancelled() => return,
            res = link.ping() => res,
        };
        match res {
            Ok(rtt) => {
                shared.sample(rtt);
                hub.set_rtt(rtt);
            }
            Err(e) => {
                tracing::warn!(error = %e, "rtt probe failed, session lost");
                shared.fail(&e);
                shared.with(|s| s.lost = true);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{DialHook, SingTransport};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakeLink {
        healthy: Arc<AtomicBool>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Link for FakeLink {
        async fn ping(&self) -> Result<Duration, TransportError> {
            if self.healthy.load(Ordering::SeqCst) {
                Ok(Duration::from_millis(25))
            } else {
                Err(TransportError::handshake("peer gone"))
            }
        }

        fn remote(&self) -> String {
            "203.0.113.7:443".into()
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeConnector {
        dials: AtomicUsize,
        healthy: Arc<AtomicBool>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(
            &self,
            hook: DialHook,
            _params: &DialParams,
        ) -> Result<Arc<dyn Link>, TransportError> {
            assert!(matches!(hook, DialHook::PacketConn(_)));
            self.dials.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeLink {
                healthy: Arc::clone(&self.healthy),
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    fn params() -> DialParams {
        DialParams {
            server: "h:443".into(),
            password: "p".into(),
            sni: "example.com".into(),
            alpn: vec!["h3".into()],
            up_mbps: 0,
            down_mbps: 0,
            idle_timeout: None,
        }
    }

    fn build(
        connector: Arc<FakeConnector>,
        probe: Option<Duration>,
    ) -> (SingTransport, Arc<TelemetryHub>) {
        let hooks = Arc::new(NetHooks::new());
        hooks.set_protect(Some(Arc::new(|_: i32| true)));
        let hub = Arc::new(TelemetryHub::default());
        let timing = SessionTiming {
            handshake_timeout: Some(Duration::from_secs(1)),
            probe_interval: probe,
            liveness_timeout: Some(Duration::from_secs(5)),
        };
        (
            SingTransport::new(connector, params(), hooks, Arc::clone(&hub), timing),
            hub,
        )
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_publishes_identity() {
        let connector = Arc::new(FakeConnector::default());
        connector.healthy.store(true, Ordering::SeqCst);
        let (transport, hub) = build(Arc::clone(&connector), None);
        let ctx = CancellationToken::new();

        transport.start(&ctx).await.unwrap();
        transport.start(&ctx).await.unwrap();
        assert_eq!(connector.dials.load(Ordering::SeqCst), 1);
        assert!(transport.is_alive());

        let status = transport.status();
        assert_eq!(status.rtt_ms, 25);
        assert_eq!(status.remote, "203.0.113.7:443");
        assert_eq!(status.sni, "example.com");

        let snap = hub.snapshot(true, "sing", "v");
        assert_eq!(snap.quic_rtt_ms, 25);
        assert_eq!(snap.alpn, "h3");

        transport.stop(Duration::from_secs(1)).await;
        assert!(!transport.is_alive());
        assert!(connector.closed.load(Ordering::SeqCst));
        // Second stop is a no-op.
        transport.stop(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_failed_probe_marks_session_lost() {
        let connector = Arc::new(FakeConnector::default());
        connector.healthy.store(true, Ordering::SeqCst);
        let (transport, _hub) = build(Arc::clone(&connector), Some(Duration::from_millis(10)));
        let ctx = CancellationToken::new();

        transport.start(&ctx).await.unwrap();
        assert!(transport.is_alive());

        connector.healthy.store(false, Ordering::SeqCst);
        let deadline = Instant::now() + Duration::from_secs(2);
        while transport.is_alive() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!transport.is_alive());
        assert!(transport.status().last_error.contains("peer gone"));

        // A lost session is replaced on the next start.
        connector.healthy.store(true, Ordering::SeqCst);
        transport.start(&ctx).await.unwrap();
        assert_eq!(connector.dials.load(Ordering::SeqCst), 2);
        assert!(transport.is_alive());
        transport.stop(Duration::from_secs(1)).await;
    }

    #[test]
    fn test_timing_without_probe_disables_staleness() {
        let runtime = RuntimeConfig {
            probe_interval: Duration::ZERO,
            liveness_timeout: Duration::from_millis(50),
            ..RuntimeConfig::default()
        };
        let timing = SessionTiming::from(&runtime);
        assert_eq!(timing.probe_interval, None);
        assert_eq!(timing.liveness_timeout, None);

        let probing = RuntimeConfig {
            probe_interval: Duration::from_millis(10),
            ..runtime
        };
        assert_eq!(
            SessionTiming::from(&probing).liveness_timeout,
            Some(Duration::from_millis(50))
        );
    }

    #[tokio::test]
    async fn test_unprobed_session_stays_alive() {
        let connector = Arc::new(FakeConnector::default());
        connector.healthy.store(true, Ordering::SeqCst);
        let hooks = Arc::new(NetHooks::new());
        hooks.set_protect(Some(Arc::new(|_: i32| true)));
        let runtime = RuntimeConfig {
            probe_interval: Duration::ZERO,
            liveness_timeout: Duration::from_millis(20),
            ..RuntimeConfig::default()
        };
        let transport = SingTransport::new(
            Arc::clone(&connector) as Arc<dyn Connector>,
            params(),
            hooks,
            Arc::new(TelemetryHub::default()),
            SessionTiming::from(&runtime),
        );
        let ctx = CancellationToken::new();

        transport.start(&ctx).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(transport.is_alive());

        transport.start(&ctx).await.unwrap();
        assert_eq!(connector.dials.load(Ordering::SeqCst), 1);
        transport.stop(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_initial_ping_failure_fails_start() {
        let connector = Arc::new(FakeConnector::default());
        let (transport, _hub) = build(Arc::clone(&connector), None);

        let err = transport.start(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.as_label(), "handshake_failed");
        assert!(connector.closed.load(Ordering::SeqCst));
        assert!(!transport.is_alive());
    }

    #[tokio::test]
    async fn test_cancelled_context_refuses_start() {
        let connector = Arc::new(FakeConnector::default());
        let (transport, _hub) = build(Arc::clone(&connector), None);
        let ctx = CancellationToken::new();
        ctx.cancel();

        let err = transport.start(&ctx).await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(connector.dials.load(Ordering::SeqCst), 0);
    }
}
