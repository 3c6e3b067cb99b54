//! Engine selection.
//!
//! The host links one [`Connector`] per engine into the orchestrator. A
//! configuration naming an engine with no connector fails with
//! `EngineInitFailed` before anything is started.

use std::collections::HashMap;
use std::sync::Arc;

use super::Transport;
use super::engine::{Connector, DialParams};
use super::hc::HcTransport;
use super::quic::SessionTiming;
use super::sing::SingTransport;
use crate::config::{EngineKind, SessionConfig};
use crate::core::RuntimeConfig;
use crate::error::SdkError;
use crate::net::NetHooks;
use crate::telemetry::TelemetryHub;

/// Connectors by engine.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    by_engine: HashMap<EngineKind, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `connector` for `engine`, replacing any previous one.
    pub fn register(&mut self, engine: EngineKind, connector: Arc<dyn Connector>) {
        self.by_engine.insert(engine, connector);
    }

    pub fn get(&self, engine: EngineKind) -> Option<Arc<dyn Connector>> {
        self.by_engine.get(&engine).cloned()
    }

    pub fn contains(&self, engine: EngineKind) -> bool {
        self.by_engine.contains_key(&engine)
    }
}

/// Builds the transport for `cfg.engine`.
pub fn select(
    cfg: &SessionConfig,
    registry: &ConnectorRegistry,
    hooks: &Arc<NetHooks>,
    hub: &Arc<TelemetryHub>,
    runtime: &RuntimeConfig,
) -> Result<Arc<dyn Transport>, SdkError> {
    let engine = cfg.engine_kind();
    let connector = registry
        .get(engine)
        .ok_or_else(|| SdkError::EngineInitFailed {
            engine: engine.id(),
            error: "no connector registered".to_string(),
        })?;

    let params = DialParams::from_session(cfg);
    let hooks = Arc::clone(hooks);
    let hub = Arc::clone(hub);
    let timing = SessionTiming::from(runtime);

    let transport: Arc<dyn Transport> = match engine {
        EngineKind::Sing => Arc::new(SingTransport::new(connector, params, hooks, hub, timing)),
        EngineKind::Hc => Arc::new(HcTransport::new(connector, params, hooks, hub, timing)),
    };
    tracing::debug!(engine = engine.id(), "transport selected");
    Ok(transport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::{DialHook, Link};
    use async_trait::async_trait;

    struct Refusing;

    #[async_trait]
    impl Connector for Refusing {
        async fn connect(
            &self,
            _hook: DialHook,
            _params: &DialParams,
        ) -> Result<Arc<dyn Link>, TransportError> {
            Err(TransportError::dial("refused"))
        }
    }

    fn deps() -> (Arc<NetHooks>, Arc<TelemetryHub>, RuntimeConfig) {
        (
            Arc::new(NetHooks::new()),
            Arc::new(TelemetryHub::default()),
            RuntimeConfig::default(),
        )
    }

    #[test]
    fn test_selects_by_engine() {
        let (hooks, hub, runtime) = deps();
        let mut registry = ConnectorRegistry::new();
        registry.register(EngineKind::Sing, Arc::new(Refusing));
        registry.register(EngineKind::Hc, Arc::new(Refusing));

        let sing = SessionConfig::parse(r#"{"server":"h:443","password":"p"}"#).unwrap();
        let hc = SessionConfig::parse(r#"{"server":"h:443","password":"p","engine":"hc"}"#)
            .unwrap();

        let t = select(&sing, &registry, &hooks, &hub, &runtime).unwrap();
        assert_eq!(t.engine(), EngineKind::Sing);
        let t = select(&hc, &registry, &hooks, &hub, &runtime).unwrap();
        assert_eq!(t.engine(), EngineKind::Hc);
        assert!(!t.is_alive());
    }

    #[test]
    fn test_missing_connector_is_engine_init_failure() {
        let (hooks, hub, runtime) = deps();
        let registry = ConnectorRegistry::new();
        let cfg = SessionConfig::parse(r#"{"server":"h:443","password":"p","engine":"hc"}"#)
            .unwrap();

        let err = match select(&cfg, &registry, &hooks, &hub, &runtime) {
            Err(err) => err,
            Ok(_) => panic!("expected EngineInitFailed"),
        };
        assert!(matches!(err, SdkError::EngineInitFailed { engine: "hc", .. }));
    }
}
