use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::config::RuntimeConfig;
use super::orchestrator::Orchestrator;
use crate::config::EngineKind;
use crate::logging::LogBridge;
use crate::net::NetHooks;
use crate::telemetry::TelemetryHub;
use crate::transport::{Connector, ConnectorRegistry};

/// Builder for an [`Orchestrator`].
pub struct OrchestratorBuilder {
    runtime: RuntimeConfig,
    registry: ConnectorRegistry,
    logs: Option<Arc<LogBridge>>,
    hooks: Option<Arc<NetHooks>>,
}

impl OrchestratorBuilder {
    pub fn new(runtime: RuntimeConfig) -> Self {
        Self {
            runtime,
            registry: ConnectorRegistry::new(),
            logs: None,
            hooks: None,
        }
    }

    /// Links the client library used for `engine`.
    pub fn with_connector(mut self, engine: EngineKind, connector: Arc<dyn Connector>) -> Self {
        self.registry.register(engine, connector);
        self
    }

    /// Shares an existing log bridge (e.g. one already installed globally).
    pub fn with_log_bridge(mut self, logs: Arc<LogBridge>) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Shares existing network hooks (e.g. a protect callback set up early).
    pub fn with_net_hooks(mut self, hooks: Arc<NetHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn build(self) -> Orchestrator {
        if let Err(reason) = self.runtime.backoff.validate() {
            tracing::warn!(%reason, "backoff config violates its invariants");
        }
        let hub = TelemetryHub::shared(self.runtime.bus_capacity_clamped());
        Orchestrator::new_internal(
            self.runtime,
            self.registry,
            hub,
            self.hooks.unwrap_or_default(),
            self.logs.unwrap_or_default(),
            CancellationToken::new(),
        )
    }
}
