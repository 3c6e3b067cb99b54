//! # Client-library seams.
//!
//! The tunnel protocol itself (QUIC, TLS, auth, multiplexing) lives in an
//! external client library. The core only needs three capabilities from it:
//!
//! ```text
//!                 EngineHook::dial_hook(hooks)
//!                          │
//!                          ▼
//!  DialHook::PacketConn(UdpSocket)  (sing)      ┐
//!  DialHook::Dialer(ProtectedDialer) (hc)       ├─► Connector::connect(hook, params) ─► Arc<dyn Link>
//!                                               ┘                                        ├─ ping()   → RTT
//!                                                                                        ├─ remote()
//!                                                                                        └─ close()
//! ```
//!
//! [`EngineHook`] is the only thing the two engines disagree on: which kind of
//! protected socket access the client library is handed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::config::{EngineKind, SessionConfig};
use crate::error::TransportError;
use crate::net::{NetHooks, ProtectedDialer};

/// Socket access handed to a [`Connector`].
pub enum DialHook {
    /// A bound, protected UDP socket the client runs QUIC over.
    PacketConn(UdpSocket),
    /// A dialer protecting every socket it creates.
    Dialer(ProtectedDialer),
}

impl DialHook {
    pub fn as_label(&self) -> &'static str {
        match self {
            DialHook::PacketConn(_) => "packet_conn",
            DialHook::Dialer(_) => "dialer",
        }
    }
}

impl std::fmt::Debug for DialHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Session parameters passed to the client library.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialParams {
    pub server: String,
    pub password: String,
    pub sni: String,
    pub alpn: Vec<String>,
    pub up_mbps: u32,
    pub down_mbps: u32,
    /// `None` leaves the library default.
    pub idle_timeout: Option<Duration>,
}

impl DialParams {
    pub fn from_session(cfg: &SessionConfig) -> Self {
        Self {
            server: cfg.server.clone(),
            password: cfg.password.clone(),
            sni: cfg.sni.clone(),
            alpn: cfg.alpn.clone(),
            up_mbps: cfg.up_mbps,
            down_mbps: cfg.down_mbps,
            idle_timeout: (cfg.idle_timeout_s > 0)
                .then(|| Duration::from_secs(u64::from(cfg.idle_timeout_s))),
        }
    }

    pub fn primary_alpn(&self) -> &str {
        self.alpn.first().map(String::as_str).unwrap_or("h3")
    }
}

/// One established tunnel session inside the client library.
#[async_trait]
pub trait Link: Send + Sync + 'static {
    /// Measures one round trip over the session.
    async fn ping(&self) -> Result<Duration, TransportError>;

    /// Remote endpoint as reported by the library.
    fn remote(&self) -> String;

    /// Closes the session. Must be safe to call more than once.
    async fn close(&self);
}

/// Factory establishing [`Link`]s.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(
        &self,
        hook: DialHook,
        params: &DialParams,
    ) -> Result<Arc<dyn Link>, TransportError>;
}

/// Engine-specific dial hook construction.
pub trait EngineHook: Send + Sync + 'static {
    const KIND: EngineKind;

    fn dial_hook(
        hooks: &Arc<NetHooks>,
    ) -> impl Future<Output = Result<DialHook, TransportError>> + Send;
}
