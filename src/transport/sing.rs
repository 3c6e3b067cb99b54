//! Engine `sing`: the client library runs QUIC over a protected UDP socket
//! that the core binds and hands over.

use std::sync::Arc;

use super::engine::{DialHook, EngineHook};
use super::quic::QuicTransport;
use crate::config::EngineKind;
use crate::error::TransportError;
use crate::net::NetHooks;

/// Marker for the `sing` engine.
#[derive(Debug)]
pub struct Sing;

impl EngineHook for Sing {
    const KIND: EngineKind = EngineKind::Sing;

    async fn dial_hook(hooks: &Arc<NetHooks>) -> Result<DialHook, TransportError> {
        let sock = hooks.protected_udp_socket().await?;
        Ok(DialHook::PacketConn(sock))
    }
}

pub type SingTransport = QuicTransport<Sing>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hook_requires_protection() {
        let hooks = Arc::new(NetHooks::new());
        let err = Sing::dial_hook(&hooks).await.unwrap_err();
        assert_eq!(err.as_label(), "protect_failed");

        hooks.set_protect(Some(Arc::new(|_: i32| true)));
        let hook = Sing::dial_hook(&hooks).await.unwrap();
        assert_eq!(hook.as_label(), "packet_conn");
    }
}
