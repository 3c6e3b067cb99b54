//! Engine `hc` (hysteria core): the client library dials on its own through a
//! [`ProtectedDialer`], so every socket it opens is protected at creation.
//!
//! The hook is checked up front so a missing protect callback fails the dial
//! here instead of deep inside the library.

use std::sync::Arc;

use super::engine::{DialHook, EngineHook};
use super::quic::QuicTransport;
use crate::config::EngineKind;
use crate::error::TransportError;
use crate::net::{NetHooks, ProtectedDialer};

/// Marker for the `hc` engine.
#[derive(Debug)]
pub struct Hc;

impl EngineHook for Hc {
    const KIND: EngineKind = EngineKind::Hc;

    async fn dial_hook(hooks: &Arc<NetHooks>) -> Result<DialHook, TransportError> {
        if !hooks.has_protect() {
            tracing::warn!("hc dial without protect hook");
            return Err(TransportError::Protect { fd: -1 });
        }
        Ok(DialHook::Dialer(ProtectedDialer::new(Arc::clone(hooks))))
    }
}

pub type HcTransport = QuicTransport<Hc>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hook_is_a_dialer() {
        let hooks = Arc::new(NetHooks::new());
        assert!(Hc::dial_hook(&hooks).await.is_err());

        hooks.set_protect(Some(Arc::new(|_: i32| true)));
        let hook = Hc::dial_hook(&hooks).await.unwrap();
        assert_eq!(hook.as_label(), "dialer");
    }
}
