//! # Socket protection.
//!
//! On VPN-capable platforms every socket the tunnel itself uses must be
//! excluded from the VPN routing table, otherwise tunnel traffic loops back
//! into the tunnel. The host registers a `protect(fd) -> bool` callback once;
//! backends call it before a socket carries any packet.
//!
//! ## Rules
//! - No hook registered → protection fails.
//! - Hook returns `false` or panics → protection fails.
//! - A socket that failed protection is closed and the dial fails with
//!   [`TransportError::Protect`].

use std::net::SocketAddr;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock};

use tokio::net::{TcpSocket, TcpStream, UdpSocket};

use crate::error::TransportError;

/// Host callback marking a descriptor as bypassing the VPN.
pub type ProtectFn = Arc<dyn Fn(i32) -> bool + Send + Sync>;

/// Holder for the host's protect callback.
#[derive(Default)]
pub struct NetHooks {
    protect: RwLock<Option<ProtectFn>>,
}

impl NetHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or clears (`None`) the protect callback.
    pub fn set_protect(&self, hook: Option<ProtectFn>) {
        let mut guard = self.protect.write().unwrap_or_else(|p| p.into_inner());
        *guard = hook;
    }

    pub fn has_protect(&self) -> bool {
        self.protect
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .is_some()
    }

    /// Runs the hook on `fd`.
    pub fn protect_fd(&self, fd: i32) -> bool {
        let hook = self
            .protect
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        let Some(hook) = hook else {
            tracing::warn!(fd, "protect hook not set");
            return false;
        };
        match catch_unwind(AssertUnwindSafe(|| hook(fd))) {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(fd, "protect refused");
                false
            }
            Err(_) => {
                tracing::error!(fd, "protect hook panicked");
                false
            }
        }
    }

    /// Binds an ephemeral IPv4 UDP socket and protects it.
    pub async fn protected_udp_socket(&self) -> Result<UdpSocket, TransportError> {
        let sock = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(TransportError::dial)?;
        let fd = raw_fd(&sock);
        if !self.protect_fd(fd) {
            return Err(TransportError::Protect { fd });
        }
        Ok(sock)
    }
}

/// Dialer whose sockets are protected on creation.
#[derive(Clone)]
pub struct ProtectedDialer {
    hooks: Arc<NetHooks>,
}

impl ProtectedDialer {
    pub fn new(hooks: Arc<NetHooks>) -> Self {
        Self { hooks }
    }

    pub async fn bind_udp(&self) -> Result<UdpSocket, TransportError> {
        self.hooks.protected_udp_socket().await
    }

    /// Resolves `addr` (`host:port`) and connects over protected TCP.
    pub async fn connect_tcp(&self, addr: &str) -> Result<TcpStream, TransportError> {
        let target = resolve(addr).await?;
        let sock = match target {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(TransportError::dial)?;

        let fd = raw_fd(&sock);
        if !self.hooks.protect_fd(fd) {
            return Err(TransportError::Protect { fd });
        }
        sock.connect(target).await.map_err(TransportError::dial)
    }
}

/// First address `addr` resolves to.
pub async fn resolve(addr: &str) -> Result<SocketAddr, TransportError> {
    tokio::net::lookup_host(addr)
        .await
        .map_err(TransportError::dial)?
        .next()
        .ok_or_else(|| TransportError::dial(format!("no address for {addr}")))
}

#[cfg(unix)]
fn raw_fd<S: std::os::fd::AsRawFd>(sock: &S) -> i32 {
    sock.as_raw_fd()
}

#[cfg(not(unix))]
fn raw_fd<S>(_sock: &S) -> i32 {
    -1
}
