use serde::Serialize;

/// Latest known state of a transport. Built on demand, never cached.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TransportStatus {
    /// Last RTT sample in milliseconds, `0` before the first sample.
    pub rtt_ms: u64,
    /// Remote endpoint of the current session, empty without one.
    pub remote: String,
    pub alpn: String,
    pub sni: String,
    /// Last dial/handshake/probe error, empty if none.
    pub last_error: String,
}
