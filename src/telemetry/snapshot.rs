use serde::{Deserialize, Serialize};

/// Point-in-time health view handed to the host.
///
/// Field names are the host contract and must not change. All fields are
/// always serialized, including zero and empty values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub running: bool,
    pub engine: String,
    pub version: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub reconnects: u32,
    pub quic_rtt_ms: u64,
    pub uptime_s: u64,
    pub sni: String,
    pub alpn: String,
    pub last_backoff_ms: u64,
    /// Unix seconds of the last recorded error, `0` if none.
    pub last_error_ts: i64,
}

impl TelemetrySnapshot {
    /// Flat JSON object with the twelve stable keys.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
