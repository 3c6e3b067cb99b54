//! # Process-level runtime configuration.
//!
//! Provides [`RuntimeConfig`], the knobs of the lifecycle engine that are not
//! part of the host's JSON payload: poll cadence, shutdown grace, RTT probing,
//! liveness staleness, event bus size and the backoff parameters.
//!
//! ## Sentinel values
//! - `poll_interval = 0` → clamped to 1ms
//! - `probe_interval = 0` → probing disabled (initial RTT sample only, which never goes stale)
//! - `liveness_timeout = 0` → RTT samples never go stale
//! - `handshake_timeout = 0` → no deadline around connect

use std::time::Duration;

use crate::policies::BackoffConfig;

/// Runtime configuration for orchestrator, supervisor and transports.
///
/// ## Field semantics
/// - `poll_interval`: Liveness re-check cadence while the transport is alive
/// - `stop_grace`: Upper bound for `stop()` (worker exit + transport teardown)
/// - `probe_interval`: RTT probe cadence of an established session
/// - `liveness_timeout`: Max age of the last RTT sample for a session to count as alive
/// - `handshake_timeout`: Deadline around one connect attempt
/// - `bus_capacity`: Event bus ring buffer size (min 1)
/// - `backoff`: Reconnect delay policy
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub poll_interval: Duration,
    pub stop_grace: Duration,
    pub probe_interval: Duration,
    pub liveness_timeout: Duration,
    pub handshake_timeout: Duration,
    pub bus_capacity: usize,
    pub backoff: BackoffConfig,
}

impl RuntimeConfig {
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval.max(Duration::from_millis(1))
    }

    #[inline]
    pub fn probe_interval(&self) -> Option<Duration> {
        if self.probe_interval.is_zero() {
            None
        } else {
            Some(self.probe_interval)
        }
    }

    #[inline]
    pub fn liveness_timeout(&self) -> Option<Duration> {
        if self.liveness_timeout.is_zero() {
            None
        } else {
            Some(self.liveness_timeout)
        }
    }

    #[inline]
    pub fn handshake_timeout(&self) -> Option<Duration> {
        if self.handshake_timeout.is_zero() {
            None
        } else {
            Some(self.handshake_timeout)
        }
    }

    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for RuntimeConfig {
    /// Default configuration:
    ///
    /// - `poll_interval = 50ms`
    /// - `stop_grace = 5s`
    /// - `probe_interval = 5s`
    /// - `liveness_timeout = 15s` (three missed probes)
    /// - `handshake_timeout = 10s`
    /// - `bus_capacity = 256`
    /// - `backoff = BackoffConfig::default()`
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            stop_grace: Duration::from_secs(5),
            probe_interval: Duration::from_secs(5),
            liveness_timeout: Duration::from_secs(15),
            handshake_timeout: Duration::from_secs(10),
            bus_capacity: 256,
            backoff: BackoffConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        let cfg = RuntimeConfig {
            poll_interval: Duration::ZERO,
            probe_interval: Duration::ZERO,
            liveness_timeout: Duration::ZERO,
            handshake_timeout: Duration::ZERO,
            bus_capacity: 0,
            ..RuntimeConfig::default()
        };
        assert_eq!(cfg.poll_interval(), Duration::from_millis(1));
        assert!(cfg.probe_interval().is_none());
        assert!(cfg.liveness_timeout().is_none());
        assert!(cfg.handshake_timeout().is_none());
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn test_defaults() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.stop_grace, Duration::from_secs(5));
        assert_eq!(cfg.poll_interval(), Duration::from_millis(50));
        assert!(cfg.backoff.validate().is_ok());
    }
}
