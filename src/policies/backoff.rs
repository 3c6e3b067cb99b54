//! # Reconnect backoff with flap suppression.
//!
//! [`BackoffConfig`] holds the immutable knobs, [`BackoffController`] the
//! per-supervisor state (attempt counter, recent failure timestamps, last delay).
//!
//! ## Algorithm
//! ```text
//! next():
//!   ├─► record failure timestamp (now)
//!   ├─► prune timestamps older than flap_window
//!   ├─► failures in window >= flap_threshold
//!   │       └─► attempt = 0, return cooldown          (flap suppression wins)
//!   └─► delay = min(base × factor^attempt, max)
//!       delay = min(jitter(delay), max)
//!       attempt += 1, return delay
//!
//! reset():
//!   └─► attempt = 0 (history is time-based and kept)
//! ```
//!
//! Because the base delay is derived from the attempt number alone, jitter
//! output never feeds back into the next computation.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use hy2core::{BackoffConfig, BackoffController, Jitter};
//!
//! let cfg = BackoffConfig { jitter: Jitter(0.0), ..BackoffConfig::default() };
//! let mut bo = BackoffController::new(cfg);
//!
//! assert_eq!(bo.next(), Duration::from_millis(500));
//! assert_eq!(bo.next(), Duration::from_millis(1000));
//! bo.reset();
//! assert_eq!(bo.next(), Duration::from_millis(500));
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::policies::jitter::Jitter;

/// Immutable backoff parameters.
///
/// Invariants (see [`BackoffConfig::validate`]): `base > 0`, `factor >= 1`,
/// `0 <= jitter <= 1`, `cooldown >= max`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffConfig {
    /// Delay of the first retry.
    pub base: Duration,
    /// Multiplicative growth per attempt.
    pub factor: f64,
    /// Cap for the exponential term.
    pub max: Duration,
    /// Symmetric proportional jitter.
    pub jitter: Jitter,
    /// Failures inside `flap_window` that trigger the cooldown.
    pub flap_threshold: usize,
    /// Sliding window for flap detection.
    pub flap_window: Duration,
    /// Fixed pause returned while flapping.
    pub cooldown: Duration,
}

impl Default for BackoffConfig {
    /// `base=500ms`, `factor=2.0`, `max=30s`, `jitter=±20%`,
    /// `flap_threshold=5` within `flap_window=60s`, `cooldown=60s`.
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            factor: 2.0,
            max: Duration::from_secs(30),
            jitter: Jitter::default(),
            flap_threshold: 5,
            flap_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(60),
        }
    }
}

impl BackoffConfig {
    /// Checks the invariants, returning a description of the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.base.is_zero() {
            return Err("backoff base must be > 0".into());
        }
        if !(self.factor >= 1.0) {
            return Err(format!("backoff factor must be >= 1, got {}", self.factor));
        }
        if !(0.0..=1.0).contains(&self.jitter.0) {
            return Err(format!("jitter must be within [0, 1], got {}", self.jitter.0));
        }
        if self.cooldown < self.max {
            return Err(format!(
                "cooldown {:?} must be >= max {:?}",
                self.cooldown, self.max
            ));
        }
        Ok(())
    }

    /// Capped exponential term for the given attempt, without jitter.
    pub fn nominal(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.base.as_secs_f64() * self.factor.powi(exp);

        if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// Per-supervisor backoff state.
///
/// Owned by exactly one supervisor worker; never shared.
#[derive(Debug)]
pub struct BackoffController {
    cfg: BackoffConfig,
    attempt: u32,
    failures: VecDeque<Instant>,
    last_delay: Duration,
}

impl BackoffController {
    pub fn new(cfg: BackoffConfig) -> Self {
        Self {
            cfg,
            attempt: 0,
            failures: VecDeque::with_capacity(8),
            last_delay: Duration::ZERO,
        }
    }

    /// Records a failure now and returns the delay before the next attempt.
    pub fn next(&mut self) -> Duration {
        self.next_at(Instant::now())
    }

    /// Same as [`next`](Self::next) with an explicit clock reading.
    pub fn next_at(&mut self, now: Instant) -> Duration {
        self.failures.push_back(now);
        self.prune(now);

        if self.failures.len() >= self.cfg.flap_threshold.max(1) {
            self.attempt = 0;
            self.last_delay = self.cfg.cooldown;
            return self.last_delay;
        }

        let nominal = self.cfg.nominal(self.attempt);
        let delay = self.cfg.jitter.apply(nominal).min(self.cfg.max);

        self.attempt = self.attempt.saturating_add(1);
        self.last_delay = delay;
        delay
    }

    /// Clears the attempt counter after a successful reconnect.
    ///
    /// Failure history is kept: flapping is judged by time, not by attempts.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.last_delay = Duration::ZERO;
    }

    /// Current attempt counter.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Last delay returned by [`next`](Self::next) (zero after reset).
    pub fn last_delay(&self) -> Duration {
        self.last_delay
    }

    /// Number of failures currently inside the flap window.
    pub fn failures_in_window(&self) -> usize {
        self.failures.len()
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.cfg
    }

    fn prune(&mut self, now: Instant) {
        let window = self.cfg.flap_window;
        while let Some(&oldest) = self.failures.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat() -> BackoffConfig {
        BackoffConfig {
            jitter: Jitter(0.0),
            ..BackoffConfig::default()
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert!(BackoffConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_broken_invariants() {
        let zero_base = BackoffConfig {
            base: Duration::ZERO,
            ..BackoffConfig::default()
        };
        assert!(zero_base.validate().is_err());

        let shrinking = BackoffConfig {
            factor: 0.5,
            ..BackoffConfig::default()
        };
        assert!(shrinking.validate().is_err());

        let short_cool = BackoffConfig {
            cooldown: Duration::from_secs(1),
            ..BackoffConfig::default()
        };
        assert!(short_cool.validate().is_err());

        let wild_jitter = BackoffConfig {
            jitter: Jitter(1.5),
            ..BackoffConfig::default()
        };
        assert!(wild_jitter.validate().is_err());
    }

    #[test]
    fn test_exponential_growth_without_jitter() {
        let mut bo = BackoffController::new(flat());
        let t0 = Instant::now();
        // Space failures beyond the flap window so suppression never kicks in.
        let step = Duration::from_secs(61);
        let expected = [500, 1000, 2000, 4000, 8000, 16000, 30000, 30000];
        for (i, ms) in expected.iter().enumerate() {
            let d = bo.next_at(t0 + step * i as u32);
            assert_eq!(d, Duration::from_millis(*ms), "attempt {i}");
        }
        assert_eq!(bo.attempt(), expected.len() as u32);
    }

    #[test]
    fn test_jittered_delay_never_exceeds_max() {
        let cfg = BackoffConfig {
            jitter: Jitter(1.0),
            ..BackoffConfig::default()
        };
        let mut bo = BackoffController::new(cfg);
        let t0 = Instant::now();
        for i in 0..200u32 {
            let d = bo.next_at(t0 + Duration::from_secs(61) * i);
            assert!(d <= cfg.max, "attempt {i}: {d:?} > max");
        }
    }

    #[test]
    fn test_flapping_returns_cooldown_and_resets_attempt() {
        let cfg = flat();
        let mut bo = BackoffController::new(cfg);
        let t0 = Instant::now();

        for i in 0..4u32 {
            let d = bo.next_at(t0 + Duration::from_secs(i as u64));
            assert!(d < cfg.cooldown);
        }
        assert_eq!(bo.attempt(), 4);

        let d = bo.next_at(t0 + Duration::from_secs(4));
        assert_eq!(d, cfg.cooldown);
        assert_eq!(bo.attempt(), 0);
        assert_eq!(bo.last_delay(), cfg.cooldown);
    }

    #[test]
    fn test_old_failures_fall_out_of_window() {
        let cfg = flat();
        let mut bo = BackoffController::new(cfg);
        let t0 = Instant::now();

        for i in 0..4u64 {
            bo.next_at(t0 + Duration::from_secs(i));
        }
        assert_eq!(bo.failures_in_window(), 4);

        // 61s later the four earlier failures are outside the window.
        let d = bo.next_at(t0 + Duration::from_secs(64));
        assert_ne!(d, cfg.cooldown);
        assert_eq!(bo.failures_in_window(), 1);
    }

    #[test]
    fn test_reset_restores_base_but_keeps_history() {
        let cfg = flat();
        let mut bo = BackoffController::new(cfg);
        let t0 = Instant::now();

        bo.next_at(t0);
        bo.next_at(t0 + Duration::from_secs(1));
        bo.next_at(t0 + Duration::from_secs(2));
        bo.reset();

        assert_eq!(bo.attempt(), 0);
        assert_eq!(bo.last_delay(), Duration::ZERO);
        assert_eq!(bo.failures_in_window(), 3);
        assert_eq!(bo.next_at(t0 + Duration::from_secs(3)), cfg.base);
    }

    #[test]
    fn test_reset_then_next_within_jitter_band() {
        let mut bo = BackoffController::new(BackoffConfig::default());
        let t0 = Instant::now();
        for i in 0..3u64 {
            bo.next_at(t0 + Duration::from_secs(61 * i));
        }
        bo.reset();

        let d = bo.next_at(t0 + Duration::from_secs(400));
        assert!(d >= Duration::from_millis(400), "{d:?}");
        assert!(d <= Duration::from_millis(600), "{d:?}");
    }

    #[test]
    fn test_huge_attempt_clamps_to_max() {
        assert_eq!(flat().nominal(u32::MAX), Duration::from_secs(30));
        assert_eq!(flat().nominal(100), Duration::from_secs(30));
    }
}
