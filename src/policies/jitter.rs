//! # Proportional jitter for reconnect delays.
//!
//! [`Jitter`] spreads a computed delay symmetrically around its nominal value
//! so that many clients losing the same server do not retry in lockstep.
//!
//! For a fraction `j` and a uniform draw `u ∈ [0, 1)` the factor is
//! `1 + j × (2u − 1)`, i.e. the delay lands in `[d × (1 − j), d × (1 + j))`.

use rand::Rng;
use std::time::Duration;

/// Symmetric proportional jitter, `0.0 ..= 1.0`.
///
/// `Jitter(0.0)` disables randomization (useful in tests).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Jitter(pub f64);

impl Default for Jitter {
    /// ±20%.
    fn default() -> Self {
        Jitter(0.2)
    }
}

impl Jitter {
    /// Returns the jitter fraction clamped into `0.0 ..= 1.0`.
    #[inline]
    pub fn fraction(&self) -> f64 {
        if self.0.is_finite() {
            self.0.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Applies jitter using the thread-local RNG.
    pub fn apply(&self, delay: Duration) -> Duration {
        let u: f64 = rand::rng().random();
        self.apply_with(delay, u)
    }

    /// Applies jitter for a given uniform draw `u ∈ [0, 1)`.
    pub fn apply_with(&self, delay: Duration, u: f64) -> Duration {
        let j = self.fraction();
        if j == 0.0 || delay.is_zero() {
            return delay;
        }
        let factor = 1.0 + j * (2.0 * u.clamp(0.0, 1.0) - 1.0);
        Duration::from_secs_f64((delay.as_secs_f64() * factor).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_jitter_is_identity() {
        let d = Duration::from_millis(750);
        assert_eq!(Jitter(0.0).apply(d), d);
    }

    #[test]
    fn test_draw_extremes() {
        let d = Duration::from_millis(1000);
        let j = Jitter(0.2);
        assert_eq!(j.apply_with(d, 0.0), Duration::from_millis(800));
        assert_eq!(j.apply_with(d, 0.5), Duration::from_millis(1000));
        assert!(j.apply_with(d, 0.999_999) < Duration::from_millis(1200));
    }

    #[test]
    fn test_random_within_band() {
        let d = Duration::from_millis(1000);
        for _ in 0..500 {
            let got = Jitter(0.2).apply(d);
            assert!(got >= Duration::from_millis(800), "{got:?} below band");
            assert!(got <= Duration::from_millis(1200), "{got:?} above band");
        }
    }

    #[test]
    fn test_fraction_is_clamped() {
        assert_eq!(Jitter(3.0).fraction(), 1.0);
        assert_eq!(Jitter(-1.0).fraction(), 0.0);
        assert_eq!(Jitter(f64::NAN).fraction(), 0.0);
    }
}
