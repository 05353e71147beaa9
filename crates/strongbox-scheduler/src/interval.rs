//! Jittered wake interval.

use std::time::Duration;

use rand::Rng;

/// Lower bound of the jitter band, as a fraction of the base interval.
const JITTER_LOW: f64 = 0.8;

/// Upper bound of the jitter band, as a fraction of the base interval.
const JITTER_HIGH: f64 = 1.2;

/// Picks the delay before the next check cycle.
///
/// Every scheduler instance in a fleet shares the same base interval; the
/// ±20% jitter keeps them from waking in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalPolicy {
    base_interval: Duration,
}

impl IntervalPolicy {
    pub fn new(base_interval: Duration) -> Self {
        Self { base_interval }
    }

    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    /// The closed range delays are drawn from.
    pub fn bounds(&self) -> (Duration, Duration) {
        let base = self.base_interval.as_secs_f64();
        (
            Duration::from_secs_f64(JITTER_LOW * base),
            Duration::from_secs_f64(JITTER_HIGH * base),
        )
    }

    /// Draw a delay uniformly from `[0.8 * base, 1.2 * base]`.
    pub fn compute_next_delay(&self) -> Duration {
        self.compute_next_delay_with(&mut rand::thread_rng())
    }

    /// Same as [`IntervalPolicy::compute_next_delay`] with a caller-supplied RNG.
    pub fn compute_next_delay_with<R: Rng>(&self, rng: &mut R) -> Duration {
        let base = self.base_interval.as_secs_f64();
        let secs = rng.gen_range(JITTER_LOW * base..=JITTER_HIGH * base);
        Duration::from_secs_f64(secs)
    }
}
