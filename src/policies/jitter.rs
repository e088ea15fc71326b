//! # Jitter for retry delays.
//!
//! [`JitterPolicy`] randomizes the delays a [`BackoffPolicy`](super::BackoffPolicy)
//! produces, so that many actions failing on the same cause do not retry in lockstep.
//!
//! | policy         | delay                                   |
//! |----------------|-----------------------------------------|
//! | `None`         | `d`                                     |
//! | `Full`         | `random[0, d]`                          |
//! | `Equal`        | `d/2 + random[0, d/2]`                  |
//! | `Decorrelated` | `random[first, min(prev * 3, max)]`     |

use std::time::Duration;

use rand::Rng;

/// Randomization applied on top of a computed delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Exact delays; fine for a single retrying action and for tests.
    #[default]
    None,
    /// Anywhere between zero and the delay.
    Full,
    /// At least half the delay.
    Equal,
    /// Grows from the first delay, independent of the exponential curve.
    ///
    /// Needs the extra context passed to
    /// [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to `delay`.
    ///
    /// `Decorrelated` returns `delay` unchanged here.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = millis(delay);
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full if ms == 0 => Duration::ZERO,
            JitterPolicy::Full => Duration::from_millis(rand::rng().random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                let extra = if half == 0 {
                    0
                } else {
                    rand::rng().random_range(0..=half)
                };
                Duration::from_millis(half + extra)
            }
        }
    }

    /// Decorrelated jitter: `random[floor, min(prev * 3, max)]`.
    ///
    /// Other policies fall back to [`apply`](Self::apply) on `prev`.
    pub fn apply_decorrelated(&self, floor: Duration, prev: Duration, max: Duration) -> Duration {
        if *self != JitterPolicy::Decorrelated {
            return self.apply(prev);
        }

        let floor_ms = millis(floor);
        let upper = millis(prev).saturating_mul(3).min(millis(max)).max(floor_ms);
        if floor_ms >= upper {
            return floor;
        }
        Duration::from_millis(rand::rng().random_range(floor_ms..=upper))
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_identity() {
        let d = Duration::from_millis(1234);
        assert_eq!(JitterPolicy::None.apply(d), d);
        assert_eq!(JitterPolicy::Decorrelated.apply(d), d);
    }

    #[test]
    fn test_zero_delay_stays_zero() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_decorrelated_respects_floor_and_cap() {
        let floor = Duration::from_millis(100);
        let max = Duration::from_millis(900);
        for _ in 0..100 {
            let d = JitterPolicy::Decorrelated.apply_decorrelated(floor, Duration::from_secs(5), max);
            assert!(d >= floor && d <= max, "{d:?} out of range");
        }
    }
}
