//! Refresh jitter
//!
//! A fleet of processes that all cache the same key ring would otherwise
//! refresh at the same instant. Periods are scaled by a random factor drawn
//! from `[floor, 1.0]`, so jitter only ever shortens a period.

use std::time::Duration;

use rand::Rng;

/// Draw a jitter factor uniformly from `[floor, 1.0]`.
///
/// `floor` is clamped to `[0.0, 1.0]`; a floor of `1.0` disables jitter.
pub fn jitter_factor(floor: f64) -> f64 {
    let floor = if floor.is_finite() { floor.clamp(0.0, 1.0) } else { 1.0 };
    if floor >= 1.0 {
        return 1.0;
    }
    rand::thread_rng().gen_range(floor..=1.0)
}

/// Scale `period` by a random factor in `[floor, 1.0]`.
///
/// Never exceeds `period`, including periods too large to round-trip
/// through `f64` seconds.
pub fn scale_with_jitter(period: Duration, floor: f64) -> Duration {
    Duration::try_from_secs_f64(period.as_secs_f64() * jitter_factor(floor))
        .map_or(period, |scaled| scaled.min(period))
}
