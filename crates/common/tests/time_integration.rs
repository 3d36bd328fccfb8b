//! Integration tests for the `time` module.
//!
//! Covers the mock clock driving chrono arithmetic and the jitter helpers
//! used for key ring refresh scheduling.

#![cfg(feature = "runtime")]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, TimeZone, Utc};
use ringfence_common::time::{jitter_factor, scale_with_jitter, Clock, MockClock, SystemClock};

/// A boxed clock behaves identically to the concrete one it wraps.
#[test]
fn test_clock_trait_objects() {
    let start = Utc.with_ymd_and_hms(2015, 3, 1, 0, 0, 0).unwrap();
    let mock = MockClock::new(start);
    let clocks: Vec<Arc<dyn Clock>> = vec![Arc::new(mock.clone()), Arc::new(SystemClock)];

    mock.advance(Duration::from_secs(2 * 24 * 60 * 60));
    assert_eq!(clocks[0].now(), start + TimeDelta::days(2));
    assert!(clocks[1].now() > start);
}

/// Jittered refresh periods stay within `[floor * period, period]` and are
/// not all identical.
#[test]
fn test_jitter_spreads_refreshes() {
    let period = Duration::from_secs(24 * 60 * 60);
    let samples: Vec<Duration> = (0..200).map(|_| scale_with_jitter(period, 0.8)).collect();

    for sample in &samples {
        assert!(*sample <= period);
        assert!(*sample >= period.mul_f64(0.8) - Duration::from_millis(1));
    }
    assert!(samples.windows(2).any(|w| w[0] != w[1]));
    assert!((jitter_factor(1.0) - 1.0).abs() < f64::EPSILON);
}
