//! Time abstractions used by key management
//!
//! - **[`clock`]**: wall-clock abstraction with a controllable mock for tests
//! - **[`jitter`]**: randomized shortening of refresh periods
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use ringfence_common::time::{scale_with_jitter, Clock, MockClock};
//!
//! let clock = MockClock::at_epoch_millis(0);
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.now().timestamp(), 5);
//!
//! let jittered = scale_with_jitter(Duration::from_secs(100), 0.8);
//! assert!(jittered >= Duration::from_secs(80));
//! ```

pub mod clock;
pub mod jitter;

pub use clock::{saturating_add, saturating_sub, Clock, MockClock, SystemClock};
pub use jitter::{jitter_factor, scale_with_jitter};
