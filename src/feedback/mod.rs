//! # Speed Feedback Module
//!
//! Closed-loop motor speed control from pulse-rate feedback:
//! - Pulse counting and rate estimation
//! - PID controller with anti-windup
//! - Ziegler–Nichols auto-tuning by Kp sweep
//! - Trials and scans on a leased motor

pub mod autotune;
pub mod clock;
pub mod pid;
pub mod pulse_rate;
pub mod trial;

pub use autotune::{AutoTuner, CancelToken, SweepConfig, TuningOutcome};
pub use pid::{PidController, PidGains};
pub use pulse_rate::{EdgeCounter, PulseCounter, PulseRateEstimator};
