//! # Pulse Rate Estimation
//!
//! Converts rising-edge counts from a motor's speed pulse output into
//! pulses per second and RPM.
//!
//! ```
//! use rc_rover::feedback::pulse_rate::{rate_to_rpm, PulseRateEstimator};
//!
//! let mut estimator = PulseRateEstimator::new();
//! let pps = estimator.sample(50, 0.5);
//! assert_eq!(pps, 100.0);
//! assert_eq!(rate_to_rpm(pps, 20), 300.0);
//! ```

use std::time::Duration;
use tracing::debug;

use super::pid::PidGains;

/// Pulses per revolution assumed when a motor does not specify one
pub const DEFAULT_PULSES_PER_REVOLUTION: u32 = 20;

/// Monotonic count of rising edges since the counter started
#[cfg_attr(test, mockall::automock)]
pub trait EdgeCounter: Send {
    fn count(&mut self) -> u64;
}

impl<E: EdgeCounter + ?Sized> EdgeCounter for Box<E> {
    fn count(&mut self) -> u64 {
        (**self).count()
    }
}

/// Convert a pulse rate to revolutions per minute
///
/// Returns 0 for a zero pulses-per-revolution count.
#[must_use]
pub fn rate_to_rpm(rate_pps: f64, pulses_per_revolution: u32) -> f64 {
    if pulses_per_revolution == 0 {
        return 0.0;
    }
    rate_pps / f64::from(pulses_per_revolution) * 60.0
}

/// Rate estimator holding the last good rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PulseRateEstimator {
    rate: f64,
}

impl PulseRateEstimator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimate the rate from an edge delta over an elapsed time
    ///
    /// A non-positive or non-finite `elapsed_s` cannot yield a rate; the
    /// previous rate is returned unchanged.
    pub fn sample(&mut self, delta: u64, elapsed_s: f64) -> f64 {
        if !elapsed_s.is_finite() || elapsed_s <= 0.0 {
            debug!("Rate sample with elapsed {}s ignored, keeping {:.1} pps", elapsed_s, self.rate);
            return self.rate;
        }
        self.rate = delta as f64 / elapsed_s;
        self.rate
    }

    /// Last estimated rate in pulses per second
    #[must_use]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn reset(&mut self) {
        self.rate = 0.0;
    }
}

/// Turns readings of an [`EdgeCounter`] into rate samples.
#[derive(Debug)]
pub struct PulseCounter<C> {
    counter: C,
    estimator: PulseRateEstimator,
    last: Option<(u64, Duration)>,
}

impl<C: EdgeCounter> PulseCounter<C> {
    pub fn new(counter: C) -> Self {
        Self {
            counter,
            estimator: PulseRateEstimator::new(),
            last: None,
        }
    }

    /// Read the counter at time `now` and return the current rate
    ///
    /// The first reading after creation or [`reset`](Self::reset) only
    /// records the baseline and returns the held rate. A count lower than the
    /// previous one (counter restarted) is treated as a new baseline.
    pub fn sample(&mut self, now: Duration) -> f64 {
        let count = self.counter.count();
        let previous = self.last.replace((count, now));

        match previous {
            Some((last_count, last_time)) if count >= last_count => {
                let elapsed = now.saturating_sub(last_time).as_secs_f64();
                self.estimator.sample(count - last_count, elapsed)
            }
            Some(_) => {
                debug!("Edge counter went backwards, re-baselining");
                self.estimator.rate()
            }
            None => self.estimator.rate(),
        }
    }

    /// Forget the baseline and the held rate
    pub fn reset(&mut self) {
        self.last = None;
        self.estimator.reset();
    }

    #[must_use]
    pub fn rate(&self) -> f64 {
        self.estimator.rate()
    }

    /// Give back the wrapped counter
    pub fn into_inner(self) -> C {
        self.counter
    }
}

/// Summary of an open-loop pulse scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanStats {
    pub avg_pps: f64,
    /// Population standard deviation
    pub std_pps: f64,
    pub avg_rpm: f64,
    pub samples: usize,
}

impl ScanStats {
    /// Summarize a set of rate samples; `None` if there are none
    #[must_use]
    pub fn from_rates(rates: &[f64], pulses_per_revolution: u32) -> Option<Self> {
        if rates.is_empty() {
            return None;
        }
        let n = rates.len() as f64;
        let avg = rates.iter().sum::<f64>() / n;
        let variance = rates.iter().map(|r| (r - avg).powi(2)).sum::<f64>() / n;
        Some(Self {
            avg_pps: avg,
            std_pps: variance.sqrt(),
            avg_rpm: rate_to_rpm(avg, pulses_per_revolution),
            samples: rates.len(),
        })
    }
}

/// Starting gains derived from an open-loop scan
///
/// `Kp` is the inverse plant gain (duty percent per pulse/s), `Ki` spreads
/// it over the scan duration and `Kd` over half a sample interval. Returns
/// `None` when the scan saw no motion.
#[must_use]
pub fn suggest_gains(
    stats: &ScanStats,
    duty_percent: f64,
    duration: Duration,
    interval: Duration,
) -> Option<PidGains> {
    if stats.avg_pps <= 0.0 || duration.is_zero() {
        return None;
    }
    let kp = duty_percent / stats.avg_pps;
    Some(PidGains {
        kp,
        ki: kp / duration.as_secs_f64(),
        kd: kp * interval.as_secs_f64() / 2.0,
    })
}
