//! # PID Auto-Tuner
//!
//! Ziegler–Nichols tuning by proportional-gain sweep.
//!
//! ## Algorithm
//!
//! 1. For increasing `Kp` (default 1, 6, 11, … 96), run a fixed-duration
//!    closed-loop trial with `Ki = Kd = 0`, recording `(t, error)`.
//! 2. Count zero crossings: a strict sign change between consecutive
//!    samples, timed at the later sample.
//! 3. The first trial with at least `min_crossings` (6) crossings is
//!    oscillating: `Ku` is its `Kp`, and `Pu` is the time between the last
//!    and third-to-last crossing (one full period).
//! 4. Gains: `Kp = 0.6·Ku`, `Ki = 2·Kp/Pu`, `Kd = Kp·Pu/8`.
//!
//! No oscillating trial means no gains: a period is never estimated from
//! fewer crossings than required.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::pid::{PidController, PidGains};
use crate::config::{TuningConfig, MAX_SWEEP_TRIALS};
use crate::drive::command::MotorId;
use crate::error::TuningError;
use crate::telemetry::{Event, EventSink};

/// One recorded error sample of a trial
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorSample {
    /// Seconds since the trial started
    pub t: f64,
    pub error: f64,
}

impl ErrorSample {
    #[must_use]
    pub fn new(t: f64, error: f64) -> Self {
        Self { t, error }
    }
}

/// Sustained oscillation found in one trial
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Oscillation {
    /// Ultimate gain
    pub ku: f64,
    /// Ultimate period in seconds
    pub pu: f64,
    pub crossings: usize,
}

/// Successful tuning result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningOutcome {
    pub oscillation: Oscillation,
    pub gains: PidGains,
    /// Trials run, including the oscillating one
    pub trials: usize,
}

/// Shared cancellation flag, checked between samples
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Runs one P-only closed-loop trial
pub trait TrialRunner {
    /// Run a trial at `kp` for `duration`, returning the error series
    ///
    /// # Errors
    ///
    /// Returns [`TuningError::Cancelled`] if `cancel` fires mid-trial, or
    /// another error if the trial cannot run.
    fn run_trial(
        &mut self,
        kp: f64,
        duration: Duration,
        cancel: &CancelToken,
    ) -> Result<Vec<ErrorSample>, TuningError>;
}

/// Times of strict sign changes between consecutive samples
#[must_use]
pub fn find_crossings(samples: &[ErrorSample]) -> Vec<f64> {
    samples
        .windows(2)
        .filter(|pair| pair[0].error * pair[1].error < 0.0)
        .map(|pair| pair[1].t)
        .collect()
}

/// Detect sustained oscillation in a trial run at `kp`
///
/// Requires at least `min_crossings` crossings (never fewer than 3) and a
/// positive period.
#[must_use]
pub fn analyze(kp: f64, samples: &[ErrorSample], min_crossings: usize) -> Option<Oscillation> {
    let crossings = find_crossings(samples);
    let n = crossings.len();
    if n < min_crossings.max(3) {
        return None;
    }

    let pu = crossings[n - 1] - crossings[n - 3];
    (pu > 0.0).then_some(Oscillation {
        ku: kp,
        pu,
        crossings: n,
    })
}

/// Classic Ziegler–Nichols PID gains
///
/// # Examples
///
/// ```
/// use rc_rover::feedback::autotune::ziegler_nichols;
///
/// let gains = ziegler_nichols(10.0, 2.0);
/// assert!((gains.kp - 6.0).abs() < 1e-12);
/// assert!((gains.ki - 6.0).abs() < 1e-12);
/// assert!((gains.kd - 1.5).abs() < 1e-12);
/// ```
#[must_use]
pub fn ziegler_nichols(ku: f64, pu: f64) -> PidGains {
    let kp = 0.6 * ku;
    PidGains {
        kp,
        ki: 2.0 * kp / pu,
        kd: kp * pu / 8.0,
    }
}

/// Gain sweep settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepConfig {
    pub kp_start: f64,
    pub kp_step: f64,
    pub kp_max: f64,
    pub trial_duration: Duration,
    /// Total trial time allowed for the whole sweep
    pub budget: Duration,
    pub min_crossings: usize,
}

impl SweepConfig {
    #[must_use]
    pub fn from_config(config: &TuningConfig) -> Self {
        Self {
            kp_start: config.kp_start,
            kp_step: config.kp_step,
            kp_max: config.kp_max,
            trial_duration: Duration::from_millis(config.trial_duration_ms),
            budget: Duration::from_millis(config.sweep_budget_ms),
            min_crossings: config.min_crossings,
        }
    }

    /// Gains to try, in order, never more than [`MAX_SWEEP_TRIALS`]
    #[must_use]
    pub fn kp_values(&self) -> Vec<f64> {
        if self.kp_step <= 0.0 || !self.kp_step.is_finite() {
            return vec![self.kp_start];
        }
        (0..MAX_SWEEP_TRIALS)
            .map(|i| self.kp_start + i as f64 * self.kp_step)
            .take_while(|kp| *kp <= self.kp_max + 1e-9)
            .collect()
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self::from_config(&TuningConfig::default())
    }
}

/// Kp sweep driver for one motor
#[derive(Debug, Clone)]
pub struct AutoTuner {
    config: SweepConfig,
    motor: MotorId,
}

impl AutoTuner {
    #[must_use]
    pub fn new(config: SweepConfig, motor: MotorId) -> Self {
        Self { config, motor }
    }

    #[must_use]
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Sweep Kp until a trial oscillates
    ///
    /// # Errors
    ///
    /// - [`TuningError::NoOscillation`] if no trial oscillates
    /// - [`TuningError::Cancelled`] if `cancel` fires
    /// - [`TuningError::BudgetExhausted`] if the next trial would exceed
    ///   the sweep budget
    /// - any error returned by the runner
    pub fn run<R, S>(
        &self,
        runner: &mut R,
        cancel: &CancelToken,
        sink: &mut S,
    ) -> Result<TuningOutcome, TuningError>
    where
        R: TrialRunner + ?Sized,
        S: EventSink + ?Sized,
    {
        let result = self.sweep(runner, cancel, sink);
        match &result {
            Ok(outcome) => sink.emit(&Event::TuningResult {
                motor: self.motor,
                ku: outcome.oscillation.ku,
                pu: outcome.oscillation.pu,
                gains: outcome.gains,
            }),
            Err(e) => sink.emit(&Event::TuningFailed {
                motor: self.motor,
                reason: e.to_string(),
            }),
        }
        result
    }

    /// Run the sweep and, on success only, install the tuned gains
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run); `pid` is untouched on error.
    pub fn tune<R, S>(
        &self,
        runner: &mut R,
        pid: &mut PidController,
        cancel: &CancelToken,
        sink: &mut S,
    ) -> Result<TuningOutcome, TuningError>
    where
        R: TrialRunner + ?Sized,
        S: EventSink + ?Sized,
    {
        let outcome = self.run(runner, cancel, sink)?;
        pid.set_gains(outcome.gains);
        Ok(outcome)
    }

    fn sweep<R, S>(
        &self,
        runner: &mut R,
        cancel: &CancelToken,
        sink: &mut S,
    ) -> Result<TuningOutcome, TuningError>
    where
        R: TrialRunner + ?Sized,
        S: EventSink + ?Sized,
    {
        let mut spent = Duration::ZERO;
        let mut last_kp = self.config.kp_start;

        for (index, kp) in self.config.kp_values().into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(TuningError::Cancelled);
            }
            if spent + self.config.trial_duration > self.config.budget {
                return Err(TuningError::BudgetExhausted {
                    budget_s: self.config.budget.as_secs_f64(),
                    kp,
                });
            }

            sink.emit(&Event::TrialStarted { motor: self.motor, kp });
            let samples = runner.run_trial(kp, self.config.trial_duration, cancel)?;
            spent += self.config.trial_duration;
            last_kp = kp;

            let crossings = find_crossings(&samples).len();
            sink.emit(&Event::TrialCompleted {
                motor: self.motor,
                kp,
                samples: samples.len(),
                crossings,
            });
            debug!("Kp={} produced {} crossings in {} samples", kp, crossings, samples.len());

            if let Some(oscillation) = analyze(kp, &samples, self.config.min_crossings) {
                info!("Oscillation at Kp={}, Pu={:.3}s", oscillation.ku, oscillation.pu);
                sink.emit(&Event::OscillationDetected {
                    motor: self.motor,
                    ku: oscillation.ku,
                    pu: oscillation.pu,
                    crossings: oscillation.crossings,
                });
                return Ok(TuningOutcome {
                    oscillation,
                    gains: ziegler_nichols(oscillation.ku, oscillation.pu),
                    trials: index + 1,
                });
            }
        }

        Err(TuningError::NoOscillation { max_kp: last_kp })
    }
}
