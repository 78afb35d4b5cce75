//! Closed-loop tuning trials and open-loop pulse scans on real outputs.
//!
//! Both drive a single motor through the [`MotorOutput`] of a
//! [`TuningLease`], read its speed through a [`PulseCounter`], and pace
//! themselves with a [`Clock`]. The motor is left stopped with its brake
//! engaged whenever a trial or scan ends, including on cancellation.

use std::time::Duration;
use tracing::{debug, info};

use super::autotune::{AutoTuner, CancelToken, ErrorSample, SweepConfig, TrialRunner, TuningOutcome};
use super::clock::Clock;
use super::pid::{PidController, PidGains};
use super::pulse_rate::{rate_to_rpm, EdgeCounter, PulseCounter, ScanStats};
use crate::config::Config;
use crate::error::TuningError;
use crate::runtime::{MotorOutput, TuningLease};
use crate::telemetry::{Event, EventSink};

/// Timing and limits of closed-loop trials
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialSettings {
    /// Target pulse rate
    pub setpoint_pps: f64,
    pub sample_interval: Duration,
    /// Pause after each trial for the motor to spin down
    pub settle: Duration,
    /// PID output bounds, in duty percent
    pub output_min: f64,
    pub output_max: f64,
    pub forward: bool,
}

impl TrialSettings {
    /// Settings from the `[pid]` and `[tuning]` sections
    ///
    /// # Errors
    ///
    /// Returns [`TuningError::MissingSetpoint`] if no setpoint is configured
    pub fn from_config(config: &Config) -> Result<Self, TuningError> {
        let setpoint_pps = config.pid.setpoint_pps.ok_or(TuningError::MissingSetpoint)?;
        Ok(Self {
            setpoint_pps,
            sample_interval: Duration::from_millis(config.pid.sample_interval_ms),
            settle: Duration::from_millis(config.tuning.settle_ms),
            output_min: config.pid.output_min,
            output_max: config.pid.output_max,
            forward: true,
        })
    }
}

/// [`TrialRunner`] driving a real motor with a P-only controller.
pub struct ClosedLoopTrial<'a, K, C> {
    output: MotorOutput<'a>,
    counter: &'a mut PulseCounter<K>,
    clock: &'a mut C,
    settings: TrialSettings,
}

impl<'a, K: EdgeCounter, C: Clock> ClosedLoopTrial<'a, K, C> {
    pub fn new(
        output: MotorOutput<'a>,
        counter: &'a mut PulseCounter<K>,
        clock: &'a mut C,
        settings: TrialSettings,
    ) -> Self {
        Self {
            output,
            counter,
            clock,
            settings,
        }
    }
}

impl<K: EdgeCounter, C: Clock> TrialRunner for ClosedLoopTrial<'_, K, C> {
    fn run_trial(
        &mut self,
        kp: f64,
        duration: Duration,
        cancel: &CancelToken,
    ) -> Result<Vec<ErrorSample>, TuningError> {
        let settings = self.settings;
        let mut pid = PidController::new(
            PidGains::proportional(kp),
            settings.setpoint_pps,
            settings.output_min,
            settings.output_max,
        );

        self.output.set_duty(0.0);
        self.output.set_direction(settings.forward);
        self.output.release_brake();

        self.counter.reset();
        let start = self.clock.now();
        self.counter.sample(start);

        let mut samples = Vec::new();
        loop {
            if cancel.is_cancelled() {
                self.output.make_safe();
                debug!("Trial at Kp={} cancelled after {} samples", kp, samples.len());
                return Err(TuningError::Cancelled);
            }

            self.clock.sleep(settings.sample_interval);
            let now = self.clock.now();
            let elapsed = now.saturating_sub(start);
            if elapsed > duration {
                break;
            }

            let rate = self.counter.sample(now);
            let t = elapsed.as_secs_f64();
            let percent = pid.update(rate, t);
            self.output.set_duty((percent / 100.0) as f32);
            samples.push(ErrorSample::new(t, settings.setpoint_pps - rate));
        }

        self.output.make_safe();
        if !settings.settle.is_zero() {
            self.clock.sleep(settings.settle);
        }
        Ok(samples)
    }
}

/// Run a full Kp sweep on the leased motor
///
/// # Errors
///
/// See [`AutoTuner::run`]
pub fn tune_motor<K, C>(
    lease: &mut TuningLease<'_>,
    sweep: SweepConfig,
    settings: TrialSettings,
    counter: &mut PulseCounter<K>,
    clock: &mut C,
    cancel: &CancelToken,
) -> Result<TuningOutcome, TuningError>
where
    K: EdgeCounter,
    C: Clock,
{
    let tuner = AutoTuner::new(sweep, lease.motor());
    info!(
        "Tuning {} motor: {} trials max, setpoint {} pps",
        lease.motor(),
        sweep.kp_values().len(),
        settings.setpoint_pps
    );
    let (output, sink) = lease.split();
    let mut trial = ClosedLoopTrial::new(output, counter, clock, settings);
    tuner.run(&mut trial, cancel, sink)
}

/// Open-loop scan parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSettings {
    /// Fixed duty fraction
    pub duty: f32,
    pub duration: Duration,
    pub sample_interval: Duration,
    pub pulses_per_revolution: u32,
    pub forward: bool,
}

/// Drive the leased motor at a fixed duty and summarize its pulse rate
///
/// Every sample is reported as a [`Event::RateSample`].
///
/// # Returns
///
/// `None` if the scan was too short to take a sample
///
/// # Errors
///
/// Returns [`TuningError::Cancelled`] if `cancel` fires
pub fn pulse_scan<K, C>(
    lease: &mut TuningLease<'_>,
    settings: ScanSettings,
    counter: &mut PulseCounter<K>,
    clock: &mut C,
    cancel: &CancelToken,
) -> Result<Option<ScanStats>, TuningError>
where
    K: EdgeCounter,
    C: Clock,
{
    let motor = lease.motor();
    let (mut output, sink) = lease.split();

    output.set_direction(settings.forward);
    output.release_brake();
    output.set_duty(settings.duty);

    counter.reset();
    let start = clock.now();
    counter.sample(start);

    let mut rates = Vec::new();
    loop {
        if cancel.is_cancelled() {
            output.make_safe();
            return Err(TuningError::Cancelled);
        }
        clock.sleep(settings.sample_interval);
        let now = clock.now();
        if now.saturating_sub(start) > settings.duration {
            break;
        }

        let pps = counter.sample(now);
        sink.emit(&Event::RateSample {
            motor,
            duty: f64::from(settings.duty),
            pps,
            rpm: rate_to_rpm(pps, settings.pulses_per_revolution),
        });
        rates.push(pps);
    }
    output.make_safe();

    Ok(ScanStats::from_rates(&rates, settings.pulses_per_revolution))
}
