//! # PID Controller
//!
//! `output = Kp·e + Ki·∫e·dt + Kd·de/dt`, clamped to the output bounds.
//!
//! With anti-windup enabled, the integral is frozen on any step whose
//! output would saturate in the direction the error is pushing. Without it,
//! repeated saturation during a gain sweep lets the integral run away.
//!
//! The first sample after creation or [`PidController::reset`] has no time
//! reference, so it contributes only the proportional term.

use serde::Serialize;

use crate::config::PidConfig;

/// Controller gains.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    #[must_use]
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }

    /// Proportional-only gains
    #[must_use]
    pub fn proportional(kp: f64) -> Self {
        Self { kp, ki: 0.0, kd: 0.0 }
    }
}

/// PID controller state.
#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    setpoint: f64,
    output_min: f64,
    output_max: f64,
    anti_windup: bool,
    integral: f64,
    previous_error: f64,
    previous_time: Option<f64>,
    last_output: f64,
}

impl PidController {
    /// Create a controller with the given output bounds
    ///
    /// Bounds given in the wrong order are swapped.
    #[must_use]
    pub fn new(gains: PidGains, setpoint: f64, output_min: f64, output_max: f64) -> Self {
        let (output_min, output_max) = if output_min <= output_max {
            (output_min, output_max)
        } else {
            (output_max, output_min)
        };
        Self {
            gains,
            setpoint,
            output_min,
            output_max,
            anti_windup: true,
            integral: 0.0,
            previous_error: 0.0,
            previous_time: None,
            last_output: 0.0,
        }
    }

    /// Create a controller from the `[pid]` configuration section
    #[must_use]
    pub fn from_config(config: &PidConfig) -> Self {
        Self::new(
            PidGains::new(config.kp, config.ki, config.kd),
            config.setpoint_pps.unwrap_or(0.0),
            config.output_min,
            config.output_max,
        )
        .with_anti_windup(config.anti_windup)
    }

    #[must_use]
    pub fn with_anti_windup(mut self, enabled: bool) -> Self {
        self.anti_windup = enabled;
        self
    }

    #[must_use]
    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Replace the gains and reset the accumulated state
    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
        self.reset();
    }

    #[must_use]
    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    #[must_use]
    pub fn output_limits(&self) -> (f64, f64) {
        (self.output_min, self.output_max)
    }

    #[must_use]
    pub fn integral(&self) -> f64 {
        self.integral
    }

    #[must_use]
    pub fn last_output(&self) -> f64 {
        self.last_output
    }

    /// Zero the integral, the previous error and the time reference
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = 0.0;
        self.previous_time = None;
        self.last_output = 0.0;
    }

    /// Compute the output for a measurement taken at `now_s` seconds
    ///
    /// A timestamp not after the previous one is a timing glitch: the
    /// previous output is returned and no state changes.
    pub fn update(&mut self, measurement: f64, now_s: f64) -> f64 {
        let dt = match self.previous_time {
            None => None,
            Some(previous) if now_s > previous => Some(now_s - previous),
            Some(_) => return self.last_output,
        };
        let output = self.step(self.setpoint - measurement, dt);
        self.previous_time = Some(now_s);
        output
    }

    /// Compute the output for an error over a step of `dt` seconds
    ///
    /// `dt` of `None` is a first sample: proportional term only.
    pub fn step(&mut self, error: f64, dt: Option<f64>) -> f64 {
        let proportional = self.gains.kp * error;

        let output = match dt.filter(|dt| *dt > 0.0 && dt.is_finite()) {
            None => proportional,
            Some(dt) => {
                let derivative = self.gains.kd * (error - self.previous_error) / dt;
                let candidate = self.integral + error * dt;
                let unclamped = proportional + self.gains.ki * candidate + derivative;

                let saturating = (unclamped > self.output_max && error > 0.0)
                    || (unclamped < self.output_min && error < 0.0);
                if !(self.anti_windup && saturating) {
                    self.integral = candidate;
                }
                proportional + self.gains.ki * self.integral + derivative
            }
        };

        self.previous_error = error;
        self.last_output = output.clamp(self.output_min, self.output_max);
        self.last_output
    }
}
