//! Events emitted by the control core.

use serde::Serialize;

use crate::controller::channel_mapper::RangeViolation;
use crate::controller::intent::Intent;
use crate::drive::arming::ArmTransition;
use crate::drive::command::MotorId;
use crate::feedback::pid::PidGains;

/// A structured control event.
///
/// Serialized with an `event` tag, e.g.
/// `{"event":"brake_toggled","engaged":true,"manual":false}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A new intent worth reporting
    IntentChanged { intent: Intent },

    /// A stick channel outside its calibrated band, read as neutral
    RangeWarning(RangeViolation),

    /// The effective brake flag changed
    BrakeToggled { engaged: bool, manual: bool },

    /// Arm state transition
    ArmStateChanged(ArmTransition),

    /// Motion requested while not armed (rate limited)
    ArmAdvisory { message: &'static str },

    /// Open-loop scan or closed-loop rate reading
    RateSample {
        motor: MotorId,
        duty: f64,
        pps: f64,
        rpm: f64,
    },

    /// A tuning trial started
    TrialStarted { motor: MotorId, kp: f64 },

    /// A tuning trial finished
    TrialCompleted {
        motor: MotorId,
        kp: f64,
        samples: usize,
        crossings: usize,
    },

    /// Sustained oscillation found
    OscillationDetected {
        motor: MotorId,
        ku: f64,
        pu: f64,
        crossings: usize,
    },

    /// Tuning finished with new gains
    TuningResult {
        motor: MotorId,
        ku: f64,
        pu: f64,
        gains: PidGains,
    },

    /// Tuning ended without new gains
    TuningFailed { motor: MotorId, reason: String },
}

impl Event {
    /// Snake-case event name, as used for the serialized tag.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Event::IntentChanged { .. } => "intent_changed",
            Event::RangeWarning(_) => "range_warning",
            Event::BrakeToggled { .. } => "brake_toggled",
            Event::ArmStateChanged(_) => "arm_state_changed",
            Event::ArmAdvisory { .. } => "arm_advisory",
            Event::RateSample { .. } => "rate_sample",
            Event::TrialStarted { .. } => "trial_started",
            Event::TrialCompleted { .. } => "trial_completed",
            Event::OscillationDetected { .. } => "oscillation_detected",
            Event::TuningResult { .. } => "tuning_result",
            Event::TuningFailed { .. } => "tuning_failed",
        }
    }

    /// True for events that deserve a warning-level log line.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::RangeWarning(_) | Event::ArmAdvisory { .. } | Event::TuningFailed { .. }
        )
    }
}
