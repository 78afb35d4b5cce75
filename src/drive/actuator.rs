//! Trait abstraction for motor outputs to enable testing

use tracing::debug;

use super::command::{MotorCommand, MotorId};
use crate::config::MotorsConfig;

/// Full-scale PWM compare value of a 16-bit duty cycle
pub const PWM_FULL_SCALE: u32 = 65535;

/// Motor output operations
///
/// Side-effecting and infallible; the drive state machine is the sole writer
/// during normal operation.
#[cfg_attr(test, mockall::automock)]
pub trait Actuator: Send {
    /// Set the PWM duty cycle (`0.0..=1.0`)
    fn set_duty(&mut self, motor: MotorId, fraction: f32);

    /// Set the rotation direction
    fn set_direction(&mut self, motor: MotorId, forward: bool);

    /// Engage or release the brake
    fn set_brake(&mut self, motor: MotorId, engaged: bool);
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn set_duty(&mut self, motor: MotorId, fraction: f32) {
        (**self).set_duty(motor, fraction);
    }

    fn set_direction(&mut self, motor: MotorId, forward: bool) {
        (**self).set_direction(motor, forward);
    }

    fn set_brake(&mut self, motor: MotorId, engaged: bool) {
        (**self).set_brake(motor, engaged);
    }
}

/// Write every field of `command` to `motor`.
///
/// The brake is written first so that engaging it never races a duty write.
pub fn apply_command<A: Actuator + ?Sized>(actuator: &mut A, motor: MotorId, command: MotorCommand) {
    actuator.set_brake(motor, command.brake);
    actuator.set_direction(motor, command.forward);
    actuator.set_duty(motor, command.duty);
}

/// Stop `motor` and engage its brake.
pub fn apply_safe<A: Actuator + ?Sized>(actuator: &mut A, motor: MotorId) {
    actuator.set_duty(motor, 0.0);
    actuator.set_brake(motor, true);
}

/// Convert a duty fraction to a 16-bit PWM compare value
#[must_use]
pub fn duty_to_pwm(fraction: f32) -> u16 {
    let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
    (fraction * PWM_FULL_SCALE as f32).round() as u16
}

/// Actuator that logs every write and remembers the resulting output state.
///
/// Used where no motor driver is attached; pin levels are reported the way a
/// DIR/BRAKE/PWM driver board would see them.
#[derive(Debug, Clone)]
pub struct TracingActuator {
    forward_high: [bool; 2],
    state: [MotorCommand; 2],
}

impl TracingActuator {
    /// Create an actuator with both motors in the safe state
    #[must_use]
    pub fn new(motors: &MotorsConfig) -> Self {
        Self {
            forward_high: [motors.left.forward_high, motors.right.forward_high],
            state: [MotorCommand::SAFE; 2],
        }
    }

    /// Last written output state of `motor`
    #[must_use]
    pub fn state(&self, motor: MotorId) -> MotorCommand {
        self.state[motor.index()]
    }

    /// DIR pin level for the current direction of `motor`
    #[must_use]
    pub fn dir_level(&self, motor: MotorId) -> bool {
        let idx = motor.index();
        self.state[idx].forward == self.forward_high[idx]
    }
}

impl Default for TracingActuator {
    fn default() -> Self {
        Self::new(&MotorsConfig::default())
    }
}

impl Actuator for TracingActuator {
    fn set_duty(&mut self, motor: MotorId, fraction: f32) {
        let state = &mut self.state[motor.index()];
        state.duty = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        debug!(
            "{} PWM duty {:.1}% ({}/{})",
            motor,
            state.duty * 100.0,
            duty_to_pwm(state.duty),
            PWM_FULL_SCALE
        );
    }

    fn set_direction(&mut self, motor: MotorId, forward: bool) {
        self.state[motor.index()].forward = forward;
        debug!(
            "{} DIR {} (pin {})",
            motor,
            if forward { "forward" } else { "reverse" },
            if self.dir_level(motor) { "HIGH" } else { "LOW" }
        );
    }

    fn set_brake(&mut self, motor: MotorId, engaged: bool) {
        self.state[motor.index()].brake = engaged;
        debug!("{} BRAKE {}", motor, if engaged { "engaged" } else { "released" });
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::{ActuatorCall, RecordingActuator};
    use super::*;
    use crate::config::MotorConfig;
    use mockall::predicate::eq;

    #[test]
    fn test_duty_to_pwm() {
        assert_eq!(duty_to_pwm(0.0), 0);
        assert_eq!(duty_to_pwm(1.0), 65535);
        assert_eq!(duty_to_pwm(0.5), 32768);
        assert_eq!(duty_to_pwm(2.0), 65535);
        assert_eq!(duty_to_pwm(f32::NAN), 0);
    }

    #[test]
    fn test_apply_command_writes_all_fields() {
        let mut mock = MockActuator::new();
        mock.expect_set_brake().with(eq(MotorId::Left), eq(false)).times(1).return_const(());
        mock.expect_set_direction().with(eq(MotorId::Left), eq(true)).times(1).return_const(());
        mock.expect_set_duty().with(eq(MotorId::Left), eq(0.5f32)).times(1).return_const(());

        apply_command(&mut mock, MotorId::Left, MotorCommand::new(0.5, true, false));
    }

    #[test]
    fn test_apply_safe() {
        let mut recorder = RecordingActuator::new();
        apply_safe(&mut recorder, MotorId::Right);
        assert_eq!(
            recorder.calls(),
            vec![ActuatorCall::Duty(MotorId::Right, 0.0), ActuatorCall::Brake(MotorId::Right, true)]
        );
    }

    #[test]
    fn test_boxed_actuator_delegates() {
        let recorder = RecordingActuator::new();
        let mut boxed: Box<dyn Actuator> = Box::new(recorder.clone());
        boxed.set_brake(MotorId::Left, false);
        assert_eq!(recorder.last_brake(MotorId::Left), Some(false));
    }

    #[test]
    fn test_tracing_actuator_tracks_state() {
        let mut actuator = TracingActuator::default();
        assert_eq!(actuator.state(MotorId::Left), MotorCommand::SAFE);

        actuator.set_brake(MotorId::Left, false);
        actuator.set_direction(MotorId::Left, false);
        actuator.set_duty(MotorId::Left, 0.75);

        let state = actuator.state(MotorId::Left);
        assert!(!state.brake);
        assert!(!state.forward);
        assert_eq!(state.duty, 0.75);
        assert_eq!(actuator.state(MotorId::Right), MotorCommand::SAFE);
    }

    #[test]
    fn test_tracing_actuator_clamps_duty() {
        let mut actuator = TracingActuator::default();
        actuator.set_duty(MotorId::Right, 3.0);
        assert_eq!(actuator.state(MotorId::Right).duty, 1.0);
    }

    #[test]
    fn test_dir_level_respects_polarity() {
        let motors = MotorsConfig {
            left: MotorConfig { forward_high: true, ..MotorConfig::default() },
            right: MotorConfig { forward_high: false, ..MotorConfig::default() },
        };
        let mut actuator = TracingActuator::new(&motors);
        actuator.set_direction(MotorId::Left, true);
        actuator.set_direction(MotorId::Right, true);
        assert!(actuator.dir_level(MotorId::Left));
        assert!(!actuator.dir_level(MotorId::Right));
    }
}
