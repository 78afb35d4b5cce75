//! # Motion State Machine
//!
//! Combines the mapped intent, the raw throttle/brake/arm channels and the
//! manual override inputs into one [`DriveCommand`] per frame, and applies
//! it to the motors.
//!
//! ## Composition rules
//!
//! - Warmup frames produce the safe command and nothing else.
//! - The intent direction sets both motors; a turning bias (pivot, else
//!   veer) overrides it: bias right drives left forward and right reverse,
//!   bias left the opposite.
//! - Duty comes from the raw throttle above the armed baseline. It is zero
//!   when not armed, when idle without a bias, and whenever the brake is
//!   engaged.
//! - Manual stop buttons zero their own side; the manual brake forces the
//!   brake on both sides.
//!
//! ## Actuation
//!
//! Only fields that differ from the last applied command are written to the
//! [`Actuator`]. The first cycle, and the first cycle after
//! [`invalidate`](MotionStateMachine::invalidate), write every field.

use std::time::{Duration, Instant};
use tracing::debug;

use super::actuator::Actuator;
use super::arming::{ArmState, Arming, ArmingLimits};
use super::brake::BrakeSwitch;
use super::command::{DriveCommand, MotorCommand, MotorId};
use crate::config::{ChannelConfig, Config};
use crate::controller::intent::{Direction, Intent, Side};
use crate::rc::protocol::ChannelSet;
use crate::telemetry::{Event, EventSink};

/// Advisory surfaced while motion is requested but the drive is not armed.
pub const ARM_ADVISORY: &str =
    "Motors not armed: hold throttle low and assert the arm switch to enable throttle";

/// Manual override inputs, sampled once per cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualOverrides {
    /// Left STOP button pressed
    pub stop_left: bool,
    /// Right STOP button pressed
    pub stop_right: bool,
    /// Global BRAKE switch engaged
    pub brake: bool,
}

/// Per-side direction resolved from an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Steering {
    pub left_forward: bool,
    pub right_forward: bool,
    /// False when neither a direction nor a bias is requested
    pub moving: bool,
}

impl Steering {
    /// Resolve direction and turning bias into per-side directions.
    #[must_use]
    pub fn from_intent(intent: &Intent) -> Self {
        let (left_forward, right_forward, moving) = match intent.direction {
            Direction::Forward => (true, true, true),
            Direction::Reverse => (false, false, true),
            Direction::Idle => (true, true, false),
        };

        match intent.bias() {
            Some(Side::Right) => Self { left_forward: true, right_forward: false, moving: true },
            Some(Side::Left) => Self { left_forward: false, right_forward: true, moving: true },
            None => Self { left_forward, right_forward, moving },
        }
    }
}

/// Drive state machine.
#[derive(Debug, Clone)]
pub struct MotionStateMachine {
    arming: Arming,
    brake: BrakeSwitch,
    throttle_channel: usize,
    brake_channel: usize,
    arm_channel: usize,
    brake_flag: bool,
    advisory_interval: Duration,
    last_advisory: Option<Instant>,
    applied: [Option<MotorCommand>; 2],
    last_command: DriveCommand,
}

impl MotionStateMachine {
    /// Build from the full configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_parts(
            ArmingLimits::from_config(&config.safety, config.receiver.warmup_frames),
            BrakeSwitch::from_config(&config.safety),
            &config.channels,
            Duration::from_millis(config.safety.advisory_interval_ms),
        )
    }

    /// Build from individual parts.
    #[must_use]
    pub fn with_parts(
        limits: ArmingLimits,
        brake: BrakeSwitch,
        channels: &ChannelConfig,
        advisory_interval: Duration,
    ) -> Self {
        Self {
            arming: Arming::new(limits),
            brake,
            throttle_channel: channels.throttle,
            brake_channel: channels.brake,
            arm_channel: channels.arm,
            brake_flag: true,
            advisory_interval,
            last_advisory: None,
            applied: [None; 2],
            last_command: DriveCommand::SAFE,
        }
    }

    #[must_use]
    pub fn arm_state(&self) -> ArmState {
        self.arming.state()
    }

    #[must_use]
    pub fn arming(&self) -> &Arming {
        &self.arming
    }

    /// Effective brake flag after the last cycle
    #[must_use]
    pub fn brake_engaged(&self) -> bool {
        self.brake_flag
    }

    /// Command produced by the last cycle
    #[must_use]
    pub fn last_command(&self) -> DriveCommand {
        self.last_command
    }

    /// Run one control cycle for a decoded frame.
    ///
    /// # Arguments
    ///
    /// * `channels` - Raw channels of the frame
    /// * `intent` - Intent mapped from the same frame
    /// * `overrides` - Manual override inputs
    /// * `now` - Cycle time, used to rate-limit the arm advisory
    /// * `actuator` - Motor outputs
    /// * `sink` - Event receiver
    ///
    /// # Returns
    ///
    /// The command applied on this cycle
    pub fn step<A, S>(
        &mut self,
        channels: &ChannelSet,
        intent: &Intent,
        overrides: ManualOverrides,
        now: Instant,
        actuator: &mut A,
        sink: &mut S,
    ) -> DriveCommand
    where
        A: Actuator + ?Sized,
        S: EventSink + ?Sized,
    {
        let was_warmup = self.arming.state() == ArmState::Warmup;
        let throttle_raw = channels.get(self.throttle_channel);

        if let Some(transition) = self.arming.update(throttle_raw, channels.get(self.arm_channel)) {
            sink.emit(&Event::ArmStateChanged(transition));
        }

        if was_warmup {
            debug!("Warmup frame {} discarded", self.arming.warmup_seen());
            self.apply(DriveCommand::SAFE, actuator);
            return DriveCommand::SAFE;
        }

        self.brake.update(channels.get(self.brake_channel));
        let brake = self.brake.engaged() || overrides.brake;
        if brake != self.brake_flag {
            self.brake_flag = brake;
            sink.emit(&Event::BrakeToggled {
                engaged: brake,
                manual: overrides.brake,
            });
        }

        let armed = self.arming.is_armed();
        if !armed {
            self.advise(now, sink);
        }

        let steering = Steering::from_intent(intent);
        let duty = match throttle_raw.and_then(|raw| self.arming.throttle_percent(raw)) {
            Some(percent) if armed && steering.moving && !brake => percent / 100.0,
            _ => 0.0,
        };

        let mut command = DriveCommand {
            left: MotorCommand::new(duty, steering.left_forward, brake),
            right: MotorCommand::new(duty, steering.right_forward, brake),
        };
        if overrides.stop_left {
            command.left = command.left.stopped();
        }
        if overrides.stop_right {
            command.right = command.right.stopped();
        }

        self.apply(command, actuator);
        command
    }

    /// Write `command`, skipping fields unchanged since the last write.
    pub fn apply<A: Actuator + ?Sized>(&mut self, command: DriveCommand, actuator: &mut A) {
        for motor in MotorId::ALL {
            let next = command.get(motor);
            let previous = self.applied[motor.index()];

            if previous.map_or(true, |p| p.brake != next.brake) {
                actuator.set_brake(motor, next.brake);
            }
            if previous.map_or(true, |p| p.forward != next.forward) {
                actuator.set_direction(motor, next.forward);
            }
            if previous.map_or(true, |p| p.duty != next.duty) {
                actuator.set_duty(motor, next.duty);
            }

            self.applied[motor.index()] = Some(next);
        }
        self.last_command = command;
    }

    /// Stop both motors with brakes engaged, writing every field.
    pub fn force_safe<A: Actuator + ?Sized>(&mut self, actuator: &mut A) {
        self.invalidate();
        self.apply(DriveCommand::SAFE, actuator);
    }

    /// Forget what was last written, so the next cycle writes every field.
    ///
    /// Needed whenever something other than this state machine has driven
    /// the outputs.
    pub fn invalidate(&mut self) {
        self.applied = [None; 2];
    }

    fn advise<S: EventSink + ?Sized>(&mut self, now: Instant, sink: &mut S) {
        let due = self
            .last_advisory
            .map_or(true, |last| now.saturating_duration_since(last) >= self.advisory_interval);
        if due {
            self.last_advisory = Some(now);
            sink.emit(&Event::ArmAdvisory { message: ARM_ADVISORY });
        }
    }
}

impl Default for MotionStateMachine {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::channel_mapper::ChannelMapper;
    use crate::drive::actuator::mocks::{ActuatorCall, RecordingActuator};
    use crate::drive::actuator::MockActuator;
    use crate::rc::protocol::Protocol;
    use crate::telemetry::MemorySink;

    /// Test rig: stick values plus the machinery to run cycles
    struct Rig {
        machine: MotionStateMachine,
        mapper: ChannelMapper,
        actuator: RecordingActuator,
        sink: MemorySink,
        now: Instant,
        values: [u16; 14],
    }

    impl Rig {
        fn new() -> Self {
            let mut values = [1500u16; 14];
            values[2] = 1000; // throttle low
            values[4] = 2000; // brake released
            values[7] = 1000; // arm switch off
            Self {
                machine: MotionStateMachine::default(),
                mapper: ChannelMapper::default(),
                actuator: RecordingActuator::new(),
                sink: MemorySink::new(),
                now: Instant::now(),
                values,
            }
        }

        fn set(&mut self, channel: usize, value: u16) -> &mut Self {
            self.values[channel - 1] = value;
            self
        }

        fn cycle_with(&mut self, overrides: ManualOverrides) -> DriveCommand {
            let channels = ChannelSet::from_values(Protocol::Ibus, &self.values);
            let intent = self.mapper.map(&channels);
            self.now += Duration::from_millis(7);
            self.machine
                .step(&channels, &intent, overrides, self.now, &mut self.actuator, &mut self.sink)
        }

        fn cycle(&mut self) -> DriveCommand {
            self.cycle_with(ManualOverrides::default())
        }

        fn arm(&mut self) {
            self.set(8, 2000);
            for _ in 0..40 {
                self.cycle();
            }
            assert_eq!(self.machine.arm_state(), ArmState::Armed);
        }
    }

    #[test]
    fn test_warmup_emits_safe_command() {
        let mut rig = Rig::new();
        rig.set(3, 1900).set(2, 2000);
        assert_eq!(rig.cycle(), DriveCommand::SAFE);
        assert_eq!(rig.machine.arm_state(), ArmState::Warmup);
        assert_eq!(rig.cycle(), DriveCommand::SAFE);
        assert_eq!(rig.machine.arm_state(), ArmState::IdleUnarmed);
    }

    #[test]
    fn test_first_cycle_writes_every_field() {
        let mut rig = Rig::new();
        rig.cycle();
        let calls = rig.actuator.calls();
        assert_eq!(calls.len(), 6);
        assert!(calls.contains(&ActuatorCall::Brake(MotorId::Left, true)));
        assert!(calls.contains(&ActuatorCall::Duty(MotorId::Right, 0.0)));
    }

    #[test]
    fn test_unchanged_command_not_rewritten() {
        let mut rig = Rig::new();
        rig.cycle();
        rig.actuator.take();
        rig.cycle();
        assert!(rig.actuator.calls().is_empty());
    }

    #[test]
    fn test_arming_after_warmup_and_hold() {
        let mut rig = Rig::new();
        rig.arm();
        assert_eq!(rig.machine.arming().baseline(), Some(1000));

        let transitions: Vec<Event> = rig
            .sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, Event::ArmStateChanged(_)))
            .collect();
        assert_eq!(transitions.len(), 2);
    }

    #[test]
    fn test_forward_throttle_when_armed() {
        let mut rig = Rig::new();
        rig.arm();
        rig.set(2, 2000).set(3, 1500);
        let command = rig.cycle();
        assert_eq!(command.left, MotorCommand::new(0.5, true, false));
        assert_eq!(command.right, MotorCommand::new(0.5, true, false));
        assert_eq!(rig.actuator.last_duty(MotorId::Left), Some(0.5));
    }

    #[test]
    fn test_reverse_sets_both_directions() {
        let mut rig = Rig::new();
        rig.arm();
        rig.set(2, 1000).set(3, 1300);
        let command = rig.cycle();
        assert!(!command.left.forward);
        assert!(!command.right.forward);
        assert!((command.left.duty - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_bias_right_pivots() {
        let mut rig = Rig::new();
        rig.arm();
        rig.set(2, 2000).set(4, 2000).set(3, 1200);
        let command = rig.cycle();
        assert!(command.left.forward);
        assert!(!command.right.forward);
        assert!(command.left.duty > 0.0);
    }

    #[test]
    fn test_bias_left_from_veer_when_idle() {
        let mut rig = Rig::new();
        rig.arm();
        rig.set(1, 1000).set(3, 1200);
        let command = rig.cycle();
        assert!(!command.left.forward);
        assert!(command.right.forward);
        assert!(command.right.duty > 0.0);
    }

    #[test]
    fn test_idle_without_bias_is_zero_duty() {
        let mut rig = Rig::new();
        rig.arm();
        rig.set(3, 1800);
        let command = rig.cycle();
        assert_eq!(command.left.duty, 0.0);
        assert_eq!(command.right.duty, 0.0);
    }

    #[test]
    fn test_brake_dominates_throttle() {
        let mut rig = Rig::new();
        rig.arm();
        rig.set(2, 2000).set(3, 2000).set(5, 1000);
        let command = rig.cycle();
        assert_eq!(command.left.duty, 0.0);
        assert!(command.left.brake);
        assert!(command.right.brake);
        assert_eq!(rig.actuator.last_brake(MotorId::Right), Some(true));
    }

    #[test]
    fn test_brake_toggle_events_only_on_change() {
        let mut rig = Rig::new();
        rig.cycle();
        rig.cycle();
        // Released on the first post-warmup frame
        rig.cycle();
        rig.cycle();
        assert_eq!(rig.sink.count("brake_toggled"), 1);

        rig.set(5, 1000);
        rig.cycle();
        rig.cycle();
        assert_eq!(rig.sink.count("brake_toggled"), 2);
        assert!(rig.machine.brake_engaged());
    }

    #[test]
    fn test_manual_brake_override() {
        let mut rig = Rig::new();
        rig.arm();
        rig.set(2, 2000).set(3, 2000);
        let command = rig.cycle_with(ManualOverrides { brake: true, ..Default::default() });
        assert!(command.left.brake && command.right.brake);
        assert_eq!(command.left.duty, 0.0);

        let last = rig.sink.events().into_iter().rev().find(|e| e.name() == "brake_toggled");
        assert_eq!(last, Some(Event::BrakeToggled { engaged: true, manual: true }));
    }

    #[test]
    fn test_manual_stop_zeroes_one_side() {
        let mut rig = Rig::new();
        rig.arm();
        rig.set(2, 2000).set(3, 2000);
        let command = rig.cycle_with(ManualOverrides { stop_left: true, ..Default::default() });
        assert_eq!(command.left.duty, 0.0);
        assert_eq!(command.right.duty, 1.0);
        assert!(!command.left.brake);
    }

    #[test]
    fn test_unarmed_forces_zero_duty() {
        let mut rig = Rig::new();
        rig.set(2, 2000).set(3, 2000);
        for _ in 0..10 {
            let command = rig.cycle();
            assert_eq!(command.left.duty, 0.0);
            assert_eq!(command.right.duty, 0.0);
        }
    }

    #[test]
    fn test_advisory_rate_limited() {
        let mut rig = Rig::new();
        // 7 ms per cycle: 700 cycles span about 4.9 s
        for _ in 0..700 {
            rig.cycle();
        }
        assert_eq!(rig.sink.count("arm_advisory"), 1);

        for _ in 0..20 {
            rig.cycle();
        }
        assert_eq!(rig.sink.count("arm_advisory"), 2);
    }

    #[test]
    fn test_disarm_stops_motors() {
        let mut rig = Rig::new();
        rig.arm();
        rig.set(2, 2000).set(3, 1800);
        assert!(rig.cycle().left.duty > 0.0);

        rig.set(8, 1000);
        let command = rig.cycle();
        assert_eq!(command.left.duty, 0.0);
        assert_eq!(rig.machine.arm_state(), ArmState::IdleUnarmed);
    }

    #[test]
    fn test_only_changed_fields_written() {
        let mut rig = Rig::new();
        rig.arm();
        rig.set(2, 2000).set(3, 1500);
        rig.cycle();
        rig.actuator.take();

        rig.set(3, 1600);
        rig.cycle();
        assert_eq!(
            rig.actuator.calls(),
            vec![ActuatorCall::Duty(MotorId::Left, 0.6), ActuatorCall::Duty(MotorId::Right, 0.6)]
        );
    }

    #[test]
    fn test_invalidate_rewrites_everything() {
        let mut machine = MotionStateMachine::default();
        let mut mock = MockActuator::new();
        mock.expect_set_brake().times(4).return_const(());
        mock.expect_set_direction().times(4).return_const(());
        mock.expect_set_duty().times(4).return_const(());

        machine.apply(DriveCommand::SAFE, &mut mock);
        machine.apply(DriveCommand::SAFE, &mut mock);
        machine.invalidate();
        machine.apply(DriveCommand::SAFE, &mut mock);
    }

    #[test]
    fn test_force_safe() {
        let mut rig = Rig::new();
        rig.arm();
        rig.set(2, 2000).set(3, 2000);
        rig.cycle();

        rig.machine.force_safe(&mut rig.actuator);
        assert_eq!(rig.machine.last_command(), DriveCommand::SAFE);
        assert_eq!(rig.actuator.last_duty(MotorId::Left), Some(0.0));
        assert_eq!(rig.actuator.last_brake(MotorId::Right), Some(true));
    }

    #[test]
    fn test_steering_table() {
        let forward = Intent { direction: Direction::Forward, ..Intent::default() };
        assert_eq!(
            Steering::from_intent(&forward),
            Steering { left_forward: true, right_forward: true, moving: true }
        );

        let idle = Intent::default();
        assert!(!Steering::from_intent(&idle).moving);

        let pivot_over_veer = Intent {
            direction: Direction::Reverse,
            pivot: Some(Side::Right),
            veer: Some(Side::Left),
            ..Intent::default()
        };
        assert_eq!(
            Steering::from_intent(&pivot_over_veer),
            Steering { left_forward: true, right_forward: false, moving: true }
        );
    }
}
