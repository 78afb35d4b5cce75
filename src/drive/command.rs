//! Per-motor command types.

use serde::Serialize;
use std::fmt;

/// One of the two drive motors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorId {
    Left,
    Right,
}

impl MotorId {
    /// Both motors, left first.
    pub const ALL: [MotorId; 2] = [MotorId::Left, MotorId::Right];

    /// Index into per-motor arrays.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            MotorId::Left => 0,
            MotorId::Right => 1,
        }
    }
}

impl fmt::Display for MotorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorId::Left => write!(f, "left"),
            MotorId::Right => write!(f, "right"),
        }
    }
}

/// Speed, direction and brake for one motor.
///
/// `duty` is always within `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotorCommand {
    pub duty: f32,
    pub forward: bool,
    pub brake: bool,
}

impl MotorCommand {
    /// Zero duty with the brake engaged.
    pub const SAFE: MotorCommand = MotorCommand {
        duty: 0.0,
        forward: true,
        brake: true,
    };

    /// Creates a command, clamping `duty` into `0.0..=1.0` (NaN reads as 0).
    #[must_use]
    pub fn new(duty: f32, forward: bool, brake: bool) -> Self {
        let duty = if duty.is_nan() { 0.0 } else { duty.clamp(0.0, 1.0) };
        Self { duty, forward, brake }
    }

    /// Same command with zero duty.
    #[must_use]
    pub fn stopped(self) -> Self {
        Self { duty: 0.0, ..self }
    }
}

impl Default for MotorCommand {
    fn default() -> Self {
        Self::SAFE
    }
}

/// Commands for both motors of one control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DriveCommand {
    pub left: MotorCommand,
    pub right: MotorCommand,
}

impl DriveCommand {
    /// Both motors stopped with brakes engaged.
    pub const SAFE: DriveCommand = DriveCommand {
        left: MotorCommand::SAFE,
        right: MotorCommand::SAFE,
    };

    /// Command for `motor`.
    #[must_use]
    pub fn get(&self, motor: MotorId) -> MotorCommand {
        match motor {
            MotorId::Left => self.left,
            MotorId::Right => self.right,
        }
    }

    /// Mutable command for `motor`.
    pub fn get_mut(&mut self, motor: MotorId) -> &mut MotorCommand {
        match motor {
            MotorId::Left => &mut self.left,
            MotorId::Right => &mut self.right,
        }
    }
}
