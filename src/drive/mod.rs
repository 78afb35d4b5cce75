//! # Drive Module
//!
//! Two-motor differential drive: arming, brake, direction and throttle
//! composition, and change-only actuation.

pub mod actuator;
pub mod arming;
pub mod brake;
pub mod command;
pub mod state_machine;

pub use actuator::{Actuator, TracingActuator};
pub use arming::ArmState;
pub use command::{DriveCommand, MotorCommand, MotorId};
pub use state_machine::{ManualOverrides, MotionStateMachine};
