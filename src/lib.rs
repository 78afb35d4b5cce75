//! # RC Rover Library
//!
//! Drive a two-motor rover from an RC receiver.
//!
//! This library provides the core functionality for decoding iBUS and S-Bus
//! receiver streams, mapping the channels to a driving intent, running the
//! arm/brake/direction state machine that commands the motors, and tuning a
//! PID speed controller from pulse-rate feedback.

pub mod config;
pub mod error;
pub mod rc;
pub mod controller;
pub mod drive;
pub mod feedback;
pub mod serial;
pub mod telemetry;
pub mod runtime;
