//! # Controller Module
//!
//! Turns decoded receiver channels into a driving intent.
//!
//! This module handles:
//! - Normalizing stick channels around center with an out-of-band guard
//! - Deriving throttle, direction, pivot and veer against a deadzone
//! - Resolving the mode channel against a table of expected values
//! - Deciding which intents are worth reporting

pub mod calibration;
pub mod channel_mapper;
pub mod intent;
