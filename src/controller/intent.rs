//! # Intent Types
//!
//! The driver's intent as read from the sticks and switches of one frame.

use serde::Serialize;
use std::fmt;

/// First auxiliary channel reported in verbose mapping.
pub const AUX_FIRST_CHANNEL: usize = 8;

/// Number of auxiliary channels (CH8..=CH16).
pub const AUX_CHANNEL_COUNT: usize = 9;

/// Auxiliary channel values, `None` where the protocol has no such channel.
pub type AuxChannels = [Option<u16>; AUX_CHANNEL_COUNT];

/// Base travel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
    Idle,
}

/// Side of a pivot or veer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// Operating mode selected by the mode channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Attract,
    /// Most verbose mode: every intent is reported, with auxiliary channels
    Dev,
    /// Default when the mode channel matches nothing
    Stealth,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
            Direction::Idle => write!(f, "idle"),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Attract => write!(f, "attract"),
            Mode::Dev => write!(f, "dev"),
            Mode::Stealth => write!(f, "stealth"),
        }
    }
}

/// Mapped intent of one frame.
///
/// Compared by value to decide whether it is worth reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Intent {
    /// Throttle magnitude, `0..=100`
    pub throttle: u8,
    pub direction: Direction,
    pub pivot: Option<Side>,
    pub veer: Option<Side>,
    /// True when the brake channel reads below the engage threshold.
    ///
    /// This is the raw request of this frame. The drive state machine adds
    /// release hysteresis on top, so between the engage and release
    /// thresholds the motors can stay braked while this reads false.
    pub brake: bool,
    /// Raw value of switch B
    pub switch_b: u16,
    pub mode: Mode,
    /// CH8..=CH16, present only in verbose mapping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aux: Option<AuxChannels>,
}

impl Intent {
    /// Turning bias: pivot when present, else veer.
    #[must_use]
    pub fn bias(&self) -> Option<Side> {
        self.pivot.or(self.veer)
    }
}

impl Default for Intent {
    fn default() -> Self {
        Self {
            throttle: 0,
            direction: Direction::Idle,
            pivot: None,
            veer: None,
            brake: true,
            switch_b: 0,
            mode: Mode::Stealth,
            aux: None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "direction={} throttle={} veer={} pivot={} brake={} mode={} swb={}",
            self.direction,
            self.throttle,
            self.veer.map_or("none".to_string(), |s| s.to_string()),
            self.pivot.map_or("none".to_string(), |s| s.to_string()),
            self.brake,
            self.mode,
            self.switch_b
        )
    }
}
