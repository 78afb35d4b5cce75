//! # RC Channel Mapper Module
//!
//! Maps decoded receiver channels to a driving [`Intent`].
//!
//! ## Channel Assignments (defaults)
//!
//! | Channel | Function |
//! |---------|----------|
//! | CH1 | Veer (gentle turn) |
//! | CH2 | Direction (forward / reverse) |
//! | CH3 | Throttle |
//! | CH4 | Pivot (turn in place) |
//! | CH5 | Brake switch |
//! | CH6 | Switch B |
//! | CH7 | Mode selector |
//! | CH8 | ARM switch |
//!
//! ## Value Ranges
//!
//! - Stick channels: 1000-2000, center 1500
//! - Normalized deflection: -100..=100
//! - Mode channel: matched against a table of raw values (±20)
//!
//! ## Usage
//!
//! ```
//! use rc_rover::controller::channel_mapper::ChannelMapper;
//! use rc_rover::controller::intent::Direction;
//! use rc_rover::rc::protocol::{ChannelSet, Protocol};
//!
//! let mapper = ChannelMapper::default();
//! let channels = ChannelSet::from_values(Protocol::Ibus, &[1500; 14]);
//! let intent = mapper.map(&channels);
//!
//! assert_eq!(intent.throttle, 0);
//! assert_eq!(intent.direction, Direction::Idle);
//! assert!(!intent.brake);
//! ```

use serde::Serialize;

use super::calibration::{Deflection, StickScale};
use super::intent::{AuxChannels, Direction, Intent, Mode, Side, AUX_CHANNEL_COUNT, AUX_FIRST_CHANNEL};
use crate::config::{ChannelConfig, Config};
use crate::rc::protocol::ChannelSet;

/// Default raw value below which the brake switch reads as engaged.
pub const DEFAULT_BRAKE_THRESHOLD: u16 = 1200;

/// A stick channel whose raw value lies outside the calibrated band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeViolation {
    /// Channel role
    pub role: &'static str,
    /// 1-based channel number
    pub channel: usize,
    /// Raw value received
    pub value: u16,
}

/// Maps channel sets to intents.
#[derive(Debug, Clone)]
pub struct ChannelMapper {
    config: ChannelConfig,
    scale: StickScale,
    brake_threshold: u16,
}

impl Default for ChannelMapper {
    fn default() -> Self {
        Self::new(ChannelConfig::default())
    }
}

impl ChannelMapper {
    /// Creates a mapper for the given channel layout.
    #[must_use]
    pub fn new(config: ChannelConfig) -> Self {
        let scale = StickScale::new(config.center, config.full_scale);
        Self {
            config,
            scale,
            brake_threshold: DEFAULT_BRAKE_THRESHOLD,
        }
    }

    /// Creates a mapper from the full configuration, using the safety
    /// section's brake engage threshold.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.channels.clone()).with_brake_threshold(config.safety.brake_engage_below)
    }

    /// Sets the raw value below which the brake switch reads as engaged.
    #[must_use]
    pub fn with_brake_threshold(mut self, threshold: u16) -> Self {
        self.brake_threshold = threshold;
        self
    }

    /// Returns the channel layout.
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Normalizes a raw stick value to `-100..=100`.
    #[must_use]
    pub fn normalize(&self, raw: u16) -> i32 {
        self.scale.normalize(raw)
    }

    /// Maps one channel set to an intent.
    ///
    /// Missing stick channels read as centered; a missing brake channel reads
    /// as engaged.
    ///
    /// # Arguments
    ///
    /// * `channels` - Decoded channel values
    ///
    /// # Returns
    ///
    /// The mapped intent; auxiliary channels are included in `Dev` mode or
    /// when `verbose` is configured
    #[must_use]
    pub fn map(&self, channels: &ChannelSet) -> Intent {
        let center = self.config.center;
        let deadzone = self.config.deadzone;

        let throttle_raw = channels.get_or(self.config.throttle, center);
        let throttle = self.scale.normalize(throttle_raw).unsigned_abs().min(100) as u8;

        let pivot = side(self.scale.deflection(channels.get_or(self.config.pivot, center), deadzone));
        let veer = side(self.scale.deflection(channels.get_or(self.config.veer, center), deadzone));

        let direction = match self
            .scale
            .deflection(channels.get_or(self.config.direction, center), deadzone)
        {
            Deflection::Negative => Direction::Reverse,
            Deflection::Positive => Direction::Forward,
            Deflection::Neutral => Direction::Idle,
        };

        let brake = channels
            .get(self.config.brake)
            .map_or(true, |raw| raw < self.brake_threshold);

        let mode = self.resolve_mode(channels.get_or(self.config.mode, 0));

        let aux = (self.config.verbose || mode == Mode::Dev).then(|| aux_channels(channels));

        Intent {
            throttle,
            direction,
            pivot,
            veer,
            brake,
            switch_b: channels.get_or(self.config.switch_b, 0),
            mode,
            aux,
        }
    }

    /// Resolves the mode channel against the mode table.
    ///
    /// The nearest entry strictly within the tolerance wins; anything else is
    /// [`Mode::Stealth`].
    ///
    /// # Examples
    ///
    /// ```
    /// use rc_rover::controller::channel_mapper::ChannelMapper;
    /// use rc_rover::controller::intent::Mode;
    ///
    /// let mapper = ChannelMapper::default();
    /// assert_eq!(mapper.resolve_mode(50660), Mode::Attract);
    /// assert_eq!(mapper.resolve_mode(50140), Mode::Dev);
    /// assert_eq!(mapper.resolve_mode(1500), Mode::Stealth);
    /// ```
    #[must_use]
    pub fn resolve_mode(&self, raw: u16) -> Mode {
        let tolerance = u32::from(self.config.mode_tolerance);
        [
            (self.config.mode_attract, Mode::Attract),
            (self.config.mode_dev, Mode::Dev),
        ]
        .into_iter()
        .map(|(expected, mode)| (u32::from(raw.abs_diff(expected)), mode))
        .filter(|&(distance, _)| distance < tolerance)
        .min_by_key(|&(distance, _)| distance)
        .map_or(Mode::Stealth, |(_, mode)| mode)
    }

    /// Lists stick channels whose raw value lies outside the calibrated band.
    ///
    /// Such values are read as neutral by [`map`](Self::map); callers report
    /// them as warnings.
    #[must_use]
    pub fn range_violations(&self, channels: &ChannelSet) -> Vec<RangeViolation> {
        [
            ("veer", self.config.veer),
            ("direction", self.config.direction),
            ("throttle", self.config.throttle),
            ("pivot", self.config.pivot),
        ]
        .into_iter()
        .filter_map(|(role, channel)| {
            let value = channels.get(channel)?;
            (!self.scale.in_range(value)).then_some(RangeViolation { role, channel, value })
        })
        .collect()
    }
}

fn side(deflection: Deflection) -> Option<Side> {
    match deflection {
        Deflection::Negative => Some(Side::Left),
        Deflection::Positive => Some(Side::Right),
        Deflection::Neutral => None,
    }
}

fn aux_channels(channels: &ChannelSet) -> AuxChannels {
    let mut aux = [None; AUX_CHANNEL_COUNT];
    for (i, slot) in aux.iter_mut().enumerate() {
        *slot = channels.get(AUX_FIRST_CHANNEL + i);
    }
    aux
}

/// Decides which intents are worth reporting.
///
/// An intent is reported when it differs from the last reported one, when
/// the mode is [`Mode::Dev`], or when verbose reporting is requested.
#[derive(Debug, Default, Clone)]
pub struct IntentTracker {
    last: Option<Intent>,
}

impl IntentTracker {
    /// Creates a tracker that has reported nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `intent` should be reported, and records it if so.
    pub fn should_emit(&mut self, intent: &Intent, verbose: bool) -> bool {
        let emit = verbose || intent.mode == Mode::Dev || self.last.as_ref() != Some(intent);
        if emit {
            self.last = Some(*intent);
        }
        emit
    }

    /// Last reported intent.
    #[must_use]
    pub fn last(&self) -> Option<&Intent> {
        self.last.as_ref()
    }

    /// Forgets the last reported intent.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rc::protocol::Protocol;

    fn ibus(overrides: &[(usize, u16)]) -> ChannelSet {
        let mut values = [1500u16; 14];
        for &(channel, value) in overrides {
            values[channel - 1] = value;
        }
        ChannelSet::from_values(Protocol::Ibus, &values)
    }

    #[test]
    fn test_centered_sticks() {
        let intent = ChannelMapper::default().map(&ibus(&[]));
        assert_eq!(intent.throttle, 0);
        assert_eq!(intent.direction, Direction::Idle);
        assert_eq!(intent.pivot, None);
        assert_eq!(intent.veer, None);
        assert!(!intent.brake);
        assert_eq!(intent.switch_b, 1500);
        assert_eq!(intent.mode, Mode::Stealth);
        assert!(intent.aux.is_none());
    }

    #[test]
    fn test_throttle_is_magnitude() {
        let mapper = ChannelMapper::default();
        assert_eq!(mapper.map(&ibus(&[(3, 2000)])).throttle, 100);
        assert_eq!(mapper.map(&ibus(&[(3, 1000)])).throttle, 100);
        assert_eq!(mapper.map(&ibus(&[(3, 1750)])).throttle, 50);
    }

    #[test]
    fn test_throttle_out_of_band_is_zero() {
        let intent = ChannelMapper::default().map(&ibus(&[(3, 2400)]));
        assert_eq!(intent.throttle, 0);
    }

    #[test]
    fn test_direction() {
        let mapper = ChannelMapper::default();
        assert_eq!(mapper.map(&ibus(&[(2, 1900)])).direction, Direction::Forward);
        assert_eq!(mapper.map(&ibus(&[(2, 1100)])).direction, Direction::Reverse);
        assert_eq!(mapper.map(&ibus(&[(2, 1700)])).direction, Direction::Idle);
    }

    #[test]
    fn test_pivot_and_veer() {
        let mapper = ChannelMapper::default();
        let intent = mapper.map(&ibus(&[(4, 1100), (1, 1900)]));
        assert_eq!(intent.pivot, Some(Side::Left));
        assert_eq!(intent.veer, Some(Side::Right));
    }

    #[test]
    fn test_brake_below_threshold() {
        let mapper = ChannelMapper::default();
        assert!(mapper.map(&ibus(&[(5, 1000)])).brake);
        assert!(!mapper.map(&ibus(&[(5, 1200)])).brake);
        assert!(!mapper.map(&ibus(&[(5, 2000)])).brake);
    }

    #[test]
    fn test_custom_brake_threshold() {
        let mapper = ChannelMapper::default().with_brake_threshold(1600);
        assert!(mapper.map(&ibus(&[(5, 1500)])).brake);
    }

    #[test]
    fn test_missing_brake_channel_reads_engaged() {
        let set = ChannelSet::from_values(Protocol::Ibus, &[1500; 4]);
        let intent = ChannelMapper::default().map(&set);
        assert!(intent.brake);
        assert_eq!(intent.throttle, 0);
    }

    #[test]
    fn test_mode_table() {
        let mapper = ChannelMapper::default();
        assert_eq!(mapper.resolve_mode(50652), Mode::Attract);
        assert_eq!(mapper.resolve_mode(50671), Mode::Attract);
        assert_eq!(mapper.resolve_mode(50633), Mode::Attract);
        assert_eq!(mapper.resolve_mode(50140), Mode::Dev);
        assert_eq!(mapper.resolve_mode(50121), Mode::Dev);
    }

    #[test]
    fn test_mode_tolerance_is_strict() {
        let mapper = ChannelMapper::default();
        assert_eq!(mapper.resolve_mode(50672), Mode::Stealth);
        assert_eq!(mapper.resolve_mode(50120), Mode::Stealth);
        assert_eq!(mapper.resolve_mode(0), Mode::Stealth);
    }

    #[test]
    fn test_dev_mode_includes_aux() {
        let intent = ChannelMapper::default().map(&ibus(&[(7, 50140), (9, 1234)]));
        assert_eq!(intent.mode, Mode::Dev);
        let aux = intent.aux.unwrap();
        assert_eq!(aux[0], Some(1500));
        assert_eq!(aux[1], Some(1234));
        // iBUS carries 14 channels; CH15 and CH16 are absent
        assert_eq!(aux[7], None);
        assert_eq!(aux[8], None);
    }

    #[test]
    fn test_verbose_includes_aux() {
        let config = ChannelConfig { verbose: true, ..ChannelConfig::default() };
        let intent = ChannelMapper::new(config).map(&ibus(&[]));
        assert_eq!(intent.mode, Mode::Stealth);
        assert!(intent.aux.is_some());
    }

    #[test]
    fn test_custom_channel_roles() {
        let config = ChannelConfig { throttle: 1, veer: 3, ..ChannelConfig::default() };
        let intent = ChannelMapper::new(config).map(&ibus(&[(1, 2000), (3, 1000)]));
        assert_eq!(intent.throttle, 100);
        assert_eq!(intent.veer, Some(Side::Left));
    }

    #[test]
    fn test_range_violations() {
        let mapper = ChannelMapper::default();
        assert!(mapper.range_violations(&ibus(&[])).is_empty());

        let violations = mapper.range_violations(&ibus(&[(3, 2600), (1, 900)]));
        assert_eq!(violations.len(), 2);
        assert!(violations.contains(&RangeViolation { role: "veer", channel: 1, value: 900 }));
        assert!(violations.contains(&RangeViolation { role: "throttle", channel: 3, value: 2600 }));
    }

    #[test]
    fn test_range_violations_ignore_switches() {
        let mapper = ChannelMapper::default();
        assert!(mapper.range_violations(&ibus(&[(7, 50652), (5, 0)])).is_empty());
    }

    #[test]
    fn test_from_config_uses_safety_threshold() {
        let mut config = Config::default();
        config.safety.brake_engage_below = 1400;
        let mapper = ChannelMapper::from_config(&config);
        assert!(mapper.map(&ibus(&[(5, 1300)])).brake);
    }

    #[test]
    fn test_tracker_emits_on_change_only() {
        let mapper = ChannelMapper::default();
        let mut tracker = IntentTracker::new();

        let idle = mapper.map(&ibus(&[]));
        assert!(tracker.should_emit(&idle, false));
        assert!(!tracker.should_emit(&idle, false));

        let forward = mapper.map(&ibus(&[(2, 1900)]));
        assert!(tracker.should_emit(&forward, false));
        assert!(!tracker.should_emit(&forward, false));
        assert_eq!(tracker.last(), Some(&forward));
    }

    #[test]
    fn test_tracker_verbose_always_emits() {
        let intent = Intent::default();
        let mut tracker = IntentTracker::new();
        assert!(tracker.should_emit(&intent, true));
        assert!(tracker.should_emit(&intent, true));
    }

    #[test]
    fn test_tracker_dev_mode_always_emits() {
        let intent = ChannelMapper::default().map(&ibus(&[(7, 50140)]));
        let mut tracker = IntentTracker::new();
        assert!(tracker.should_emit(&intent, false));
        assert!(tracker.should_emit(&intent, false));
    }

    #[test]
    fn test_tracker_reset() {
        let intent = Intent::default();
        let mut tracker = IntentTracker::new();
        assert!(tracker.should_emit(&intent, false));
        tracker.reset();
        assert!(tracker.should_emit(&intent, false));
    }
}
