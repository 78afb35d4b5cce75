//! Brake switch with hysteresis.
//!
//! The brake engages when the raw channel drops below the engage threshold
//! and releases only once it rises above the release threshold; values in
//! between hold the current state. The channel is only evaluated when its
//! raw value changes, so a steady switch never produces repeated actuation.

use crate::config::SafetyConfig;

/// Hysteresis brake flag driven by one raw channel.
#[derive(Debug, Clone)]
pub struct BrakeSwitch {
    engage_below: u16,
    release_above: u16,
    last_raw: Option<Option<u16>>,
    engaged: bool,
}

impl BrakeSwitch {
    /// Creates a switch that starts engaged.
    ///
    /// `release_above` below `engage_below` is raised to it, giving a single
    /// threshold.
    #[must_use]
    pub fn new(engage_below: u16, release_above: u16) -> Self {
        Self {
            engage_below,
            release_above: release_above.max(engage_below),
            last_raw: None,
            engaged: true,
        }
    }

    #[must_use]
    pub fn from_config(safety: &SafetyConfig) -> Self {
        Self::new(safety.brake_engage_below, safety.brake_release_above)
    }

    /// Current brake flag.
    #[must_use]
    pub fn engaged(&self) -> bool {
        self.engaged
    }

    /// Feeds one raw channel reading.
    ///
    /// A missing channel reads as engaged.
    ///
    /// # Returns
    ///
    /// `Some(engaged)` when the flag changed, `None` otherwise
    pub fn update(&mut self, raw: Option<u16>) -> Option<bool> {
        if self.last_raw == Some(raw) {
            return None;
        }
        self.last_raw = Some(raw);

        let next = match raw {
            None => true,
            Some(value) if value < self.engage_below => true,
            Some(value) if value > self.release_above => false,
            Some(_) => self.engaged,
        };

        if next == self.engaged {
            return None;
        }
        self.engaged = next;
        Some(next)
    }
}

impl Default for BrakeSwitch {
    fn default() -> Self {
        Self::from_config(&SafetyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_engaged() {
        assert!(BrakeSwitch::default().engaged());
    }

    #[test]
    fn test_release_and_engage() {
        let mut brake = BrakeSwitch::new(1200, 1300);
        assert_eq!(brake.update(Some(1500)), Some(false));
        assert!(!brake.engaged());
        assert_eq!(brake.update(Some(1000)), Some(true));
        assert!(brake.engaged());
    }

    #[test]
    fn test_hysteresis_band_holds() {
        let mut brake = BrakeSwitch::new(1200, 1300);
        brake.update(Some(1500));
        assert_eq!(brake.update(Some(1250)), None);
        assert!(!brake.engaged());

        brake.update(Some(1100));
        assert_eq!(brake.update(Some(1250)), None);
        assert!(brake.engaged());
        assert_eq!(brake.update(Some(1300)), None);
        assert_eq!(brake.update(Some(1301)), Some(false));
    }

    #[test]
    fn test_unchanged_value_not_reevaluated() {
        let mut brake = BrakeSwitch::new(1200, 1300);
        assert_eq!(brake.update(Some(1000)), None);
        assert_eq!(brake.update(Some(1000)), None);
        assert_eq!(brake.update(Some(1900)), Some(false));
        assert_eq!(brake.update(Some(1900)), None);
    }

    #[test]
    fn test_change_within_same_side_is_silent() {
        let mut brake = BrakeSwitch::new(1200, 1300);
        brake.update(Some(1900));
        assert_eq!(brake.update(Some(1950)), None);
        assert_eq!(brake.update(Some(2000)), None);
    }

    #[test]
    fn test_missing_channel_engages() {
        let mut brake = BrakeSwitch::new(1200, 1300);
        brake.update(Some(2000));
        assert_eq!(brake.update(None), Some(true));
        assert_eq!(brake.update(None), None);
    }

    #[test]
    fn test_single_threshold() {
        let mut brake = BrakeSwitch::new(1200, 1000);
        assert_eq!(brake.update(Some(1200)), None);
        assert_eq!(brake.update(Some(1201)), Some(false));
        assert_eq!(brake.update(Some(1199)), Some(true));
    }
}
