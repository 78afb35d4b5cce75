//! # Calibration Module
//!
//! Converts raw stick channel values into normalized deflection.
//!
//! ## Normalization
//!
//! A raw value is mapped onto `-100..=100`, where `0` is the configured
//! center and `±100` is full deflection (`center ± full_scale`). The result
//! is truncated toward zero.
//!
//! Values outside the calibrated band are treated as neutral (`0`) instead
//! of being extrapolated. A decoder that briefly loses sync can produce wild
//! channel values; a neutral stick is the safe reading of those.
//!
//! ## Usage
//!
//! ```
//! use rc_rover::controller::calibration::StickScale;
//!
//! let scale = StickScale::new(1500, 500);
//!
//! assert_eq!(scale.normalize(1500), 0);
//! assert_eq!(scale.normalize(1000), -100);
//! assert_eq!(scale.normalize(2000), 100);
//!
//! // Outside the band reads as centered
//! assert_eq!(scale.normalize(2100), 0);
//! ```

/// Largest normalized magnitude.
pub const NORMALIZED_MAX: i32 = 100;

/// Three-state reading of a normalized stick against a deadzone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deflection {
    /// Below `-deadzone`
    Negative,
    /// Within `±deadzone`
    Neutral,
    /// Above `deadzone`
    Positive,
}

/// Linear stick scale around a center value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StickScale {
    /// Raw value of a centered stick.
    center: u16,
    /// Raw distance from center to full deflection.
    full_scale: u16,
}

impl Default for StickScale {
    fn default() -> Self {
        Self {
            center: 1500,
            full_scale: 500,
        }
    }
}

impl StickScale {
    /// Creates a scale. A `full_scale` of zero is raised to one.
    #[must_use]
    pub fn new(center: u16, full_scale: u16) -> Self {
        Self {
            center,
            full_scale: full_scale.max(1),
        }
    }

    /// Returns the configured center value.
    #[must_use]
    pub fn center(&self) -> u16 {
        self.center
    }

    /// Returns the configured full-scale distance.
    #[must_use]
    pub fn full_scale(&self) -> u16 {
        self.full_scale
    }

    /// Returns true if `raw` lies within `center ± full_scale`.
    #[must_use]
    pub fn in_range(&self, raw: u16) -> bool {
        let offset = i32::from(raw) - i32::from(self.center);
        offset.abs() <= i32::from(self.full_scale)
    }

    /// Normalizes a raw value to `-100..=100`.
    ///
    /// # Arguments
    ///
    /// * `raw` - Raw channel value
    ///
    /// # Returns
    ///
    /// Normalized deflection, or `0` if `raw` is outside the calibrated band
    ///
    /// # Examples
    ///
    /// ```
    /// use rc_rover::controller::calibration::StickScale;
    ///
    /// let scale = StickScale::new(1500, 500);
    /// assert_eq!(scale.normalize(1752), 50);
    /// assert_eq!(scale.normalize(1248), -50);
    /// assert_eq!(scale.normalize(999), 0);
    /// ```
    #[must_use]
    pub fn normalize(&self, raw: u16) -> i32 {
        if !self.in_range(raw) {
            return 0;
        }

        let offset = i32::from(raw) - i32::from(self.center);
        // Integer division truncates toward zero
        (offset * NORMALIZED_MAX / i32::from(self.full_scale))
            .clamp(-NORMALIZED_MAX, NORMALIZED_MAX)
    }

    /// Classifies a raw value against a deadzone in normalized units.
    #[must_use]
    pub fn deflection(&self, raw: u16, deadzone: i32) -> Deflection {
        let value = self.normalize(raw);
        if value < -deadzone {
            Deflection::Negative
        } else if value > deadzone {
            Deflection::Positive
        } else {
            Deflection::Neutral
        }
    }
}
