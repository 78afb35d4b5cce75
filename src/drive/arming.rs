//! # Arming Sequence
//!
//! `Warmup → IdleUnarmed ⇄ Armed`.
//!
//! The first frames after the decoder starts are discarded while the
//! receiver settles. Arming then requires the throttle stick to be held
//! still and low for a run of consecutive frames while the arm switch is
//! asserted. The throttle value at that moment becomes the zero-throttle
//! baseline. Releasing the arm switch disarms; warmup never restarts.

use serde::Serialize;
use std::fmt;

use crate::config::SafetyConfig;

/// Arming state of the drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmState {
    Warmup,
    IdleUnarmed,
    Armed,
}

impl fmt::Display for ArmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArmState::Warmup => write!(f, "warmup"),
            ArmState::IdleUnarmed => write!(f, "idle-unarmed"),
            ArmState::Armed => write!(f, "armed"),
        }
    }
}

/// A change of arm state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArmTransition {
    pub from: ArmState,
    pub to: ArmState,
    /// Throttle baseline captured when arming
    pub baseline: Option<u16>,
}

/// Arming thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmingLimits {
    pub warmup_frames: u32,
    pub hold_samples: u32,
    pub band: u16,
    pub throttle_max: u16,
    pub switch_threshold: u16,
    /// Raw throttle travel above the baseline that maps to 100%
    pub throttle_span: u16,
}

impl ArmingLimits {
    /// Limits from the safety section and the receiver warmup count.
    #[must_use]
    pub fn from_config(safety: &SafetyConfig, warmup_frames: u32) -> Self {
        Self {
            warmup_frames,
            hold_samples: safety.arm_hold_samples,
            band: safety.arm_band,
            throttle_max: safety.arm_throttle_max,
            switch_threshold: safety.arm_switch_threshold,
            throttle_span: safety.throttle_span.max(1),
        }
    }
}

impl Default for ArmingLimits {
    fn default() -> Self {
        Self::from_config(&SafetyConfig::default(), 2)
    }
}

/// Arm state tracker.
#[derive(Debug, Clone)]
pub struct Arming {
    limits: ArmingLimits,
    state: ArmState,
    warmup_seen: u32,
    hold_reference: Option<u16>,
    hold_count: u32,
    baseline: Option<u16>,
}

impl Arming {
    #[must_use]
    pub fn new(limits: ArmingLimits) -> Self {
        let state = if limits.warmup_frames == 0 {
            ArmState::IdleUnarmed
        } else {
            ArmState::Warmup
        };
        Self {
            limits,
            state,
            warmup_seen: 0,
            hold_reference: None,
            hold_count: 0,
            baseline: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> ArmState {
        self.state
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.state == ArmState::Armed
    }

    /// Throttle value captured when arming, while armed.
    #[must_use]
    pub fn baseline(&self) -> Option<u16> {
        self.baseline
    }

    /// Consecutive frames the throttle has been held within the band.
    #[must_use]
    pub fn hold_count(&self) -> u32 {
        self.hold_count
    }

    /// Frames discarded so far during warmup.
    #[must_use]
    pub fn warmup_seen(&self) -> u32 {
        self.warmup_seen
    }

    /// Advances the sequence by one frame.
    ///
    /// # Arguments
    ///
    /// * `throttle` - Raw throttle channel, if present
    /// * `switch` - Raw arm switch channel, if present
    ///
    /// # Returns
    ///
    /// The transition taken on this frame, if any
    pub fn update(&mut self, throttle: Option<u16>, switch: Option<u16>) -> Option<ArmTransition> {
        match self.state {
            ArmState::Warmup => {
                self.warmup_seen += 1;
                if self.warmup_seen >= self.limits.warmup_frames {
                    return Some(self.transition(ArmState::IdleUnarmed));
                }
                None
            }
            ArmState::IdleUnarmed => {
                self.track_hold(throttle);
                let throttle = throttle?;
                if self.switch_asserted(switch)
                    && self.hold_count >= self.limits.hold_samples
                    && throttle < self.limits.throttle_max
                {
                    self.baseline = Some(throttle);
                    return Some(self.transition(ArmState::Armed));
                }
                None
            }
            ArmState::Armed => {
                if self.switch_asserted(switch) {
                    return None;
                }
                self.baseline = None;
                self.hold_reference = None;
                self.hold_count = 0;
                Some(self.transition(ArmState::IdleUnarmed))
            }
        }
    }

    /// Throttle percentage (`0..=100`) relative to the armed baseline.
    ///
    /// `None` unless armed.
    #[must_use]
    pub fn throttle_percent(&self, throttle: u16) -> Option<f32> {
        let baseline = self.baseline.filter(|_| self.is_armed())?;
        let travel = f32::from(throttle) - f32::from(baseline);
        let percent = travel * 100.0 / f32::from(self.limits.throttle_span);
        Some(percent.clamp(0.0, 100.0))
    }

    fn switch_asserted(&self, switch: Option<u16>) -> bool {
        switch.is_some_and(|raw| raw > self.limits.switch_threshold)
    }

    fn track_hold(&mut self, throttle: Option<u16>) {
        match (throttle, self.hold_reference) {
            (None, _) => {
                self.hold_reference = None;
                self.hold_count = 0;
            }
            (Some(value), Some(reference)) if value.abs_diff(reference) <= self.limits.band => {
                self.hold_count = self.hold_count.saturating_add(1);
            }
            (Some(value), _) => {
                self.hold_reference = Some(value);
                self.hold_count = 1;
            }
        }
    }

    fn transition(&mut self, to: ArmState) -> ArmTransition {
        let from = self.state;
        self.state = to;
        ArmTransition {
            from,
            to,
            baseline: self.baseline,
        }
    }
}

impl Default for Arming {
    fn default() -> Self {
        Self::new(ArmingLimits::default())
    }
}
