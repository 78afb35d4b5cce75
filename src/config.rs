//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so an empty file (or [`Config::default`]) is a
//! valid configuration. Validation happens once, when the configuration is
//! loaded; the control core never checks for missing keys at runtime.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Result, RoverError};
use crate::rc::protocol::Protocol;

/// Largest number of gains a single sweep may try
pub const MAX_SWEEP_TRIALS: usize = 1000;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub receiver: ReceiverConfig,
    #[serde(default)]
    pub channels: ChannelConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub pid: PidConfig,
    #[serde(default)]
    pub tuning: TuningConfig,
    #[serde(default)]
    pub motors: MotorsConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    /// Baud rate; `None` picks the protocol's standard rate
    #[serde(default)]
    pub baud_rate: Option<u32>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Receiver framing configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ReceiverConfig {
    #[serde(default = "default_protocol")]
    pub protocol: Protocol,

    #[serde(default = "default_buffer_cap")]
    pub buffer_cap: usize,

    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: u32,
}

/// Channel roles and scaling
///
/// Channel numbers are 1-based, as labelled on the transmitter.
#[derive(Debug, Deserialize, Clone)]
pub struct ChannelConfig {
    #[serde(default = "default_center")]
    pub center: u16,

    /// Direction threshold, in normalized units (-100..=100)
    #[serde(default = "default_deadzone")]
    pub deadzone: i32,

    /// Raw distance from center to full deflection
    #[serde(default = "default_full_scale")]
    pub full_scale: u16,

    #[serde(default = "default_veer_channel")]
    pub veer: usize,

    #[serde(default = "default_direction_channel")]
    pub direction: usize,

    #[serde(default = "default_throttle_channel")]
    pub throttle: usize,

    #[serde(default = "default_pivot_channel")]
    pub pivot: usize,

    #[serde(default = "default_brake_channel")]
    pub brake: usize,

    #[serde(default = "default_switch_b_channel")]
    pub switch_b: usize,

    #[serde(default = "default_mode_channel")]
    pub mode: usize,

    #[serde(default = "default_arm_channel")]
    pub arm: usize,

    #[serde(default = "default_mode_attract")]
    pub mode_attract: u16,

    #[serde(default = "default_mode_dev")]
    pub mode_dev: u16,

    #[serde(default = "default_mode_tolerance")]
    pub mode_tolerance: u16,

    /// Report every intent and the auxiliary channels regardless of mode
    #[serde(default)]
    pub verbose: bool,
}

/// Arming, brake and throttle safety configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SafetyConfig {
    #[serde(default = "default_arm_hold_samples")]
    pub arm_hold_samples: u32,

    #[serde(default = "default_arm_band")]
    pub arm_band: u16,

    #[serde(default = "default_arm_throttle_max")]
    pub arm_throttle_max: u16,

    #[serde(default = "default_arm_switch_threshold")]
    pub arm_switch_threshold: u16,

    #[serde(default = "default_brake_engage_below")]
    pub brake_engage_below: u16,

    #[serde(default = "default_brake_release_above")]
    pub brake_release_above: u16,

    /// Raw throttle travel above the armed baseline that maps to 100%
    #[serde(default = "default_throttle_span")]
    pub throttle_span: u16,

    #[serde(default = "default_advisory_interval_ms")]
    pub advisory_interval_ms: u64,
}

/// PID controller configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PidConfig {
    #[serde(default = "default_kp")]
    pub kp: f64,

    #[serde(default)]
    pub ki: f64,

    #[serde(default)]
    pub kd: f64,

    #[serde(default)]
    pub output_min: f64,

    #[serde(default = "default_output_max")]
    pub output_max: f64,

    #[serde(default = "default_anti_windup")]
    pub anti_windup: bool,

    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Target pulse rate in pulses per second
    #[serde(default)]
    pub setpoint_pps: Option<f64>,
}

/// Auto-tuner sweep configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TuningConfig {
    #[serde(default = "default_kp_start")]
    pub kp_start: f64,

    #[serde(default = "default_kp_step")]
    pub kp_step: f64,

    #[serde(default = "default_kp_max")]
    pub kp_max: f64,

    #[serde(default = "default_trial_duration_ms")]
    pub trial_duration_ms: u64,

    #[serde(default = "default_sweep_budget_ms")]
    pub sweep_budget_ms: u64,

    #[serde(default = "default_min_crossings")]
    pub min_crossings: usize,

    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

/// Per-motor configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MotorConfig {
    #[serde(default = "default_pulses_per_revolution")]
    pub pulses_per_revolution: u32,

    /// Logic level of the DIR pin that means forward
    #[serde(default = "default_forward_high")]
    pub forward_high: bool,
}

/// Left and right motor configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MotorsConfig {
    #[serde(default)]
    pub left: MotorConfig,

    #[serde(default)]
    pub right: MotorConfig,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_timeout_ms() -> u64 { 10 }
fn default_reconnect_interval_ms() -> u64 { 1000 }

fn default_protocol() -> Protocol { Protocol::Ibus }
fn default_buffer_cap() -> usize { 256 }
fn default_warmup_frames() -> u32 { 2 }

fn default_center() -> u16 { 1500 }
fn default_deadzone() -> i32 { 50 }
fn default_full_scale() -> u16 { 500 }
fn default_veer_channel() -> usize { 1 }
fn default_direction_channel() -> usize { 2 }
fn default_throttle_channel() -> usize { 3 }
fn default_pivot_channel() -> usize { 4 }
fn default_brake_channel() -> usize { 5 }
fn default_switch_b_channel() -> usize { 6 }
fn default_mode_channel() -> usize { 7 }
fn default_arm_channel() -> usize { 8 }
fn default_mode_attract() -> u16 { 50652 }
fn default_mode_dev() -> u16 { 50140 }
fn default_mode_tolerance() -> u16 { 20 }

fn default_arm_hold_samples() -> u32 { 30 }
fn default_arm_band() -> u16 { 5 }
fn default_arm_throttle_max() -> u16 { 1200 }
fn default_arm_switch_threshold() -> u16 { 1500 }
fn default_brake_engage_below() -> u16 { 1200 }
fn default_brake_release_above() -> u16 { 1300 }
fn default_throttle_span() -> u16 { 1000 }
fn default_advisory_interval_ms() -> u64 { 5000 }

fn default_kp() -> f64 { 1.0 }
fn default_output_max() -> f64 { 100.0 }
fn default_anti_windup() -> bool { true }
fn default_sample_interval_ms() -> u64 { 500 }

fn default_kp_start() -> f64 { 1.0 }
fn default_kp_step() -> f64 { 5.0 }
fn default_kp_max() -> f64 { 100.0 }
fn default_trial_duration_ms() -> u64 { 10_000 }
fn default_sweep_budget_ms() -> u64 { 300_000 }
fn default_min_crossings() -> usize { 6 }
fn default_settle_ms() -> u64 { 200 }

fn default_pulses_per_revolution() -> u32 { 20 }
fn default_forward_high() -> bool { true }

fn default_telemetry_enabled() -> bool { false }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_format() -> String { "jsonl".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: None,
            timeout_ms: default_timeout_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            buffer_cap: default_buffer_cap(),
            warmup_frames: default_warmup_frames(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            center: default_center(),
            deadzone: default_deadzone(),
            full_scale: default_full_scale(),
            veer: default_veer_channel(),
            direction: default_direction_channel(),
            throttle: default_throttle_channel(),
            pivot: default_pivot_channel(),
            brake: default_brake_channel(),
            switch_b: default_switch_b_channel(),
            mode: default_mode_channel(),
            arm: default_arm_channel(),
            mode_attract: default_mode_attract(),
            mode_dev: default_mode_dev(),
            mode_tolerance: default_mode_tolerance(),
            verbose: false,
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            arm_hold_samples: default_arm_hold_samples(),
            arm_band: default_arm_band(),
            arm_throttle_max: default_arm_throttle_max(),
            arm_switch_threshold: default_arm_switch_threshold(),
            brake_engage_below: default_brake_engage_below(),
            brake_release_above: default_brake_release_above(),
            throttle_span: default_throttle_span(),
            advisory_interval_ms: default_advisory_interval_ms(),
        }
    }
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: default_kp(),
            ki: 0.0,
            kd: 0.0,
            output_min: 0.0,
            output_max: default_output_max(),
            anti_windup: default_anti_windup(),
            sample_interval_ms: default_sample_interval_ms(),
            setpoint_pps: None,
        }
    }
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            kp_start: default_kp_start(),
            kp_step: default_kp_step(),
            kp_max: default_kp_max(),
            trial_duration_ms: default_trial_duration_ms(),
            sweep_budget_ms: default_sweep_budget_ms(),
            min_crossings: default_min_crossings(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            pulses_per_revolution: default_pulses_per_revolution(),
            forward_high: default_forward_high(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            format: default_log_format(),
        }
    }
}

impl SerialConfig {
    /// Baud rate to open the port with
    ///
    /// iBUS runs at 115200 baud (8N2), S-Bus at 100000 baud (8E2).
    #[must_use]
    pub fn effective_baud_rate(&self, protocol: Protocol) -> u32 {
        self.baud_rate.unwrap_or(match protocol {
            Protocol::Ibus => 115_200,
            Protocol::Sbus => 100_000,
        })
    }
}

fn invalid(message: impl std::fmt::Display) -> RoverError {
    RoverError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rc_rover::config::Config;
    ///
    /// let config = Config::load("config/rover.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Serial
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if let Some(baud) = self.serial.baud_rate {
            if ![100_000, 115_200].contains(&baud) {
                return Err(invalid("baud_rate must be one of: 100000, 115200"));
            }
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.serial.reconnect_interval_ms == 0 || self.serial.reconnect_interval_ms > 60000 {
            return Err(invalid("reconnect_interval_ms must be between 1 and 60000"));
        }

        // Receiver
        let frame_len = self.receiver.protocol.frame_len();
        if self.receiver.buffer_cap < frame_len || self.receiver.buffer_cap > 4096 {
            return Err(invalid(format!(
                "buffer_cap must be between {} and 4096 for {}",
                frame_len, self.receiver.protocol
            )));
        }

        // Channels
        let channel_count = self.receiver.protocol.channel_count();
        for (name, channel) in [
            ("veer", self.channels.veer),
            ("direction", self.channels.direction),
            ("throttle", self.channels.throttle),
            ("pivot", self.channels.pivot),
            ("brake", self.channels.brake),
            ("switch_b", self.channels.switch_b),
            ("mode", self.channels.mode),
            ("arm", self.channels.arm),
        ] {
            if channel == 0 || channel > channel_count {
                return Err(invalid(format!(
                    "{} channel {} is out of bounds (must be 1-{})",
                    name, channel, channel_count
                )));
            }
        }

        if self.channels.full_scale == 0 || self.channels.full_scale > self.channels.center {
            return Err(invalid("full_scale must be between 1 and center"));
        }

        if self.channels.deadzone < 0 || self.channels.deadzone > 100 {
            return Err(invalid("deadzone must be between 0 and 100"));
        }

        // Safety
        if self.safety.arm_hold_samples == 0 {
            return Err(invalid("arm_hold_samples must be greater than 0"));
        }

        if self.safety.brake_release_above < self.safety.brake_engage_below {
            return Err(invalid(
                "brake_release_above must not be below brake_engage_below",
            ));
        }

        if self.safety.throttle_span == 0 {
            return Err(invalid("throttle_span must be greater than 0"));
        }

        if self.safety.advisory_interval_ms == 0 || self.safety.advisory_interval_ms > 60000 {
            return Err(invalid("advisory_interval_ms must be between 1 and 60000"));
        }

        // PID
        for (name, value) in [("kp", self.pid.kp), ("ki", self.pid.ki), ("kd", self.pid.kd)] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!("{} must be a finite non-negative number", name)));
            }
        }

        if self.pid.output_min >= self.pid.output_max {
            return Err(invalid("pid output_min must be less than output_max"));
        }

        if self.pid.sample_interval_ms == 0 || self.pid.sample_interval_ms > 10000 {
            return Err(invalid("sample_interval_ms must be between 1 and 10000"));
        }

        if let Some(setpoint) = self.pid.setpoint_pps {
            if !setpoint.is_finite() || setpoint <= 0.0 {
                return Err(invalid("setpoint_pps must be greater than 0"));
            }
        }

        // Tuning
        for (name, value) in [
            ("kp_start", self.tuning.kp_start),
            ("kp_step", self.tuning.kp_step),
            ("kp_max", self.tuning.kp_max),
        ] {
            if !value.is_finite() {
                return Err(invalid(format!("{} must be a finite number", name)));
            }
        }

        if self.tuning.kp_start <= 0.0 || self.tuning.kp_step <= 0.0 {
            return Err(invalid("kp_start and kp_step must be greater than 0"));
        }

        if self.tuning.kp_max < self.tuning.kp_start {
            return Err(invalid("kp_max must not be below kp_start"));
        }

        let steps = (self.tuning.kp_max - self.tuning.kp_start) / self.tuning.kp_step;
        if steps >= MAX_SWEEP_TRIALS as f64 {
            return Err(invalid(format!(
                "kp sweep from {} to {} in steps of {} exceeds {} trials",
                self.tuning.kp_start, self.tuning.kp_max, self.tuning.kp_step, MAX_SWEEP_TRIALS
            )));
        }

        if self.tuning.trial_duration_ms < self.pid.sample_interval_ms {
            return Err(invalid("trial_duration_ms must cover at least one sample interval"));
        }

        if self.tuning.sweep_budget_ms < self.tuning.trial_duration_ms {
            return Err(invalid("sweep_budget_ms must cover at least one trial"));
        }

        if self.tuning.min_crossings < 3 {
            return Err(invalid("min_crossings must be at least 3"));
        }

        // Motors
        for (name, motor) in [("left", &self.motors.left), ("right", &self.motors.right)] {
            if motor.pulses_per_revolution == 0 {
                return Err(invalid(format!(
                    "{} pulses_per_revolution must be greater than 0",
                    name
                )));
            }
        }

        // Telemetry
        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.format != "jsonl" {
            return Err(invalid("log format must be 'jsonl' (only supported format)"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyAMA0"

[receiver]
protocol = "sbus"

[channels]
deadzone = 40

[motors.right]
forward_high = false
pulses_per_revolution = 45
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyAMA0");
        assert_eq!(config.receiver.protocol, Protocol::Sbus);
        assert_eq!(config.channels.deadzone, 40);
        assert_eq!(config.channels.center, 1500);
        assert!(!config.motors.right.forward_high);
        assert_eq!(config.motors.right.pulses_per_revolution, 45);
        assert_eq!(config.motors.left.pulses_per_revolution, 20);
    }

    #[test]
    fn test_empty_file_is_valid() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.receiver.protocol, Protocol::Ibus);
        assert_eq!(config.receiver.warmup_frames, 2);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load("/nonexistent/rover.toml");
        assert!(matches!(result, Err(RoverError::Io(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::from_toml("[serial\nport = 3");
        assert!(matches!(result, Err(RoverError::Config(_))));
    }

    #[test]
    fn test_unknown_protocol() {
        let result = Config::from_toml("[receiver]\nprotocol = \"crsf\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_effective_baud_rate() {
        let serial = SerialConfig::default();
        assert_eq!(serial.effective_baud_rate(Protocol::Ibus), 115_200);
        assert_eq!(serial.effective_baud_rate(Protocol::Sbus), 100_000);

        let serial = SerialConfig { baud_rate: Some(100_000), ..SerialConfig::default() };
        assert_eq!(serial.effective_baud_rate(Protocol::Ibus), 100_000);
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = Config::default();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = Config::default();
        config.serial.baud_rate = Some(9600);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_ms_zero() {
        let mut config = Config::default();
        config.serial.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_buffer_cap_below_frame_len() {
        let mut config = Config::default();
        config.receiver.buffer_cap = 31;
        assert!(config.validate().is_err());
        config.receiver.buffer_cap = 32;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_channel_out_of_bounds_for_ibus() {
        let mut config = Config::default();
        config.channels.arm = 15;
        assert!(config.validate().is_err());

        // S-Bus carries 16 channels
        config.receiver.protocol = Protocol::Sbus;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_channel_zero_invalid() {
        let mut config = Config::default();
        config.channels.throttle = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_full_scale_zero() {
        let mut config = Config::default();
        config.channels.full_scale = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deadzone_out_of_range() {
        let mut config = Config::default();
        config.channels.deadzone = 101;
        assert!(config.validate().is_err());
        config.channels.deadzone = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_brake_hysteresis_inverted() {
        let mut config = Config::default();
        config.safety.brake_engage_below = 1400;
        config.safety.brake_release_above = 1300;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_single_brake_threshold_allowed() {
        let mut config = Config::default();
        config.safety.brake_engage_below = 1200;
        config.safety.brake_release_above = 1200;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_arm_hold_samples_zero() {
        let mut config = Config::default();
        config.safety.arm_hold_samples = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_gain() {
        let mut config = Config::default();
        config.pid.ki = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nan_gain() {
        let mut config = Config::default();
        config.pid.kd = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pid_bounds_inverted() {
        let mut config = Config::default();
        config.pid.output_min = 100.0;
        config.pid.output_max = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_setpoint_must_be_positive() {
        let mut config = Config::default();
        config.pid.setpoint_pps = Some(0.0);
        assert!(config.validate().is_err());
        config.pid.setpoint_pps = Some(120.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_kp_max_below_start() {
        let mut config = Config::default();
        config.tuning.kp_max = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_kp_max_infinite() {
        let result = Config::from_toml("[tuning]\nkp_max = inf\n");
        assert!(result.is_err());

        let mut config = Config::default();
        config.tuning.kp_start = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_kp_sweep_too_many_trials() {
        let mut config = Config::default();
        config.tuning.kp_step = 1e-300;
        assert!(config.validate().is_err());

        config.tuning.kp_start = 1.0;
        config.tuning.kp_step = 1.0;
        config.tuning.kp_max = 1000.0;
        assert!(config.validate().is_ok());
        config.tuning.kp_max = 1001.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trial_shorter_than_sample() {
        let mut config = Config::default();
        config.tuning.trial_duration_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_budget_shorter_than_trial() {
        let mut config = Config::default();
        config.tuning.sweep_budget_ms = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_crossings_too_low() {
        let mut config = Config::default();
        config.tuning.min_crossings = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_pulses_per_revolution() {
        let mut config = Config::default();
        config.motors.left.pulses_per_revolution = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = Config::default();
        config.telemetry.enabled = true;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = Config::default();
        config.telemetry.enabled = false;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.telemetry.format = "csv".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_serial_port(), "/dev/ttyUSB0");
        assert_eq!(default_buffer_cap(), 256);
        assert_eq!(default_warmup_frames(), 2);
        assert_eq!(default_center(), 1500);
        assert_eq!(default_deadzone(), 50);
        assert_eq!(default_full_scale(), 500);
        assert_eq!(default_mode_attract(), 50652);
        assert_eq!(default_mode_dev(), 50140);
        assert_eq!(default_mode_tolerance(), 20);
        assert_eq!(default_arm_hold_samples(), 30);
        assert_eq!(default_arm_throttle_max(), 1200);
        assert_eq!(default_brake_engage_below(), 1200);
        assert_eq!(default_advisory_interval_ms(), 5000);
        assert_eq!(default_kp_start(), 1.0);
        assert_eq!(default_kp_step(), 5.0);
        assert_eq!(default_min_crossings(), 6);
        assert_eq!(default_pulses_per_revolution(), 20);
    }
}
