//! # Error Types
//!
//! Custom error types for RC Rover using `thiserror`.
//!
//! Only configuration and transport failures ever reach the caller as hard
//! errors. Frame errors are recovered by resynchronizing the decoder buffer
//! and tuning errors leave the existing PID gains untouched.

use thiserror::Error;

/// Main error type for RC Rover
#[derive(Debug, Error)]
pub enum RoverError {
    /// RC frame errors
    #[error("RC frame error: {0}")]
    Frame(#[from] FrameError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// No receiver found at any of the tried paths
    #[error("Serial port not found (tried: {0})")]
    SerialPortNotFound(String),

    /// PID auto-tuning errors
    #[error("Tuning error: {0}")]
    Tuning(#[from] TuningError),

    /// Telemetry sink errors
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a candidate RC frame is rejected.
///
/// These never escape the decoder as errors; they are counted and the byte
/// stream is resynchronized one byte further on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Fewer bytes than a complete frame
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Header or start byte mismatch
    #[error("bad header byte 0x{0:02X}")]
    BadHeader(u8),

    /// iBUS checksum mismatch
    #[error("checksum mismatch: computed 0x{computed:04X}, received 0x{received:04X}")]
    Checksum { computed: u16, received: u16 },

    /// S-Bus end byte mismatch
    #[error("bad end byte 0x{0:02X}")]
    BadEndByte(u8),
}

/// Auto-tuning failures. The PID gains are never modified when one of these
/// is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TuningError {
    /// No trial in the sweep produced sustained oscillation
    #[error("no sustained oscillation found for Kp up to {max_kp}")]
    NoOscillation { max_kp: f64 },

    /// The sweep was cancelled between samples
    #[error("tuning cancelled")]
    Cancelled,

    /// The overall sweep budget ran out before oscillation was found
    #[error("sweep budget of {budget_s:.1}s exhausted at Kp={kp}")]
    BudgetExhausted { budget_s: f64, kp: f64 },

    /// A tuning trial was requested without a target rate
    #[error("no setpoint configured for tuning")]
    MissingSetpoint,
}

/// Result type alias for RC Rover
pub type Result<T> = std::result::Result<T, RoverError>;
