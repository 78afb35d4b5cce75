//! # RC Receiver Protocol Module
//!
//! Decoding of RC receiver byte streams into channel values.
//!
//! This module handles:
//! - iBUS packets (32 bytes, 14 channels, 16-bit checksum)
//! - S-Bus frames (25 bytes, 16 channels x 11 bits, start/end sentinels)
//! - Byte-level resynchronization of noisy or partial streams
//! - Frame encoding for replay and loopback

pub mod protocol;
pub mod checksum;
pub mod decoder;
pub mod encoder;
pub mod ibus;
pub mod sbus;
