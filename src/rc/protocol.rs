//! # RC Protocol Constants and Types
//!
//! Core definitions shared by the iBUS (interval-framed) and S-Bus
//! (parity-framed) receivers.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// iBUS packet length (header + 14 channels + checksum)
pub const IBUS_PACKET_LEN: usize = 32;

/// iBUS header bytes: packet length (0x20) followed by command (0x40)
pub const IBUS_HEADER: [u8; 2] = [0x20, 0x40];

/// Offset of the little-endian iBUS checksum
pub const IBUS_CHECKSUM_OFFSET: usize = 30;

/// Number of channels carried by an iBUS packet
pub const IBUS_NUM_CHANNELS: usize = 14;

/// S-Bus frame length (start + 22 data bytes + flags + end)
pub const SBUS_FRAME_LEN: usize = 25;

/// S-Bus start byte
pub const SBUS_START_BYTE: u8 = 0x0F;

/// S-Bus end byte
pub const SBUS_END_BYTE: u8 = 0x00;

/// Number of packed data bytes in an S-Bus frame
pub const SBUS_DATA_LEN: usize = 22;

/// Number of analog channels carried by an S-Bus frame
pub const SBUS_NUM_CHANNELS: usize = 16;

/// S-Bus channel mask (11-bit: 0-2047)
pub const SBUS_CHANNEL_MASK: u16 = 0x07FF;

/// Maximum number of channels in any supported protocol
pub const MAX_CHANNELS: usize = 16;

/// Default cap for the decoder accumulation buffer
pub const DEFAULT_BUFFER_CAP: usize = 256;

/// RC framing variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// FlySky iBUS: 32-byte packets with a 16-bit checksum
    Ibus,
    /// S-Bus: 25-byte frames delimited by start/end sentinels only
    Sbus,
}

impl Protocol {
    /// Length in bytes of one complete frame
    #[must_use]
    pub fn frame_len(self) -> usize {
        match self {
            Protocol::Ibus => IBUS_PACKET_LEN,
            Protocol::Sbus => SBUS_FRAME_LEN,
        }
    }

    /// Number of channels decoded from one frame
    #[must_use]
    pub fn channel_count(self) -> usize {
        match self {
            Protocol::Ibus => IBUS_NUM_CHANNELS,
            Protocol::Sbus => SBUS_NUM_CHANNELS,
        }
    }

    /// Largest raw value a channel can carry in this protocol
    #[must_use]
    pub fn max_value(self) -> u16 {
        match self {
            Protocol::Ibus => u16::MAX,
            Protocol::Sbus => SBUS_CHANNEL_MASK,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Ibus => write!(f, "iBUS"),
            Protocol::Sbus => write!(f, "S-Bus"),
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "ibus" => Ok(Protocol::Ibus),
            "sbus" => Ok(Protocol::Sbus),
            other => Err(format!("unknown protocol '{}' (expected ibus or sbus)", other)),
        }
    }
}

/// Raw channel values of one decoded frame.
///
/// Channels are addressed 1-based, the way they are labelled on the
/// transmitter (CH1..CH16). Values are already limited to the protocol's bit
/// width when the set is built.
///
/// # Examples
///
/// ```
/// use rc_rover::rc::protocol::{ChannelSet, Protocol};
///
/// let set = ChannelSet::from_values(Protocol::Ibus, &[1500; 14]);
/// assert_eq!(set.get(1), Some(1500));
/// assert_eq!(set.get(15), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSet {
    values: [u16; MAX_CHANNELS],
    len: usize,
}

impl ChannelSet {
    /// Builds a channel set, truncating to the protocol channel count and
    /// masking each value to the protocol bit width.
    #[must_use]
    pub fn from_values(protocol: Protocol, raw: &[u16]) -> Self {
        let len = raw.len().min(protocol.channel_count());
        let mut values = [0u16; MAX_CHANNELS];
        for (slot, &value) in values.iter_mut().zip(&raw[..len]) {
            *slot = value.min(protocol.max_value());
        }
        Self { values, len }
    }

    /// Value of channel `channel` (1-based), if present.
    #[must_use]
    pub fn get(&self, channel: usize) -> Option<u16> {
        if channel == 0 || channel > self.len {
            None
        } else {
            Some(self.values[channel - 1])
        }
    }

    /// Value of channel `channel` (1-based) or `default` if absent.
    #[must_use]
    pub fn get_or(&self, channel: usize, default: u16) -> u16 {
        self.get(channel).unwrap_or(default)
    }

    /// Number of channels present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no channels are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Present channel values in channel order.
    #[must_use]
    pub fn as_slice(&self) -> &[u16] {
        &self.values[..self.len]
    }
}

/// Flags byte of an S-Bus frame.
///
/// Reported for diagnostics only: the decoder does not reject frames based
/// on these bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SbusFlags {
    /// Digital channel 17
    pub channel_17: bool,
    /// Digital channel 18
    pub channel_18: bool,
    /// Receiver reports a lost frame
    pub frame_lost: bool,
    /// Receiver failsafe is active
    pub failsafe: bool,
}

impl SbusFlags {
    /// Decodes the flags byte (bit 0 = ch17, bit 1 = ch18, bit 2 = frame
    /// lost, bit 3 = failsafe).
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        Self {
            channel_17: byte & 0x01 != 0,
            channel_18: byte & 0x02 != 0,
            frame_lost: byte & 0x04 != 0,
            failsafe: byte & 0x08 != 0,
        }
    }

    /// Encodes the flags back into a byte.
    #[must_use]
    pub fn to_byte(self) -> u8 {
        (self.channel_17 as u8)
            | (self.channel_18 as u8) << 1
            | (self.frame_lost as u8) << 2
            | (self.failsafe as u8) << 3
    }
}

/// A validated RC frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Framing variant the frame was decoded with
    pub protocol: Protocol,
    /// The raw validated bytes
    pub raw: Bytes,
    /// Decoded channel values
    pub channels: ChannelSet,
    /// S-Bus flags byte (None for iBUS)
    pub flags: Option<SbusFlags>,
}
