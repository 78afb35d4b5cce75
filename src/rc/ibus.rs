//! # iBUS Decoder
//!
//! Interval-framed FlySky iBUS packets: 32 bytes starting with `0x20 0x40`,
//! 14 little-endian 16-bit channels, and a 16-bit checksum at offset 30.

use super::checksum::verify_ibus_packet;
use super::decoder::{DecoderStats, FrameBuffer, FrameDecoder};
use super::protocol::*;
use crate::error::FrameError;

/// Validate a 32-byte window as an iBUS packet
///
/// # Errors
///
/// Returns error if:
/// - Window is shorter than a packet
/// - Header bytes do not match `0x20 0x40`
/// - Checksum does not match
pub fn validate_ibus_packet(packet: &[u8]) -> Result<(), FrameError> {
    if packet.len() < IBUS_PACKET_LEN {
        return Err(FrameError::Truncated {
            expected: IBUS_PACKET_LEN,
            actual: packet.len(),
        });
    }

    if packet[..2] != IBUS_HEADER {
        return Err(FrameError::BadHeader(packet[0]));
    }

    verify_ibus_packet(packet)
        .map_err(|(computed, received)| FrameError::Checksum { computed, received })
}

/// Decode the channel values of a validated iBUS packet
///
/// # Arguments
///
/// * `packet` - Packet bytes, header included
///
/// # Returns
///
/// * `[u16; 14]` - Channel values in channel order; channels not covered by
///   a short `packet` read as 0
pub fn decode_ibus_channels(packet: &[u8]) -> [u16; IBUS_NUM_CHANNELS] {
    let mut channels = [0u16; IBUS_NUM_CHANNELS];
    let body = packet.get(IBUS_HEADER.len()..).unwrap_or_default();
    for (slot, pair) in channels.iter_mut().zip(body.chunks_exact(2)) {
        *slot = u16::from_le_bytes([pair[0], pair[1]]);
    }
    channels
}

/// Decode a complete iBUS packet
///
/// # Errors
///
/// Returns the validation error if the packet is truncated, has a bad
/// header, or fails its checksum.
pub fn decode_ibus_packet(packet: &[u8]) -> Result<Frame, FrameError> {
    validate_ibus_packet(packet)?;
    let raw = bytes::Bytes::copy_from_slice(&packet[..IBUS_PACKET_LEN]);
    Ok(ibus_frame(raw))
}

fn ibus_frame(raw: bytes::Bytes) -> Frame {
    let channels = decode_ibus_channels(&raw);
    Frame {
        protocol: Protocol::Ibus,
        channels: ChannelSet::from_values(Protocol::Ibus, &channels),
        raw,
        flags: None,
    }
}

/// Streaming iBUS decoder.
#[derive(Debug)]
pub struct IbusDecoder {
    buffer: FrameBuffer,
}

impl Default for IbusDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl IbusDecoder {
    /// Creates a decoder with the default 256 byte buffer cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAP)
    }

    /// Creates a decoder retaining at most `cap` bytes.
    #[must_use]
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buffer: FrameBuffer::new(cap),
        }
    }
}

impl FrameDecoder for IbusDecoder {
    fn protocol(&self) -> Protocol {
        Protocol::Ibus
    }

    fn push(&mut self, bytes: &[u8]) {
        self.buffer.push(bytes);
    }

    fn next_frame(&mut self) -> Option<Frame> {
        self.buffer
            .extract(IBUS_PACKET_LEN, validate_ibus_packet)
            .map(ibus_frame)
    }

    fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn capacity(&self) -> usize {
        self.buffer.cap()
    }

    fn stats(&self) -> DecoderStats {
        self.buffer.stats()
    }
}
