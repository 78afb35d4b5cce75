//! # S-Bus Decoder
//!
//! Parity-framed S-Bus frames: 25 bytes, start byte `0x0F`, 22 bytes of
//! 16 packed 11-bit channels, one flags byte, end byte `0x00`.
//!
//! S-Bus carries no checksum. A frame is accepted on its start and end
//! sentinels alone, which makes this variant noticeably weaker than iBUS: a
//! data byte of `0x0F` that happens to sit 24 bytes before a `0x00` is
//! indistinguishable from a real frame start. Parity is checked by the UART,
//! not here. The flags byte is decoded and reported but never used to
//! reject a frame.

use bytes::Bytes;

use super::decoder::{DecoderStats, FrameBuffer, FrameDecoder};
use super::protocol::*;
use crate::error::FrameError;

/// Validate a 25-byte window as an S-Bus frame
///
/// # Errors
///
/// Returns error if the window is truncated or either sentinel mismatches.
pub fn validate_sbus_frame(frame: &[u8]) -> Result<(), FrameError> {
    if frame.len() < SBUS_FRAME_LEN {
        return Err(FrameError::Truncated {
            expected: SBUS_FRAME_LEN,
            actual: frame.len(),
        });
    }

    if frame[0] != SBUS_START_BYTE {
        return Err(FrameError::BadHeader(frame[0]));
    }

    let end = frame[SBUS_FRAME_LEN - 1];
    if end != SBUS_END_BYTE {
        return Err(FrameError::BadEndByte(end));
    }

    Ok(())
}

/// Unpack 16 11-bit channels from the 22 data bytes
///
/// The data bytes form one little-endian 176-bit field; channel `n` occupies
/// bits `11n..11n+11`.
///
/// # Examples
///
/// ```
/// use rc_rover::rc::sbus::unpack_channels;
///
/// let mut data = [0u8; 22];
/// data[0] = 0xFF;
/// data[1] = 0x07;
/// let channels = unpack_channels(&data);
/// assert_eq!(channels[0], 2047);
/// assert_eq!(channels[1], 0);
/// ```
pub fn unpack_channels(data: &[u8]) -> [u16; SBUS_NUM_CHANNELS] {
    let mut channels = [0u16; SBUS_NUM_CHANNELS];
    for (ch, slot) in channels.iter_mut().enumerate() {
        let bit = ch * 11;
        let byte = bit / 8;
        let shift = bit % 8;

        let b0 = u32::from(data.get(byte).copied().unwrap_or(0));
        let b1 = u32::from(data.get(byte + 1).copied().unwrap_or(0));
        let b2 = u32::from(data.get(byte + 2).copied().unwrap_or(0));
        let word = b0 | (b1 << 8) | (b2 << 16);

        *slot = ((word >> shift) as u16) & SBUS_CHANNEL_MASK;
    }
    channels
}

/// Decode a complete S-Bus frame
///
/// # Errors
///
/// Returns the validation error if the frame is truncated or a sentinel
/// mismatches.
pub fn decode_sbus_frame(frame: &[u8]) -> Result<Frame, FrameError> {
    validate_sbus_frame(frame)?;
    Ok(sbus_frame(Bytes::copy_from_slice(&frame[..SBUS_FRAME_LEN])))
}

fn sbus_frame(raw: Bytes) -> Frame {
    let channels = unpack_channels(&raw[1..1 + SBUS_DATA_LEN]);
    let flags = SbusFlags::from_byte(raw[1 + SBUS_DATA_LEN]);
    Frame {
        protocol: Protocol::Sbus,
        channels: ChannelSet::from_values(Protocol::Sbus, &channels),
        raw,
        flags: Some(flags),
    }
}

/// Streaming S-Bus decoder.
#[derive(Debug)]
pub struct SbusDecoder {
    buffer: FrameBuffer,
}

impl Default for SbusDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SbusDecoder {
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

impl FrameDecoder for SbusDecoder {
    fn protocol(&self) -> Protocol {
        Protocol::Sbus
    }

    fn push(&mut self, bytes: &[u8]) {
        self.buffer.push(bytes);
    }

    fn next_frame(&mut self) -> Option<Frame> {
        self.buffer
            .extract(SBUS_FRAME_LEN, validate_sbus_frame)
            .map(sbus_frame)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rc::encoder::encode_sbus_frame;

    #[test]
    fn test_decode_known_vector() {
        // Same bytes as the reference parse_sbus vector, re-read LSB first
        let data = [
            0x0F, 128, 48, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0,
        ];
        let frame = decode_sbus_frame(&data).unwrap();
        // 128 | 48 << 8 = 0x3080; ch1 = 0x080, ch2 = 0x3080 >> 11 = 6
        assert_eq!(frame.channels.get(1), Some(0x080));
        assert_eq!(frame.channels.get(2), Some(6));
        // byte 22 = 1 sets bit 168 = bit 3 of channel 16
        assert_eq!(frame.channels.get(16), Some(8));
    }

    #[test]
    fn test_roundtrip_mixed_values() {
        let mut channels = [0u16; SBUS_NUM_CHANNELS];
        for (i, ch) in channels.iter_mut().enumerate() {
            *ch = (i as u16 * 131 + 172) & SBUS_CHANNEL_MASK;
        }
        let bytes = encode_sbus_frame(&channels, SbusFlags::default());
        let frame = decode_sbus_frame(&bytes).unwrap();
        assert_eq!(frame.channels.as_slice(), &channels);
    }

    #[test]
    fn test_decode_reports_flags() {
        let flags = SbusFlags { frame_lost: true, channel_17: true, ..Default::default() };
        let bytes = encode_sbus_frame(&[992; SBUS_NUM_CHANNELS], flags);
        let frame = decode_sbus_frame(&bytes).unwrap();
        assert_eq!(frame.flags, Some(flags));
    }

    #[test]
    fn test_failsafe_flag_does_not_reject() {
        let flags = SbusFlags { failsafe: true, ..Default::default() };
        let bytes = encode_sbus_frame(&[992; SBUS_NUM_CHANNELS], flags);
        assert!(decode_sbus_frame(&bytes).is_ok());
    }

    #[test]
    fn test_bad_start_byte() {
        let mut bytes = encode_sbus_frame(&[992; SBUS_NUM_CHANNELS], SbusFlags::default());
        bytes[0] = 0x0E;
        assert_eq!(decode_sbus_frame(&bytes), Err(FrameError::BadHeader(0x0E)));
    }

    #[test]
    fn test_bad_end_byte() {
        let mut bytes = encode_sbus_frame(&[992; SBUS_NUM_CHANNELS], SbusFlags::default());
        bytes[24] = 0x04;
        assert_eq!(decode_sbus_frame(&bytes), Err(FrameError::BadEndByte(0x04)));
    }

    #[test]
    fn test_truncated() {
        let bytes = encode_sbus_frame(&[992; SBUS_NUM_CHANNELS], SbusFlags::default());
        assert!(matches!(
            decode_sbus_frame(&bytes[..24]),
            Err(FrameError::Truncated { expected: 25, actual: 24 })
        ));
    }

    #[test]
    fn test_stream_resync_after_garbage() {
        let mut stream = vec![0x0F, 0x22, 0x33];
        stream.extend(encode_sbus_frame(&[1500; SBUS_NUM_CHANNELS], SbusFlags::default()));
        stream.extend(encode_sbus_frame(&[300; SBUS_NUM_CHANNELS], SbusFlags::default()));

        let mut decoder = SbusDecoder::new();
        let frames: Vec<Frame> = decoder.feed(&stream).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].channels.get(1), Some(1500));
        assert_eq!(frames[1].channels.get(16), Some(300));
    }

    #[test]
    fn test_sentinels_only_validation_is_weak() {
        // Any 25 bytes with the right sentinels are accepted
        let mut bytes = [0xA5u8; SBUS_FRAME_LEN];
        bytes[0] = SBUS_START_BYTE;
        bytes[24] = SBUS_END_BYTE;
        assert!(decode_sbus_frame(&bytes).is_ok());
    }
}
