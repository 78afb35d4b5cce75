//! # RC Frame Encoder
//!
//! Builds iBUS and S-Bus frames from channel values. Used to replay
//! recorded stick positions into the decoder and to build test streams.

use super::checksum::ibus_checksum;
use super::protocol::*;

/// Encode 14 channel values into a complete iBUS packet
///
/// # Arguments
///
/// * `channels` - Array of 14 channel values
///
/// # Returns
///
/// * `Vec<u8>` - Complete iBUS packet (32 bytes: header + 28 channel bytes + checksum)
///
/// # Examples
///
/// ```
/// use rc_rover::rc::encoder::encode_ibus_packet;
///
/// let packet = encode_ibus_packet(&[1500u16; 14]);
/// assert_eq!(packet.len(), 32);
/// assert_eq!(&packet[..2], &[0x20, 0x40]);
/// ```
pub fn encode_ibus_packet(channels: &[u16; IBUS_NUM_CHANNELS]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(IBUS_PACKET_LEN);
    packet.extend_from_slice(&IBUS_HEADER);

    for &value in channels {
        packet.extend_from_slice(&value.to_le_bytes());
    }

    let checksum = ibus_checksum(&packet);
    packet.extend_from_slice(&checksum.to_le_bytes());

    packet
}

/// Encode 16 channel values into a complete S-Bus frame
///
/// Channels are packed as a continuous little-endian bitstream, 11 bits per
/// channel. Values above 2047 are masked.
///
/// # Arguments
///
/// * `channels` - Array of 16 channel values (11-bit: 0-2047)
/// * `flags` - Flags byte contents
///
/// # Returns
///
/// * `Vec<u8>` - Complete S-Bus frame (25 bytes)
pub fn encode_sbus_frame(channels: &[u16; SBUS_NUM_CHANNELS], flags: SbusFlags) -> Vec<u8> {
    let mut frame = vec![0u8; SBUS_FRAME_LEN];
    frame[0] = SBUS_START_BYTE;

    let mut bit_index = 0usize;
    for &value in channels {
        let value = value & SBUS_CHANNEL_MASK;
        for bit in 0..11 {
            if value & (1 << bit) != 0 {
                frame[1 + bit_index / 8] |= 1 << (bit_index % 8);
            }
            bit_index += 1;
        }
    }

    frame[1 + SBUS_DATA_LEN] = flags.to_byte();
    frame[SBUS_FRAME_LEN - 1] = SBUS_END_BYTE;

    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ibus_packet_structure() {
        let packet = encode_ibus_packet(&[1500; IBUS_NUM_CHANNELS]);
        assert_eq!(packet.len(), IBUS_PACKET_LEN);
        assert_eq!(packet[0], 0x20);
        assert_eq!(packet[1], 0x40);
        // 1500 = 0x05DC little-endian
        assert_eq!(packet[2], 0xDC);
        assert_eq!(packet[3], 0x05);
    }

    #[test]
    fn test_ibus_packet_checksum_field() {
        let packet = encode_ibus_packet(&[1000; IBUS_NUM_CHANNELS]);
        let stored = u16::from_le_bytes([packet[30], packet[31]]);
        assert_eq!(stored, ibus_checksum(&packet[..30]));
    }

    #[test]
    fn test_sbus_frame_structure() {
        let frame = encode_sbus_frame(&[1024; SBUS_NUM_CHANNELS], SbusFlags::default());
        assert_eq!(frame.len(), SBUS_FRAME_LEN);
        assert_eq!(frame[0], SBUS_START_BYTE);
        assert_eq!(frame[24], SBUS_END_BYTE);
        assert_eq!(frame[23], 0);
    }

    #[test]
    fn test_sbus_first_channel_bits() {
        let mut channels = [0u16; SBUS_NUM_CHANNELS];
        channels[0] = 0x7FF;
        let frame = encode_sbus_frame(&channels, SbusFlags::default());
        assert_eq!(frame[1], 0xFF);
        assert_eq!(frame[2], 0x07);
        assert_eq!(frame[3], 0x00);
    }

    #[test]
    fn test_sbus_masks_values() {
        let mut channels = [0u16; SBUS_NUM_CHANNELS];
        channels[0] = 0xFFFF;
        let frame = encode_sbus_frame(&channels, SbusFlags::default());
        // Only 11 bits written; channel 2 stays zero
        assert_eq!(frame[2] & 0xF8, 0);
    }

    #[test]
    fn test_sbus_flags_byte() {
        let flags = SbusFlags { failsafe: true, ..Default::default() };
        let frame = encode_sbus_frame(&[0; SBUS_NUM_CHANNELS], flags);
        assert_eq!(frame[23], 0x08);
    }
}
