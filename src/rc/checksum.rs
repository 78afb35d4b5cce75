//! # iBUS Checksum
//!
//! The iBUS checksum is `0xFFFF` minus the byte sum of everything before the
//! checksum field, truncated to 16 bits and stored little-endian in the last
//! two bytes of the packet.
//!
//! S-Bus has no equivalent: its frames are only delimited by start and end
//! sentinels.

use super::protocol::IBUS_CHECKSUM_OFFSET;

/// Computes the iBUS checksum over `data`.
///
/// # Arguments
///
/// * `data` - Header and channel bytes (the first 30 bytes of a packet)
///
/// # Examples
///
/// ```
/// use rc_rover::rc::checksum::ibus_checksum;
///
/// assert_eq!(ibus_checksum(&[]), 0xFFFF);
/// assert_eq!(ibus_checksum(&[0x20, 0x40]), 0xFF9F);
/// ```
#[must_use]
pub fn ibus_checksum(data: &[u8]) -> u16 {
    let sum = data.iter().fold(0u32, |acc, &b| acc + u32::from(b));
    (0xFFFFu32.wrapping_sub(sum) & 0xFFFF) as u16
}

/// Reads the checksum stored in a packet.
///
/// Returns `None` if the packet is shorter than the checksum field.
#[must_use]
pub fn stored_checksum(packet: &[u8]) -> Option<u16> {
    let bytes = packet.get(IBUS_CHECKSUM_OFFSET..IBUS_CHECKSUM_OFFSET + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Checks a full packet's checksum.
///
/// Returns `(computed, received)` on mismatch.
pub fn verify_ibus_packet(packet: &[u8]) -> Result<(), (u16, u16)> {
    let received = stored_checksum(packet).ok_or((0, 0))?;
    let computed = ibus_checksum(&packet[..IBUS_CHECKSUM_OFFSET]);
    if computed == received {
        Ok(())
    } else {
        Err((computed, received))
    }
}
