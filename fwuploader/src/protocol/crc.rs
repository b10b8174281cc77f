//! CRC16/XMODEM checksum (polynomial 0x1021, seed 0, MSB first).
//!
//! YMODEM pads short data blocks with `0x04`. Instead of building the padded
//! buffer just to checksum it, [`crc16_with_pad_length`] keeps rolling the CRC
//! over virtual pad bytes.

/// CRC polynomial.
const POLY: u16 = 0x1021;

/// Value of the virtual bytes appended by [`crc16_with_pad_length`].
pub const PAD_BYTE: u8 = 0x04;

#[inline]
fn update(crc: u16, byte: u8) -> u16 {
    let mut crc = crc ^ (u16::from(byte) << 8);
    for _ in 0..8 {
        crc = if crc & 0x8000 != 0 {
            (crc << 1) ^ POLY
        } else {
            crc << 1
        };
    }
    crc
}

/// Compute the CRC16 of `data`.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0, |crc, &b| update(crc, b))
}

/// Compute the CRC16 of `data` as if it were padded with [`PAD_BYTE`] up to
/// `total_len` bytes.
///
/// No padding is applied when `total_len <= data.len()`.
#[must_use]
pub fn crc16_with_pad_length(data: &[u8], total_len: usize) -> u16 {
    let pad = total_len.saturating_sub(data.len());
    (0..pad).fold(crc16(data), |crc, _| update(crc, PAD_BYTE))
}
