use crate::error::WireError;

/// Extract `bit_width` bits starting at `bit_offset` from a packed row and
/// return them as an unsigned integer.
///
/// Bit numbering is LSB-first: bit 0 is the least-significant bit of
/// `row[0]`, bit 8 the least-significant bit of `row[1]`, and so on. The
/// first extracted bit becomes bit 0 of the result.
///
/// ```text
///   row[0]        = 0b0001_0110
///   bits [0..3)   = 0b110       -> 6
///   bits [3..8)   = 0b00010     -> 2
/// ```
///
/// A zero width returns 0 without touching `row`.
///
/// # Errors
///
/// - [`WireError::BitWidthTooLarge`] if `bit_width > 64`.
/// - [`WireError::BitRangeOutOfBounds`] if the range runs past the row.
pub fn extract_bits(row: &[u8], bit_offset: u32, bit_width: u32) -> Result<u64, WireError> {
    if bit_width == 0 {
        return Ok(0);
    }
    if bit_width > 64 {
        return Err(WireError::BitWidthTooLarge { width: bit_width });
    }

    let end = u64::from(bit_offset) + u64::from(bit_width);
    let row_bits = row.len() as u64 * 8;
    if end > row_bits {
        return Err(WireError::BitRangeOutOfBounds {
            offset: bit_offset,
            end,
            row_bits,
        });
    }

    let mut value = 0u64;
    let mut produced = 0u32;
    let mut bit = bit_offset as usize;

    while produced < bit_width {
        let shift = (bit % 8) as u32;
        let take = (8 - shift).min(bit_width - produced);
        // take is 1..=8, so the mask fits in a u8 after the subtraction.
        #[allow(clippy::cast_possible_truncation)]
        let mask = ((1u16 << take) - 1) as u8;
        let chunk = (row[bit / 8] >> shift) & mask;

        value |= u64::from(chunk) << produced;
        produced += take;
        bit += take as usize;
    }

    Ok(value)
}
