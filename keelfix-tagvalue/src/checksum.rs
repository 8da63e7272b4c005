/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! FIX checksum calculation.
//!
//! The FIX checksum is the sum of all bytes in the message up to (but not
//! including) the CheckSum field itself, modulo 256, transmitted as a
//! 3-digit zero-padded decimal.

/// Calculates the FIX checksum for the given data.
///
/// # Arguments
/// * `data` - The message bytes to checksum (everything before `10=`)
///
/// # Example
/// ```
/// use keelfix_tagvalue::calculate_checksum;
///
/// let data = b"8=FIX.4.4\x019=5\x0135=0\x01";
/// let checksum = calculate_checksum(data);
/// ```
#[inline]
#[must_use]
pub fn calculate_checksum(data: &[u8]) -> u8 {
    let sum: u32 = data.iter().map(|&b| b as u32).sum();
    (sum % 256) as u8
}

/// Formats a checksum value as a 3-digit zero-padded string.
#[inline]
#[must_use]
pub fn format_checksum(checksum: u8) -> [u8; 3] {
    [
        b'0' + (checksum / 100),
        b'0' + ((checksum / 10) % 10),
        b'0' + (checksum % 10),
    ]
}

/// Parses a 3-digit checksum string to a u8 value.
///
/// # Returns
/// `Some(checksum)` if the input is exactly three ASCII digits in the range
/// 000..=255, `None` otherwise.
#[inline]
#[must_use]
pub fn parse_checksum(bytes: &[u8]) -> Option<u8> {
    if bytes.len() != 3 {
        return None;
    }

    let d0 = bytes[0].checked_sub(b'0')?;
    let d1 = bytes[1].checked_sub(b'0')?;
    let d2 = bytes[2].checked_sub(b'0')?;

    if d0 > 9 || d1 > 9 || d2 > 9 {
        return None;
    }

    // Widen before combining; inputs like "300" are three valid digits but
    // not a valid byte value.
    let value = u16::from(d0) * 100 + u16::from(d1) * 10 + u16::from(d2);
    u8::try_from(value).ok()
}
