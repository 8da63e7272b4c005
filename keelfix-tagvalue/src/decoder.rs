/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! Zero-copy FIX message decoder.
//!
//! This module parses a framed FIX message into a [`RawMessage`] without
//! allocating for field values; values are references into the original
//! buffer.

use crate::checksum::{calculate_checksum, parse_checksum};
use keelfix_core::error::DecodeError;
use keelfix_core::field::{FieldRef, tags};
use keelfix_core::message::{MsgType, RawMessage};
use memchr::memchr;
use smallvec::SmallVec;

/// SOH (Start of Header) delimiter used in FIX messages.
pub const SOH: u8 = 0x01;

/// Equals sign delimiter between tag and value.
pub const EQUALS: u8 = b'=';

/// Zero-copy FIX message decoder.
#[derive(Debug)]
pub struct Decoder<'a> {
    /// Input buffer.
    input: &'a [u8],
    /// Current position in the buffer.
    offset: usize,
    /// Whether to validate checksums.
    validate_checksum: bool,
}

impl<'a> Decoder<'a> {
    /// Creates a new decoder for the given input buffer.
    #[inline]
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            offset: 0,
            validate_checksum: true,
        }
    }

    /// Sets whether to validate checksums during decoding.
    #[inline]
    #[must_use]
    pub const fn with_checksum_validation(mut self, validate: bool) -> Self {
        self.validate_checksum = validate;
        self
    }

    /// Decodes a complete FIX message from the buffer.
    ///
    /// # Errors
    /// Returns `DecodeError` if the message is malformed or incomplete.
    pub fn decode(&mut self) -> Result<RawMessage<'a>, DecodeError> {
        let start_offset = self.offset;

        // BeginString (tag 8) must come first.
        let begin_string_field = self.next_field().ok_or(DecodeError::Incomplete)?;
        if begin_string_field.tag != tags::BEGIN_STRING {
            return Err(DecodeError::InvalidBeginString);
        }
        let begin_string_start =
            begin_string_field.value.as_ptr() as usize - self.input.as_ptr() as usize;
        let begin_string = begin_string_start..begin_string_start + begin_string_field.value.len();

        // BodyLength (tag 9) must come second.
        let body_length_field = self.next_field().ok_or(DecodeError::MissingBodyLength)?;
        if body_length_field.tag != tags::BODY_LENGTH {
            return Err(DecodeError::MissingBodyLength);
        }
        let _body_length: usize = body_length_field
            .as_str()?
            .parse()
            .map_err(|_| DecodeError::InvalidBodyLength)?;

        // MsgType (tag 35) must open the body.
        let msg_type_field = self.next_field().ok_or(DecodeError::MissingMsgType)?;
        if msg_type_field.tag != tags::MSG_TYPE {
            return Err(DecodeError::MissingMsgType);
        }
        let msg_type: MsgType = msg_type_field
            .as_str()?
            .parse()
            .unwrap_or_else(|never| match never {});

        let mut fields: SmallVec<[FieldRef<'a>; 32]> = SmallVec::new();
        fields.push(begin_string_field);
        fields.push(body_length_field);
        fields.push(msg_type_field);

        // Remaining fields up to and including CheckSum (tag 10).
        let mut checksum_field: Option<FieldRef<'a>> = None;
        while let Some(field) = self.next_field() {
            if field.tag == tags::CHECK_SUM {
                checksum_field = Some(field);
                break;
            }
            fields.push(field);
        }

        if self.validate_checksum {
            let checksum_ref = checksum_field.ok_or(DecodeError::Incomplete)?;
            let declared = parse_checksum(checksum_ref.value).ok_or_else(|| {
                DecodeError::InvalidFieldValue {
                    tag: tags::CHECK_SUM,
                    reason: "invalid checksum format".to_string(),
                }
            })?;

            // Everything before the "10=" prefix participates in the sum.
            let checksum_start =
                checksum_ref.value.as_ptr() as usize - self.input.as_ptr() as usize - 3;
            let calculated = calculate_checksum(&self.input[start_offset..checksum_start]);

            if calculated != declared {
                return Err(DecodeError::ChecksumMismatch {
                    calculated,
                    declared,
                });
            }
        }

        Ok(RawMessage::new(
            &self.input[start_offset..self.offset],
            begin_string,
            msg_type,
            fields,
        ))
    }

    /// Parses the next tag=value field from the buffer.
    ///
    /// # Returns
    /// The next field, or `None` if the buffer is exhausted or no complete
    /// field remains.
    #[inline]
    pub fn next_field(&mut self) -> Option<FieldRef<'a>> {
        if self.offset >= self.input.len() {
            return None;
        }

        let remaining = &self.input[self.offset..];

        let eq_pos = memchr(EQUALS, remaining)?;
        let tag = parse_tag(&remaining[..eq_pos])?;

        let value_start = eq_pos + 1;
        let soh_pos = memchr(SOH, &remaining[value_start..])?;
        let value = &remaining[value_start..value_start + soh_pos];

        self.offset += value_start + soh_pos + 1;

        Some(FieldRef::new(tag, value))
    }

    /// Returns the current offset in the buffer.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Returns true if the buffer has been fully consumed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offset >= self.input.len()
    }
}

/// Parses a tag number from ASCII bytes.
#[inline]
fn parse_tag(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 10 {
        return None;
    }

    let mut result: u32 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        result = result.checked_mul(10)?.checked_add((b - b'0') as u32)?;
    }

    Some(result)
}
