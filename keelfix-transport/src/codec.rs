/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! Tokio codec for FIX message framing.
//!
//! This module provides a codec that cuts complete FIX messages out of a TCP
//! byte stream. Framing relies on the fixed envelope: `8=...|9=N|...|10=XXX|`
//! where `N` counts the bytes between the BodyLength delimiter and the
//! checksum field.

use bytes::{BufMut, Bytes, BytesMut};
use keelfix_tagvalue::{calculate_checksum, parse_checksum};
use memchr::memchr;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// SOH delimiter.
const SOH: u8 = 0x01;

/// Length of the checksum trailer `10=XXX|`.
const TRAILER_LEN: usize = 7;

/// Errors that can occur during framing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Stream does not start with a BeginString field.
    #[error("invalid begin string: frame must start with 8=")]
    InvalidBeginString,

    /// BodyLength field (tag 9) missing or out of place.
    #[error("missing body length field (tag 9)")]
    MissingBodyLength,

    /// BodyLength value is not a number or implies an impossible frame.
    #[error("invalid body length value")]
    InvalidBodyLength,

    /// Checksum trailer is not `10=` followed by three digits in 000..=255.
    #[error("invalid checksum trailer")]
    InvalidChecksumTrailer,

    /// Checksum trailer malformed or mismatched.
    #[error("checksum mismatch: calculated {calculated}, declared {declared}")]
    ChecksumMismatch {
        /// Calculated checksum.
        calculated: u8,
        /// Declared checksum in the trailer.
        declared: u8,
    },

    /// Frame exceeds the configured maximum size.
    #[error("message too large: {size} bytes exceeds maximum {max_size}")]
    MessageTooLarge {
        /// Frame size implied by the header.
        size: usize,
        /// Maximum allowed size.
        max_size: usize,
    },

    /// I/O error from the underlying stream.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Tokio codec for FIX message framing.
#[derive(Debug, Clone)]
pub struct FixCodec {
    /// Maximum frame size in bytes.
    max_message_size: usize,
    /// Whether to verify the checksum trailer while framing.
    validate_checksum: bool,
}

impl FixCodec {
    /// Creates a new codec with default settings (1 MiB limit, checksum on).
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_message_size: 1024 * 1024,
            validate_checksum: true,
        }
    }

    /// Sets the maximum frame size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Sets whether to verify checksums while framing.
    #[must_use]
    pub const fn with_checksum_validation(mut self, validate: bool) -> Self {
        self.validate_checksum = validate;
        self
    }

    /// Computes the total frame length from the header, if enough bytes are
    /// buffered to know it.
    fn frame_length(src: &[u8]) -> Result<Option<usize>, CodecError> {
        if src.len() < 2 {
            return Ok(None);
        }
        if &src[0..2] != b"8=" {
            return Err(CodecError::InvalidBeginString);
        }

        let Some(begin_soh) = memchr(SOH, src) else {
            return Ok(None);
        };

        let body_len_field = begin_soh + 1;
        if src.len() < body_len_field + 2 {
            return Ok(None);
        }
        if &src[body_len_field..body_len_field + 2] != b"9=" {
            return Err(CodecError::MissingBodyLength);
        }
        let Some(rel_soh) = memchr(SOH, &src[body_len_field..]) else {
            return Ok(None);
        };
        let body_len_soh = body_len_field + rel_soh;

        let digits = &src[body_len_field + 2..body_len_soh];
        let body_length = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or(CodecError::InvalidBodyLength)?;

        // Header through BodyLength SOH, then the body, then 10=XXX|.
        // BodyLength is peer-controlled; an absurd value must surface as an
        // error, not an overflow.
        (body_len_soh + 1 + TRAILER_LEN)
            .checked_add(body_length)
            .map(Some)
            .ok_or(CodecError::InvalidBodyLength)
    }
}

impl Default for FixCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FixCodec {
    type Item = Bytes;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(total) = Self::frame_length(src)? else {
            return Ok(None);
        };

        if total > self.max_message_size {
            return Err(CodecError::MessageTooLarge {
                size: total,
                max_size: self.max_message_size,
            });
        }

        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        if self.validate_checksum {
            let trailer = total - TRAILER_LEN;
            let declared = parse_checksum(&src[trailer + 3..trailer + 6])
                .ok_or(CodecError::InvalidChecksumTrailer)?;
            let calculated = calculate_checksum(&src[..trailer]);
            if calculated != declared {
                return Err(CodecError::ChecksumMismatch {
                    calculated,
                    declared,
                });
            }
        }

        Ok(Some(src.split_to(total).freeze()))
    }
}

impl Encoder<Bytes> for FixCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len());
        dst.put_slice(&item);
        Ok(())
    }
}

impl Encoder<&[u8]> for FixCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len());
        dst.put_slice(item);
        Ok(())
    }
}
