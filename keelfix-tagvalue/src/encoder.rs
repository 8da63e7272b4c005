/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! FIX message encoder.
//!
//! This module builds FIX messages in the standard tag=value format. The
//! encoder accumulates body fields and stamps BeginString, BodyLength, and
//! CheckSum at finalization. It also provides [`mark_poss_dup`], which
//! rewrites a previously stored message for resend by injecting PossDupFlag
//! and OrigSendingTime and recomputing the envelope.

use crate::checksum::{calculate_checksum, format_checksum};
use crate::decoder::Decoder;
use bytes::{BufMut, BytesMut};
use keelfix_core::error::DecodeError;
use keelfix_core::field::tags;

/// SOH (Start of Header) delimiter used in FIX messages.
pub const SOH: u8 = 0x01;

/// FIX message encoder.
///
/// Fields are appended in emission order; `finish` produces the complete
/// framed message.
#[derive(Debug)]
pub struct Encoder {
    /// Buffer for the message body (between BodyLength and CheckSum).
    body: BytesMut,
    /// The BeginString value (e.g., "FIX.4.4").
    begin_string: String,
}

impl Encoder {
    /// Creates a new encoder with the specified BeginString.
    #[must_use]
    pub fn new(begin_string: impl Into<String>) -> Self {
        Self {
            body: BytesMut::with_capacity(256),
            begin_string: begin_string.into(),
        }
    }

    /// Appends a field with a string value.
    #[inline]
    pub fn put_str(&mut self, tag: u32, value: &str) {
        self.put_raw(tag, value.as_bytes());
    }

    /// Appends a field with an unsigned integer value.
    #[inline]
    pub fn put_uint(&mut self, tag: u32, value: u64) {
        let mut buf = itoa::Buffer::new();
        let s = buf.format(value);
        self.put_raw(tag, s.as_bytes());
    }

    /// Appends a field with a boolean value (Y/N).
    #[inline]
    pub fn put_bool(&mut self, tag: u32, value: bool) {
        self.put_raw(tag, if value { b"Y" } else { b"N" });
    }

    /// Appends a field with raw bytes.
    #[inline]
    pub fn put_raw(&mut self, tag: u32, value: &[u8]) {
        let mut tag_buf = itoa::Buffer::new();
        let tag_str = tag_buf.format(tag);

        self.body.put_slice(tag_str.as_bytes());
        self.body.put_u8(b'=');
        self.body.put_slice(value);
        self.body.put_u8(SOH);
    }

    /// Finalizes the message and returns the complete encoded bytes.
    ///
    /// Prepends BeginString (tag 8) and BodyLength (tag 9), appends
    /// CheckSum (tag 10).
    #[must_use]
    pub fn finish(self) -> BytesMut {
        let body_len = self.body.len();

        let mut message = BytesMut::with_capacity(self.begin_string.len() + body_len + 32);
        message.put_slice(b"8=");
        message.put_slice(self.begin_string.as_bytes());
        message.put_u8(SOH);
        message.put_slice(b"9=");

        let mut len_buf = itoa::Buffer::new();
        message.put_slice(len_buf.format(body_len).as_bytes());
        message.put_u8(SOH);

        message.put_slice(&self.body);

        let checksum = calculate_checksum(&message);
        message.put_slice(b"10=");
        message.put_slice(&format_checksum(checksum));
        message.put_u8(SOH);

        message
    }

    /// Returns the current body length.
    #[inline]
    #[must_use]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Clears the encoder for reuse.
    #[inline]
    pub fn clear(&mut self) {
        self.body.clear();
    }
}

/// Rewrites a stored message for retransmission.
///
/// Injects `PossDupFlag=Y` (tag 43) and copies the original SendingTime into
/// OrigSendingTime (tag 122), then recomputes BodyLength and CheckSum. The
/// sequence number and all other body fields are preserved byte-for-byte.
///
/// # Errors
/// Returns `DecodeError` if the stored bytes do not parse as a framed FIX
/// message.
pub fn mark_poss_dup(stored: &[u8]) -> Result<BytesMut, DecodeError> {
    let mut decoder = Decoder::new(stored).with_checksum_validation(false);
    let raw = decoder.decode()?;

    let orig_sending_time = raw.get_field_str(tags::SENDING_TIME).map(str::to_owned);

    let mut encoder = Encoder::new(raw.begin_string());
    for field in raw.fields() {
        match field.tag {
            // Envelope fields are regenerated, stale resend markers dropped.
            tags::BEGIN_STRING
            | tags::BODY_LENGTH
            | tags::CHECK_SUM
            | tags::POSS_DUP_FLAG
            | tags::ORIG_SENDING_TIME => {}
            tags::SENDING_TIME => {
                encoder.put_raw(tags::SENDING_TIME, field.value);
                encoder.put_bool(tags::POSS_DUP_FLAG, true);
                if let Some(orig) = &orig_sending_time {
                    encoder.put_str(tags::ORIG_SENDING_TIME, orig);
                }
            }
            _ => encoder.put_raw(field.tag, field.value),
        }
    }

    // A stored message without SendingTime still gets the duplicate marker.
    if orig_sending_time.is_none() {
        encoder.put_bool(tags::POSS_DUP_FLAG, true);
    }

    Ok(encoder.finish())
}
