/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! Field access for FIX messages.
//!
//! This module provides [`FieldRef`], a zero-copy reference to a tag=value
//! pair within a message buffer, and the [`tags`] module with the standard
//! session-layer tag numbers the engine interprets.

use crate::error::DecodeError;
use std::str::FromStr;

/// Standard session-layer tag numbers.
///
/// Only the tags the session engine itself reads or writes are named here;
/// business-message dictionaries are out of scope.
pub mod tags {
    /// BeginString: FIX protocol version.
    pub const BEGIN_STRING: u32 = 8;
    /// BodyLength: byte count between BodyLength and CheckSum.
    pub const BODY_LENGTH: u32 = 9;
    /// CheckSum: modulo-256 trailer.
    pub const CHECK_SUM: u32 = 10;
    /// BeginSeqNo: start of a resend range.
    pub const BEGIN_SEQ_NO: u32 = 7;
    /// EndSeqNo: end of a resend range (0 = infinity).
    pub const END_SEQ_NO: u32 = 16;
    /// MsgSeqNum: per-direction message sequence number.
    pub const MSG_SEQ_NUM: u32 = 34;
    /// MsgType: message type code.
    pub const MSG_TYPE: u32 = 35;
    /// NewSeqNo: target sequence number of a SequenceReset.
    pub const NEW_SEQ_NO: u32 = 36;
    /// PossDupFlag: message may be a duplicate of an earlier transmission.
    pub const POSS_DUP_FLAG: u32 = 43;
    /// RefSeqNum: sequence number a Reject refers to.
    pub const REF_SEQ_NUM: u32 = 45;
    /// SenderCompID.
    pub const SENDER_COMP_ID: u32 = 49;
    /// SenderSubID.
    pub const SENDER_SUB_ID: u32 = 50;
    /// SendingTime.
    pub const SENDING_TIME: u32 = 52;
    /// TargetCompID.
    pub const TARGET_COMP_ID: u32 = 56;
    /// TargetSubID.
    pub const TARGET_SUB_ID: u32 = 57;
    /// Text: free-form reason text.
    pub const TEXT: u32 = 58;
    /// EncryptMethod: always 0 (none) in this engine.
    pub const ENCRYPT_METHOD: u32 = 98;
    /// HeartBtInt: heartbeat interval in seconds, negotiated at logon.
    pub const HEART_BT_INT: u32 = 108;
    /// TestReqID: correlates a TestRequest with its Heartbeat reply.
    pub const TEST_REQ_ID: u32 = 112;
    /// OrigSendingTime: original SendingTime of a resent message.
    pub const ORIG_SENDING_TIME: u32 = 122;
    /// GapFillFlag: SequenceReset stands in for skipped admin messages.
    pub const GAP_FILL_FLAG: u32 = 123;
    /// ResetSeqNumFlag: both sides reset sequence numbers at logon.
    pub const RESET_SEQ_NUM_FLAG: u32 = 141;
    /// RefTagID: tag number a Reject refers to.
    pub const REF_TAG_ID: u32 = 371;
    /// SessionRejectReason.
    pub const SESSION_REJECT_REASON: u32 = 373;
}

/// Zero-copy reference to a field within a FIX message buffer.
#[derive(Debug, Clone, Copy)]
pub struct FieldRef<'a> {
    /// The field tag number.
    pub tag: u32,
    /// Reference to the field value bytes (without delimiters).
    pub value: &'a [u8],
}

impl<'a> FieldRef<'a> {
    /// Creates a new field reference.
    #[inline]
    #[must_use]
    pub const fn new(tag: u32, value: &'a [u8]) -> Self {
        Self { tag, value }
    }

    /// Returns the value as a string slice.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidUtf8` if the value is not valid UTF-8.
    pub fn as_str(&self) -> Result<&'a str, DecodeError> {
        std::str::from_utf8(self.value).map_err(DecodeError::from)
    }

    /// Parses the value as the specified type.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidFieldValue` if parsing fails.
    pub fn parse<T: FromStr>(&self) -> Result<T, DecodeError> {
        let s = self.as_str()?;
        s.parse().map_err(|_| DecodeError::InvalidFieldValue {
            tag: self.tag,
            reason: format!("failed to parse '{}' as {}", s, std::any::type_name::<T>()),
        })
    }

    /// Returns the value as a u32.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidFieldValue` if the value is not a valid
    /// integer.
    pub fn as_u32(&self) -> Result<u32, DecodeError> {
        self.parse()
    }

    /// Returns the value as a bool (FIX uses 'Y'/'N').
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidFieldValue` if the value is not 'Y' or 'N'.
    pub fn as_bool(&self) -> Result<bool, DecodeError> {
        match self.value {
            b"Y" => Ok(true),
            b"N" => Ok(false),
            _ => Err(DecodeError::InvalidFieldValue {
                tag: self.tag,
                reason: "expected 'Y' or 'N'".to_string(),
            }),
        }
    }

    /// Returns the raw bytes of the value.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.value
    }

    /// Returns the length of the value in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.value.len()
    }

    /// Returns true if the value is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_ref_as_str() {
        let field = FieldRef::new(tags::TEST_REQ_ID, b"TEST123");
        assert_eq!(field.as_str().unwrap(), "TEST123");
    }

    #[test]
    fn test_field_ref_as_u32() {
        let field = FieldRef::new(tags::MSG_SEQ_NUM, b"12345");
        assert_eq!(field.as_u32().unwrap(), 12345);
    }

    #[test]
    fn test_field_ref_as_bool() {
        let yes = FieldRef::new(tags::POSS_DUP_FLAG, b"Y");
        let no = FieldRef::new(tags::POSS_DUP_FLAG, b"N");
        assert!(yes.as_bool().unwrap());
        assert!(!no.as_bool().unwrap());
        assert!(FieldRef::new(tags::POSS_DUP_FLAG, b"X").as_bool().is_err());
    }

    #[test]
    fn test_field_ref_invalid_utf8() {
        let field = FieldRef::new(1, &[0xFF, 0xFE]);
        assert!(field.as_str().is_err());
    }

    #[test]
    fn test_field_ref_parse_failure() {
        let field = FieldRef::new(tags::MSG_SEQ_NUM, b"abc");
        assert!(field.as_u32().is_err());
    }
}
