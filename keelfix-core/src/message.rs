/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! Message representations for the session layer.
//!
//! This module provides:
//! - [`MsgType`]: session-level message types plus a catch-all for business
//!   messages the engine routes without interpreting
//! - [`RawMessage`]: zero-copy view into a framed FIX message buffer
//! - [`OwnedMessage`]: owned message for storage and cross-task transfer
//! - [`OutboundMessage`]: mutable body under construction, handed to the
//!   application's to_admin/to_app hooks before sequencing and transmission

use crate::error::DecodeError;
use crate::field::{FieldRef, tags};
use crate::types::SeqNum;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::ops::Range;

/// FIX message types the session layer distinguishes.
///
/// The administrative set is interpreted by the engine; everything else is a
/// business message carried as `Other` and dispatched to the application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MsgType {
    /// Heartbeat (0).
    #[default]
    Heartbeat,
    /// Test Request (1).
    TestRequest,
    /// Resend Request (2).
    ResendRequest,
    /// Reject (3).
    Reject,
    /// Sequence Reset / Gap Fill (4).
    SequenceReset,
    /// Logout (5).
    Logout,
    /// Logon (A).
    Logon,
    /// Any non-administrative message type.
    Other(String),
}

impl std::str::FromStr for MsgType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "0" => Self::Heartbeat,
            "1" => Self::TestRequest,
            "2" => Self::ResendRequest,
            "3" => Self::Reject,
            "4" => Self::SequenceReset,
            "5" => Self::Logout,
            "A" => Self::Logon,
            other => Self::Other(other.to_string()),
        })
    }
}

impl MsgType {
    /// Returns the wire representation of this message type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Heartbeat => "0",
            Self::TestRequest => "1",
            Self::ResendRequest => "2",
            Self::Reject => "3",
            Self::SequenceReset => "4",
            Self::Logout => "5",
            Self::Logon => "A",
            Self::Other(s) => s.as_str(),
        }
    }

    /// Returns true if this is an administrative (session-level) message.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Returns true if this is a business (application-level) message.
    #[must_use]
    pub const fn is_app(&self) -> bool {
        !self.is_admin()
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Zero-copy view into a framed FIX message buffer.
///
/// Fields reference the original buffer; no allocation happens during
/// parsing beyond the field index.
#[derive(Debug, Clone)]
pub struct RawMessage<'a> {
    /// The complete message buffer.
    buffer: &'a [u8],
    /// Range of the BeginString field value.
    begin_string: Range<usize>,
    /// The parsed message type.
    msg_type: MsgType,
    /// Parsed field references.
    fields: SmallVec<[FieldRef<'a>; 32]>,
}

impl<'a> RawMessage<'a> {
    /// Creates a new RawMessage from parsed components.
    #[must_use]
    pub fn new(
        buffer: &'a [u8],
        begin_string: Range<usize>,
        msg_type: MsgType,
        fields: SmallVec<[FieldRef<'a>; 32]>,
    ) -> Self {
        Self {
            buffer,
            begin_string,
            msg_type,
            fields,
        }
    }

    /// Returns the complete message buffer.
    #[inline]
    #[must_use]
    pub const fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    /// Returns the BeginString value (e.g., "FIX.4.4").
    #[must_use]
    pub fn begin_string(&self) -> &'a str {
        std::str::from_utf8(&self.buffer[self.begin_string.clone()]).unwrap_or("")
    }

    /// Returns the message type.
    #[inline]
    #[must_use]
    pub fn msg_type(&self) -> &MsgType {
        &self.msg_type
    }

    /// Returns an iterator over all fields.
    #[inline]
    pub fn fields(&self) -> impl Iterator<Item = &FieldRef<'a>> {
        self.fields.iter()
    }

    /// Gets the first field with the given tag.
    #[must_use]
    pub fn get_field(&self, tag: u32) -> Option<&FieldRef<'a>> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// Gets a field value as a string.
    #[must_use]
    pub fn get_field_str(&self, tag: u32) -> Option<&'a str> {
        self.get_field(tag).and_then(|f| f.as_str().ok())
    }

    /// Gets a field value parsed as the specified type.
    ///
    /// # Errors
    /// Returns `DecodeError` if the field is not found or cannot be parsed.
    pub fn get_field_as<T: std::str::FromStr>(&self, tag: u32) -> Result<T, DecodeError> {
        self.get_field(tag)
            .ok_or(DecodeError::MissingRequiredField { tag })?
            .parse()
    }

    /// Returns the message length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if the message is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Converts this borrowed message to an owned message.
    #[must_use]
    pub fn to_owned(&self) -> OwnedMessage {
        OwnedMessage::from_raw(self)
    }
}

/// Owned FIX message for storage and cross-task transfer.
#[derive(Debug, Clone)]
pub struct OwnedMessage {
    /// The complete message buffer.
    buffer: Bytes,
    /// The parsed message type.
    msg_type: MsgType,
    /// Field offsets: (tag, value_range).
    field_offsets: Vec<(u32, Range<usize>)>,
}

impl OwnedMessage {
    /// Creates an OwnedMessage from a RawMessage.
    #[must_use]
    pub fn from_raw(raw: &RawMessage<'_>) -> Self {
        let buffer = Bytes::copy_from_slice(raw.buffer);
        let field_offsets = raw
            .fields
            .iter()
            .map(|f| {
                let start = f.value.as_ptr() as usize - raw.buffer.as_ptr() as usize;
                let end = start + f.value.len();
                (f.tag, start..end)
            })
            .collect();

        Self {
            buffer,
            msg_type: raw.msg_type.clone(),
            field_offsets,
        }
    }

    /// Creates an OwnedMessage from raw bytes and a precomputed field index.
    #[must_use]
    pub fn new(buffer: Bytes, msg_type: MsgType, field_offsets: Vec<(u32, Range<usize>)>) -> Self {
        Self {
            buffer,
            msg_type,
            field_offsets,
        }
    }

    /// Returns the message type.
    #[inline]
    #[must_use]
    pub fn msg_type(&self) -> &MsgType {
        &self.msg_type
    }

    /// Returns the message bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Gets a field value by tag.
    #[must_use]
    pub fn get_field(&self, tag: u32) -> Option<&[u8]> {
        self.field_offsets
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, range)| &self.buffer[range.clone()])
    }

    /// Gets a field value as a string.
    #[must_use]
    pub fn get_field_str(&self, tag: u32) -> Option<&str> {
        self.get_field(tag)
            .and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Returns the MsgSeqNum (tag 34), if present and numeric.
    #[must_use]
    pub fn seq_num(&self) -> Option<SeqNum> {
        self.get_field_str(tags::MSG_SEQ_NUM)
            .and_then(|s| s.parse::<u32>().ok())
            .map(SeqNum::new)
    }

    /// Returns true if the PossDupFlag (tag 43) is set to 'Y'.
    #[must_use]
    pub fn is_poss_dup(&self) -> bool {
        self.get_field(tags::POSS_DUP_FLAG) == Some(b"Y")
    }

    /// Returns the SenderCompID (tag 49) of the message, if present.
    #[must_use]
    pub fn sender_comp_id(&self) -> Option<&str> {
        self.get_field_str(tags::SENDER_COMP_ID)
    }

    /// Returns the TargetCompID (tag 56) of the message, if present.
    #[must_use]
    pub fn target_comp_id(&self) -> Option<&str> {
        self.get_field_str(tags::TARGET_COMP_ID)
    }

    /// Returns the BeginString (tag 8) of the message, if present.
    #[must_use]
    pub fn begin_string(&self) -> Option<&str> {
        self.get_field_str(tags::BEGIN_STRING)
    }

    /// Returns the message length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if the message is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consumes the message and returns the underlying buffer.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.buffer
    }
}

/// An outbound message body under construction.
///
/// Holds the body fields only; the standard header (BeginString, BodyLength,
/// MsgType, MsgSeqNum, comp ids, SendingTime) and the checksum trailer are
/// stamped by the session at finalization, after the application's
/// to_admin/to_app hook has had a chance to mutate the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// The message type.
    msg_type: MsgType,
    /// Body fields in emission order.
    fields: Vec<(u32, String)>,
}

impl OutboundMessage {
    /// Creates an empty outbound message of the given type.
    #[must_use]
    pub fn new(msg_type: MsgType) -> Self {
        Self {
            msg_type,
            fields: Vec::new(),
        }
    }

    /// Returns the message type.
    #[inline]
    #[must_use]
    pub fn msg_type(&self) -> &MsgType {
        &self.msg_type
    }

    /// Sets a field, replacing an existing value for the same tag.
    pub fn set_field(&mut self, tag: u32, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(t, _)| *t == tag) {
            slot.1 = value;
        } else {
            self.fields.push((tag, value));
        }
        self
    }

    /// Builder-style variant of [`set_field`](Self::set_field).
    #[must_use]
    pub fn with_field(mut self, tag: u32, value: impl Into<String>) -> Self {
        self.set_field(tag, value);
        self
    }

    /// Gets a field value by tag.
    #[must_use]
    pub fn get_field(&self, tag: u32) -> Option<&str> {
        self.fields
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v.as_str())
    }

    /// Removes a field by tag and returns whether it was present.
    pub fn remove_field(&mut self, tag: u32) -> bool {
        let before = self.fields.len();
        self.fields.retain(|(t, _)| *t != tag);
        self.fields.len() != before
    }

    /// Returns the body fields in emission order.
    #[must_use]
    pub fn fields(&self) -> &[(u32, String)] {
        &self.fields
    }

    /// Returns true if this is an administrative message.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.msg_type.is_admin()
    }
}
