/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! Core types for FIX session operations.
//!
//! This module provides the fundamental types used throughout the KeelFix
//! engine:
//! - [`SeqNum`]: 32-bit message sequence number
//! - [`SessionId`]: identity tuple keying one counterparty relationship
//! - [`CompId`]: component identifier (SenderCompID, TargetCompID)
//! - [`Direction`]: send/receive direction of a stored message
//! - [`Timestamp`]: FIX-formatted UTC timestamp

use arrayvec::ArrayString;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length for CompID strings in bytes.
pub const COMP_ID_MAX_LEN: usize = 32;

/// FIX message sequence number.
///
/// Sequence numbers are 32-bit unsigned integers that identify messages
/// within a FIX session. They start at 1 and only increase for the lifetime
/// of the session, except on an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct SeqNum(u32);

impl SeqNum {
    /// Creates a new sequence number.
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw sequence number value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns the next sequence number.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Checks if this sequence number is valid (>= 1).
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 1
    }
}

impl Default for SeqNum {
    fn default() -> Self {
        Self(1)
    }
}

impl From<u32> for SeqNum {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<SeqNum> for u32 {
    fn from(seq: SeqNum) -> Self {
        seq.0
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of a stored message relative to this side of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// A message this side sent.
    Sent,
    /// A message this side received.
    Received,
}

impl Direction {
    /// Returns the lowercase name used in store files and log output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Received => "received",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Self::Sent),
            "received" => Ok(Self::Received),
            _ => Err(()),
        }
    }
}

/// Component identifier for FIX sessions.
///
/// Used for SenderCompID (tag 49), TargetCompID (tag 56), and related fields.
/// Maximum length is 32 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct CompId(ArrayString<COMP_ID_MAX_LEN>);

impl CompId {
    /// Creates a new CompId from a string slice.
    ///
    /// # Returns
    /// `Some(CompId)` if the string fits within the maximum length, `None`
    /// otherwise.
    #[must_use]
    pub fn new(s: &str) -> Option<Self> {
        ArrayString::from(s).ok().map(Self)
    }

    /// Returns the CompId as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the length of the CompId in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the CompId is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for CompId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CompId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CompId {
    type Err = arrayvec::CapacityError<()>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArrayString::try_from(s)
            .map(Self)
            .map_err(|_| arrayvec::CapacityError::new(()))
    }
}

/// Immutable identity of one FIX session.
///
/// Uniquely keys one counterparty relationship: protocol version plus the
/// sender/target CompID pair, with optional sub IDs. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId {
    /// BeginString (FIX version, tag 8).
    pub begin_string: String,
    /// Sender CompID (tag 49).
    pub sender_comp_id: CompId,
    /// Target CompID (tag 56).
    pub target_comp_id: CompId,
    /// Optional sender sub ID (tag 50).
    pub sender_sub_id: Option<String>,
    /// Optional target sub ID (tag 57).
    pub target_sub_id: Option<String>,
}

impl SessionId {
    /// Creates a new session identity.
    #[must_use]
    pub fn new(begin_string: impl Into<String>, sender: CompId, target: CompId) -> Self {
        Self {
            begin_string: begin_string.into(),
            sender_comp_id: sender,
            target_comp_id: target,
            sender_sub_id: None,
            target_sub_id: None,
        }
    }

    /// Sets the sender sub ID.
    #[must_use]
    pub fn with_sender_sub_id(mut self, sub_id: impl Into<String>) -> Self {
        self.sender_sub_id = Some(sub_id.into());
        self
    }

    /// Sets the target sub ID.
    #[must_use]
    pub fn with_target_sub_id(mut self, sub_id: impl Into<String>) -> Self {
        self.target_sub_id = Some(sub_id.into());
        self
    }

    /// Returns the identity seen from the counterparty's side.
    ///
    /// Used by the acceptor to derive the local session identity from the
    /// comp ids carried in an inbound Logon.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            begin_string: self.begin_string.clone(),
            sender_comp_id: self.target_comp_id.clone(),
            target_comp_id: self.sender_comp_id.clone(),
            sender_sub_id: self.target_sub_id.clone(),
            target_sub_id: self.sender_sub_id.clone(),
        }
    }

    /// Returns a filesystem-safe prefix for per-session store files.
    #[must_use]
    pub fn file_prefix(&self) -> String {
        format!(
            "{}-{}-{}",
            self.begin_string.replace('.', "_"),
            self.sender_comp_id,
            self.target_comp_id
        )
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}->{}",
            self.begin_string, self.sender_comp_id, self.target_comp_id
        )
    }
}

/// FIX protocol timestamp with millisecond precision.
///
/// Wire format: `YYYYMMDD-HH:MM:SS.sss` (UTC), used for SendingTime (tag 52)
/// and OrigSendingTime (tag 122).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Milliseconds since Unix epoch (1970-01-01 00:00:00 UTC).
    millis_since_epoch: u64,
}

impl Timestamp {
    /// Creates a timestamp from milliseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self {
            millis_since_epoch: millis,
        }
    }

    /// Returns the current UTC timestamp.
    #[inline]
    #[must_use]
    pub fn now() -> Self {
        let dt = Utc::now();
        Self {
            millis_since_epoch: dt.timestamp_millis().max(0) as u64,
        }
    }

    /// Returns milliseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.millis_since_epoch
    }

    /// Converts to a chrono `DateTime<Utc>`.
    #[must_use]
    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis_since_epoch as i64)
            .unwrap_or_else(|| DateTime::from_timestamp_millis(0).unwrap())
    }

    /// Formats the timestamp in FIX wire format.
    ///
    /// Format: `YYYYMMDD-HH:MM:SS.sss`
    #[must_use]
    pub fn format_fix(self) -> ArrayString<21> {
        let dt = self.to_datetime();
        let mut buf = ArrayString::new();
        let _ = std::fmt::write(
            &mut buf,
            format_args!("{}", dt.format("%Y%m%d-%H:%M:%S%.3f")),
        );
        buf
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            millis_since_epoch: dt.timestamp_millis().max(0) as u64,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_fix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_num_operations() {
        let seq = SeqNum::new(5);
        assert_eq!(seq.value(), 5);
        assert_eq!(seq.next().value(), 6);
        assert!(seq.is_valid());
        assert!(!SeqNum::new(0).is_valid());
    }

    #[test]
    fn test_seq_num_default() {
        assert_eq!(SeqNum::default().value(), 1);
    }

    #[test]
    fn test_direction_roundtrip() {
        assert_eq!("sent".parse::<Direction>(), Ok(Direction::Sent));
        assert_eq!("received".parse::<Direction>(), Ok(Direction::Received));
        assert!("outbound".parse::<Direction>().is_err());
        assert_eq!(Direction::Sent.to_string(), "sent");
    }

    #[test]
    fn test_comp_id() {
        let id = CompId::new("VENUE").unwrap();
        assert_eq!(id.as_str(), "VENUE");
        assert_eq!(id.len(), 5);
        assert!(!id.is_empty());
    }

    #[test]
    fn test_comp_id_too_long() {
        let long_str = "A".repeat(COMP_ID_MAX_LEN + 1);
        assert!(CompId::new(&long_str).is_none());
    }

    #[test]
    fn test_session_id_display() {
        let id = SessionId::new(
            "FIX.4.4",
            CompId::new("VENUE").unwrap(),
            CompId::new("CLIENT").unwrap(),
        );
        assert_eq!(id.to_string(), "FIX.4.4:VENUE->CLIENT");
    }

    #[test]
    fn test_session_id_reversed() {
        let id = SessionId::new(
            "FIX.4.4",
            CompId::new("VENUE").unwrap(),
            CompId::new("CLIENT").unwrap(),
        )
        .with_sender_sub_id("DESK");

        let rev = id.reversed();
        assert_eq!(rev.sender_comp_id.as_str(), "CLIENT");
        assert_eq!(rev.target_comp_id.as_str(), "VENUE");
        assert_eq!(rev.target_sub_id.as_deref(), Some("DESK"));
        assert_eq!(rev.reversed(), id);
    }

    #[test]
    fn test_session_id_equality_is_structural() {
        let a = SessionId::new(
            "FIX.4.4",
            CompId::new("A").unwrap(),
            CompId::new("B").unwrap(),
        );
        let b = SessionId::new(
            "FIX.4.4",
            CompId::new("A").unwrap(),
            CompId::new("B").unwrap(),
        );
        assert_eq!(a, b);
        assert_ne!(a, a.clone().with_sender_sub_id("X"));
    }

    #[test]
    fn test_session_id_file_prefix() {
        let id = SessionId::new(
            "FIX.4.4",
            CompId::new("VENUE").unwrap(),
            CompId::new("CLIENT").unwrap(),
        );
        assert_eq!(id.file_prefix(), "FIX_4_4-VENUE-CLIENT");
    }

    #[test]
    fn test_timestamp_format() {
        let ts = Timestamp::from_millis(0);
        assert!(ts.format_fix().starts_with("19700101-00:00:00"));
        assert_eq!(ts.as_millis(), 0);
    }
}
