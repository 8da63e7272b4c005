/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! Error types for the KeelFix session engine.
//!
//! This module provides a unified error hierarchy using `thiserror` for typed,
//! domain-specific errors across all KeelFix operations.
//!
//! Containment policy: session-level errors (`SessionError`, `StoreError`)
//! are scoped to the session that raised them and must never
//! terminate the host process; only `ConfigError` and bind-time failures
//! propagate out of engine startup.

use thiserror::Error;

/// Result type alias using [`FixError`] as the error type.
pub type Result<T> = std::result::Result<T, FixError>;

/// Top-level error type for all KeelFix operations.
#[derive(Debug, Error)]
pub enum FixError {
    /// Error during message decoding.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Error in session layer operations.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Error in message store operations.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error from the underlying system.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that occur during FIX message decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Message buffer is incomplete, need more data.
    #[error("incomplete message, need more data")]
    Incomplete,

    /// Invalid BeginString field (tag 8).
    #[error("invalid begin string: expected 8=FIX.x.y")]
    InvalidBeginString,

    /// Missing BodyLength field (tag 9).
    #[error("missing body length field (tag 9)")]
    MissingBodyLength,

    /// Invalid BodyLength value.
    #[error("invalid body length value")]
    InvalidBodyLength,

    /// Missing MsgType field (tag 35).
    #[error("missing msg type field (tag 35)")]
    MissingMsgType,

    /// Checksum mismatch between calculated and declared values.
    #[error("checksum mismatch: calculated {calculated}, declared {declared}")]
    ChecksumMismatch {
        /// Calculated checksum value.
        calculated: u8,
        /// Declared checksum value in message.
        declared: u8,
    },

    /// Missing required field.
    #[error("missing required field: tag {tag}")]
    MissingRequiredField {
        /// The tag number of the missing field.
        tag: u32,
    },

    /// Invalid field value for the expected type.
    #[error("invalid field value for tag {tag}: {reason}")]
    InvalidFieldValue {
        /// The tag number of the field.
        tag: u32,
        /// Description of why the value is invalid.
        reason: String,
    },

    /// Invalid UTF-8 in string field.
    #[error("invalid utf-8 in field: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Errors in FIX session layer operations.
///
/// Sequence violations are recoverable at the protocol level (resend request
/// or forced logout); a `Store` failure is fatal for the affected session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Session is not in the correct state for the operation.
    #[error("invalid session state: expected {expected}, current {current}")]
    InvalidState {
        /// Expected state for the operation.
        expected: String,
        /// Current session state.
        current: String,
    },

    /// The first message on a connection was not a Logon.
    #[error("first message was not a logon: got msg type {msg_type}")]
    FirstMessageNotLogon {
        /// The message type that was received instead.
        msg_type: String,
    },

    /// Heartbeat timeout - no response to TestRequest.
    #[error("heartbeat timeout after {elapsed_ms} milliseconds")]
    HeartbeatTimeout {
        /// Elapsed time in milliseconds since last inbound message.
        elapsed_ms: u64,
    },

    /// Sequence number lower than expected without PossDupFlag.
    #[error("sequence too low: expected >= {expected}, received {received}")]
    SequenceTooLow {
        /// Minimum expected sequence number.
        expected: u32,
        /// Received sequence number.
        received: u32,
    },

    /// Inbound message is missing its MsgSeqNum field.
    #[error("missing MsgSeqNum (tag 34)")]
    MissingSeqNum,

    /// Resend request for messages that were never persisted.
    #[error("resend request for unavailable range: {begin}..={end}")]
    ResendUnavailable {
        /// Begin sequence number of requested range.
        begin: u32,
        /// End sequence number of requested range.
        end: u32,
    },

    /// Message store failure; fatal for the session.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

/// Errors in message store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Append would break the gapless local history invariant.
    #[error("append out of order for {direction}: expected seq {expected}, got {got}")]
    SequenceGap {
        /// Direction of the rejected append.
        direction: crate::types::Direction,
        /// Sequence number the store expected next.
        expected: u32,
        /// Sequence number that was supplied.
        got: u32,
    },

    /// A requested sequence number below the current counter was never stored.
    #[error("message not found: {direction} seq={seq}")]
    NotFound {
        /// Direction of the missing message.
        direction: crate::types::Direction,
        /// Sequence number of the missing message.
        seq: u32,
    },

    /// Store contents are inconsistent with the index.
    #[error("store corrupted: {reason}")]
    Corrupted {
        /// Description of the corruption.
        reason: String,
    },

    /// I/O error in a persistent store.
    #[error("store i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Errors in engine configuration; fatal at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No sessions were configured.
    #[error("no sessions configured")]
    NoSessions,

    /// No listening endpoints were configured.
    #[error("no listening endpoints configured")]
    NoEndpoints,

    /// Two sessions share the same identity.
    #[error("duplicate session id: {id}")]
    DuplicateSession {
        /// The duplicated session identity.
        id: String,
    },

    /// A setting holds an unusable value.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Name of the offending setting.
        field: String,
        /// Description of the problem.
        reason: String,
    },
}
