/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! Application callback interface.
//!
//! This module defines the callback interface through which the engine
//! notifies application code of session lifecycle and message events,
//! following the QuickFIX pattern with async support. All hooks for one
//! session are invoked from that session's driver task, so implementations
//! observe a serialized execution context per session.

use async_trait::async_trait;
use keelfix_core::message::{OutboundMessage, OwnedMessage};
use keelfix_core::types::SessionId;

/// Reason for rejecting or vetoing a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectReason {
    /// Rejection reason code (tag 373 value).
    pub code: u32,
    /// Human-readable rejection text.
    pub text: String,
    /// Reference tag that caused the rejection.
    pub ref_tag: Option<u32>,
}

impl RejectReason {
    /// Creates a new rejection reason.
    #[must_use]
    pub fn new(code: u32, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
            ref_tag: None,
        }
    }

    /// Sets the reference tag.
    #[must_use]
    pub const fn with_ref_tag(mut self, tag: u32) -> Self {
        self.ref_tag = Some(tag);
        self
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.text, self.code)
    }
}

/// Application callback interface for handling FIX session events.
///
/// Implement this trait to receive lifecycle notifications and to observe,
/// mutate, or veto messages as they cross the session boundary.
#[async_trait]
pub trait Application: Send + Sync {
    /// Called once per configured session when the engine builds its
    /// registry, before any connection exists.
    async fn on_create(&self, session_id: &SessionId);

    /// Called when the logon exchange completes.
    async fn on_logon(&self, session_id: &SessionId);

    /// Called when the session leaves the logged-on state, whether by
    /// orderly logout, timeout, or transport loss. Fired exactly once per
    /// logon.
    async fn on_logout(&self, session_id: &SessionId);

    /// Called before an administrative message is sequenced and sent.
    /// The message body may be mutated; admin sends cannot be vetoed.
    async fn to_admin(&self, message: &mut OutboundMessage, session_id: &SessionId);

    /// Called before an application message is sequenced and sent.
    ///
    /// # Errors
    /// Returning `Err` vetoes the send; no sequence number is consumed and
    /// nothing reaches the wire.
    async fn to_app(
        &self,
        message: &mut OutboundMessage,
        session_id: &SessionId,
    ) -> Result<(), RejectReason>;

    /// Called when an administrative message is received and accepted by the
    /// session layer.
    ///
    /// # Errors
    /// Returning `Err` answers the message with a session-level Reject.
    #[allow(clippy::wrong_self_convention)]
    async fn from_admin(
        &self,
        message: &OwnedMessage,
        session_id: &SessionId,
    ) -> Result<(), RejectReason>;

    /// Called when an application message is received and accepted by the
    /// session layer.
    ///
    /// # Errors
    /// Returning `Err` answers the message with a session-level Reject.
    #[allow(clippy::wrong_self_convention)]
    async fn from_app(
        &self,
        message: &OwnedMessage,
        session_id: &SessionId,
    ) -> Result<(), RejectReason>;
}

/// Default no-op application implementation.
#[derive(Debug, Default)]
pub struct NoOpApplication;

#[async_trait]
impl Application for NoOpApplication {
    async fn on_create(&self, _session_id: &SessionId) {}

    async fn on_logon(&self, _session_id: &SessionId) {}

    async fn on_logout(&self, _session_id: &SessionId) {}

    async fn to_admin(&self, _message: &mut OutboundMessage, _session_id: &SessionId) {}

    async fn to_app(
        &self,
        _message: &mut OutboundMessage,
        _session_id: &SessionId,
    ) -> Result<(), RejectReason> {
        Ok(())
    }

    async fn from_admin(
        &self,
        _message: &OwnedMessage,
        _session_id: &SessionId,
    ) -> Result<(), RejectReason> {
        Ok(())
    }

    async fn from_app(
        &self,
        _message: &OwnedMessage,
        _session_id: &SessionId,
    ) -> Result<(), RejectReason> {
        Ok(())
    }
}
