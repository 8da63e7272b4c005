/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! Session configuration.
//!
//! This module provides configuration options for FIX sessions.

use keelfix_core::types::{CompId, SessionId};
use std::time::Duration;

/// Configuration for a FIX session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sender CompID (tag 49).
    pub sender_comp_id: CompId,
    /// Target CompID (tag 56).
    pub target_comp_id: CompId,
    /// FIX version BeginString (e.g., "FIX.4.4").
    pub begin_string: String,
    /// Heartbeat interval.
    pub heartbeat_interval: Duration,
    /// Heartbeat timeout multiplier: the session is considered dead after
    /// `heartbeat_interval * timeout_multiplier` without inbound traffic.
    pub timeout_multiplier: u32,
    /// Whether to reset sequence numbers on logon.
    pub reset_on_logon: bool,
    /// Whether to reset sequence numbers on logout.
    pub reset_on_logout: bool,
    /// Whether to reset sequence numbers on disconnect.
    pub reset_on_disconnect: bool,
    /// Maximum message size in bytes.
    pub max_message_size: usize,
    /// Logon timeout duration.
    pub logon_timeout: Duration,
    /// Logout timeout duration.
    pub logout_timeout: Duration,
    /// Whether to validate incoming message checksums.
    pub validate_checksum: bool,
    /// Optional sender sub ID (tag 50).
    pub sender_sub_id: Option<String>,
    /// Optional target sub ID (tag 57).
    pub target_sub_id: Option<String>,
}

impl SessionConfig {
    /// Creates a new session configuration with required fields.
    #[must_use]
    pub fn new(
        sender_comp_id: CompId,
        target_comp_id: CompId,
        begin_string: impl Into<String>,
    ) -> Self {
        Self {
            sender_comp_id,
            target_comp_id,
            begin_string: begin_string.into(),
            heartbeat_interval: Duration::from_secs(30),
            timeout_multiplier: 2,
            reset_on_logon: false,
            reset_on_logout: false,
            reset_on_disconnect: false,
            max_message_size: 1024 * 1024, // 1MB
            logon_timeout: Duration::from_secs(10),
            logout_timeout: Duration::from_secs(10),
            validate_checksum: true,
            sender_sub_id: None,
            target_sub_id: None,
        }
    }

    /// Returns the identity this configuration describes.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        let mut id = SessionId::new(
            self.begin_string.clone(),
            self.sender_comp_id.clone(),
            self.target_comp_id.clone(),
        );
        if let Some(sub) = &self.sender_sub_id {
            id = id.with_sender_sub_id(sub.clone());
        }
        if let Some(sub) = &self.target_sub_id {
            id = id.with_target_sub_id(sub.clone());
        }
        id
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the heartbeat timeout multiplier.
    #[must_use]
    pub const fn with_timeout_multiplier(mut self, multiplier: u32) -> Self {
        self.timeout_multiplier = multiplier;
        self
    }

    /// Sets whether to reset sequence numbers on logon.
    #[must_use]
    pub const fn with_reset_on_logon(mut self, reset: bool) -> Self {
        self.reset_on_logon = reset;
        self
    }

    /// Sets whether to reset sequence numbers on logout.
    #[must_use]
    pub const fn with_reset_on_logout(mut self, reset: bool) -> Self {
        self.reset_on_logout = reset;
        self
    }

    /// Sets whether to reset sequence numbers on disconnect.
    #[must_use]
    pub const fn with_reset_on_disconnect(mut self, reset: bool) -> Self {
        self.reset_on_disconnect = reset;
        self
    }

    /// Sets the maximum message size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Sets the logon timeout.
    #[must_use]
    pub fn with_logon_timeout(mut self, timeout: Duration) -> Self {
        self.logon_timeout = timeout;
        self
    }

    /// Sets the logout timeout.
    #[must_use]
    pub fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    /// Sets whether to validate incoming checksums.
    #[must_use]
    pub const fn with_checksum_validation(mut self, validate: bool) -> Self {
        self.validate_checksum = validate;
        self
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

    /// Returns the heartbeat interval in seconds.
    #[must_use]
    pub fn heartbeat_interval_secs(&self) -> u64 {
        self.heartbeat_interval.as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_new() {
        let sender = CompId::new("VENUE").unwrap();
        let target = CompId::new("CLIENT").unwrap();
        let config = SessionConfig::new(sender, target, "FIX.4.4");

        assert_eq!(config.sender_comp_id.as_str(), "VENUE");
        assert_eq!(config.target_comp_id.as_str(), "CLIENT");
        assert_eq!(config.begin_string, "FIX.4.4");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.timeout_multiplier, 2);
        assert!(config.validate_checksum);
    }

    #[test]
    fn test_session_config_builder_style() {
        let config = SessionConfig::new(
            CompId::new("VENUE").unwrap(),
            CompId::new("CLIENT").unwrap(),
            "FIX.4.2",
        )
        .with_heartbeat_interval(Duration::from_secs(60))
        .with_reset_on_logon(true)
        .with_timeout_multiplier(3);

        assert_eq!(config.begin_string, "FIX.4.2");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(60));
        assert!(config.reset_on_logon);
        assert_eq!(config.timeout_multiplier, 3);
    }

    #[test]
    fn test_session_config_session_id() {
        let config = SessionConfig::new(
            CompId::new("VENUE").unwrap(),
            CompId::new("CLIENT").unwrap(),
            "FIX.4.4",
        )
        .with_sender_sub_id("DESK");

        let id = config.session_id();
        assert_eq!(id.to_string(), "FIX.4.4:VENUE->CLIENT");
        assert_eq!(id.sender_sub_id.as_deref(), Some("DESK"));
    }
}
