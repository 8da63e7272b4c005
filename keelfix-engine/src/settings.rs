/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! Engine configuration.
//!
//! Settings are built in memory by the embedding application; there is no
//! config-file parser.

use keelfix_core::error::ConfigError;
use keelfix_session::SessionConfig;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level engine configuration: where to listen, which counterparty
/// sessions to accept, and where to persist them.
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    /// Endpoints the acceptor listens on.
    pub listen_addrs: Vec<SocketAddr>,
    /// The configured sessions.
    pub sessions: Vec<SessionConfig>,
    /// Directory for per-session file stores; `None` keeps sessions in
    /// memory only.
    pub store_dir: Option<PathBuf>,
}

impl EngineSettings {
    /// Creates empty settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listen endpoint.
    #[must_use]
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addrs.push(addr);
        self
    }

    /// Adds a session.
    #[must_use]
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.sessions.push(session);
        self
    }

    /// Sets the store directory, enabling durable file stores.
    #[must_use]
    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = Some(dir.into());
        self
    }

    /// Validates the settings.
    ///
    /// # Errors
    /// Returns `ConfigError` if no endpoints or sessions are configured,
    /// two sessions share an identity, or a per-session value is unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addrs.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        if self.sessions.is_empty() {
            return Err(ConfigError::NoSessions);
        }

        let mut seen = HashSet::new();
        for session in &self.sessions {
            let id = session.session_id();
            if !seen.insert(id.clone()) {
                return Err(ConfigError::DuplicateSession { id: id.to_string() });
            }
            if session.heartbeat_interval.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: "heartbeat_interval".to_string(),
                    reason: format!("must be non-zero for {id}"),
                });
            }
            if session.timeout_multiplier == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "timeout_multiplier".to_string(),
                    reason: format!("must be non-zero for {id}"),
                });
            }
            if session.max_message_size == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "max_message_size".to_string(),
                    reason: format!("must be non-zero for {id}"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keelfix_core::types::CompId;
    use std::time::Duration;

    fn session(sender: &str, target: &str) -> SessionConfig {
        SessionConfig::new(
            CompId::new(sender).unwrap(),
            CompId::new(target).unwrap(),
            "FIX.4.4",
        )
    }

    fn listen() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_valid_settings() {
        let settings = EngineSettings::new()
            .with_listen_addr(listen())
            .with_session(session("VENUE", "CLIENT"));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_no_endpoints() {
        let settings = EngineSettings::new().with_session(session("VENUE", "CLIENT"));
        assert_eq!(settings.validate(), Err(ConfigError::NoEndpoints));
    }

    #[test]
    fn test_no_sessions() {
        let settings = EngineSettings::new().with_listen_addr(listen());
        assert_eq!(settings.validate(), Err(ConfigError::NoSessions));
    }

    #[test]
    fn test_duplicate_session() {
        let settings = EngineSettings::new()
            .with_listen_addr(listen())
            .with_session(session("VENUE", "CLIENT"))
            .with_session(session("VENUE", "CLIENT"));
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::DuplicateSession { .. })
        ));
    }

    #[test]
    fn test_zero_heartbeat_rejected() {
        let settings = EngineSettings::new()
            .with_listen_addr(listen())
            .with_session(
                session("VENUE", "CLIENT").with_heartbeat_interval(Duration::ZERO),
            );
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "heartbeat_interval"
        ));
    }
}
