/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! Session status.
//!
//! A session object persists for the lifetime of the engine and survives
//! disconnects, so its connection state is runtime data rather than a type
//! parameter. Transitions are validated at runtime by
//! [`SessionStatus::can_transition_to`].

use std::fmt;

/// Connection state of a FIX session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionStatus {
    /// No connection is bound to the session.
    #[default]
    Disconnected,
    /// A connection is bound; awaiting the Logon exchange.
    LogonPending,
    /// Logon exchange completed; normal traffic flows.
    LoggedOn,
    /// Logout sent; awaiting the peer's confirming Logout.
    LogoutPending,
}

impl SessionStatus {
    /// Returns true if a connection is currently bound to the session.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Returns true if application traffic may be sent.
    #[must_use]
    pub const fn is_logged_on(self) -> bool {
        matches!(self, Self::LoggedOn)
    }

    /// Checks whether a transition to `next` is legal.
    ///
    /// Any state may fall back to `Disconnected` (transport loss is always
    /// possible); forward transitions follow the logon/logout handshake.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (_, Self::Disconnected)
                | (Self::Disconnected, Self::LogonPending)
                | (Self::LogonPending, Self::LoggedOn)
                | (Self::LoggedOn, Self::LogoutPending)
        )
    }

    /// Returns the status name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::LogonPending => "logon-pending",
            Self::LoggedOn => "logged-on",
            Self::LogoutPending => "logout-pending",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
