/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! Engine-level errors.
//!
//! Startup failures (configuration, binding) surface from `start()`; runtime
//! session failures never propagate past the session that raised them.

use keelfix_core::error::{ConfigError, SessionError, StoreError};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors surfaced by the engine API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Engine configuration rejected at startup.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A listen endpoint could not be bound.
    #[error("failed to bind {addr}: {reason}")]
    Bind {
        /// The endpoint that failed to bind.
        addr: SocketAddr,
        /// The underlying bind failure.
        reason: String,
    },

    /// A message or connection referenced a session that is not configured.
    #[error("unknown session: {id}")]
    UnknownSession {
        /// The session identity that missed the registry.
        id: String,
    },

    /// A send was attempted while the session has no bound connection.
    #[error("session not connected: {id}")]
    NotConnected {
        /// The session that has no active connection.
        id: String,
    },

    /// A session-layer failure.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// A store failure during engine setup.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
