/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! # KeelFix Session
//!
//! FIX session layer protocol implementation for the KeelFix engine.
//!
//! This crate provides:
//! - **Session core**: the per-session protocol engine that consumes inbound
//!   messages and timer ticks and emits session events
//! - **Sequence management**: atomic sequence number handling
//! - **Heartbeat handling**: Heartbeat/TestRequest liveness logic
//! - **Recovery**: gap detection, resend requests, and stored-message replay
//! - **Configuration**: per-session configuration options

pub mod config;
pub mod heartbeat;
pub mod sequence;
pub mod session;
pub mod state;

pub use config::SessionConfig;
pub use heartbeat::HeartbeatManager;
pub use sequence::{SequenceManager, SequenceResult};
pub use session::{SessionCore, SessionEvent};
pub use state::SessionStatus;
