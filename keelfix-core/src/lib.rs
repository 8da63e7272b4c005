/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! # KeelFix Core
//!
//! Core types, traits, and error definitions for the KeelFix session engine.
//!
//! This crate provides the fundamental building blocks used across all
//! KeelFix crates:
//! - **Error types**: Unified error handling with `thiserror`
//! - **Field access**: `FieldRef` and the standard session-layer tag numbers
//! - **Message types**: `RawMessage`, `OwnedMessage`, `OutboundMessage`
//! - **Core types**: `SeqNum`, `SessionId`, `CompId`, `Direction`, `Timestamp`
//!
//! ## Zero-Copy Design
//!
//! Inbound messages are parsed into borrowed views (`RawMessage`) on the hot
//! path and converted to owned representations (`OwnedMessage`) only when they
//! cross a task boundary or enter the message store.

pub mod error;
pub mod field;
pub mod message;
pub mod types;

pub use error::{ConfigError, DecodeError, FixError, Result, SessionError, StoreError};
pub use field::{FieldRef, tags};
pub use message::{MsgType, OutboundMessage, OwnedMessage, RawMessage};
pub use types::{CompId, Direction, SeqNum, SessionId, Timestamp};
