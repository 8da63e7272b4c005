/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! # KeelFix Tag-Value
//!
//! FIX tag=value envelope encoding and decoding for the KeelFix engine.
//!
//! This crate handles the wire envelope the session layer depends on:
//! SOH-delimited tag=value pairs, the BeginString/BodyLength header, and the
//! CheckSum trailer. It does not interpret business-message dictionaries.
//!
//! ## Features
//!
//! - **Zero-copy parsing**: Field values reference the original buffer
//! - **SIMD-accelerated**: Uses `memchr` for fast delimiter search
//! - **Resend support**: Re-marking of stored messages with PossDupFlag and
//!   OrigSendingTime while recomputing BodyLength and CheckSum

pub mod checksum;
pub mod decoder;
pub mod encoder;

pub use checksum::{calculate_checksum, format_checksum, parse_checksum};
pub use decoder::Decoder;
pub use encoder::{Encoder, mark_poss_dup};
pub use keelfix_core::message::RawMessage;
