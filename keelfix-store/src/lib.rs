/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! # KeelFix Store
//!
//! Durable per-session message persistence for the KeelFix session engine.
//!
//! This crate provides:
//! - **MessageStore trait**: Append-only, per-direction message log with
//!   gapless-history enforcement and sequence counter persistence
//! - **MemoryStore**: In-memory store for testing and non-durable use
//! - **FileStore**: File-backed store that is durable before acknowledging
//!   (write-then-sync), resumable across restarts

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::MessageStore;
