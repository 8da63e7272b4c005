/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! # KeelFix Engine
//!
//! Acceptor-side FIX engine for the KeelFix session layer.
//!
//! This crate provides:
//! - **Acceptor**: binds TCP endpoints and serves inbound connections
//! - **Session registry**: one durable session slot per counterparty
//! - **Application trait**: callback interface for session lifecycle and
//!   message events
//! - **Settings**: in-memory engine configuration

pub mod acceptor;
pub mod application;
pub mod error;
pub mod registry;
pub mod settings;

mod connection;

pub use acceptor::Acceptor;
pub use application::{Application, NoOpApplication, RejectReason};
pub use error::EngineError;
pub use registry::{SessionHandle, SessionRegistry};
pub use settings::EngineSettings;
