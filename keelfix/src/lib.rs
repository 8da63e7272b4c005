/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! # KeelFix
//!
//! A FIX session-layer engine for Rust.
//!
//! KeelFix implements the administrative core of the FIX protocol: logon and
//! logout handshakes, heartbeat liveness, sequence number management, gap
//! recovery with resend and gap-fill, and durable per-session message
//! stores. Business-message semantics stay with the embedding application.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keelfix::prelude::*;
//! use std::sync::Arc;
//!
//! let settings = EngineSettings::new()
//!     .with_listen_addr("0.0.0.0:5001".parse()?)
//!     .with_session(SessionConfig::new(
//!         CompId::new("VENUE").unwrap(),
//!         CompId::new("CLIENT").unwrap(),
//!         "FIX.4.4",
//!     ));
//!
//! let acceptor = Acceptor::new(settings, Arc::new(MyApplication)).await?;
//! acceptor.start().await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`]: Fundamental types, traits, and error definitions
//! - [`tagvalue`]: Tag=value envelope encoding and decoding
//! - [`session`]: Session layer protocol implementation
//! - [`store`]: Message persistence and storage
//! - [`transport`]: Network transport layer
//! - [`engine`]: Acceptor, registry, and application callbacks

pub mod core {
    //! Core types, traits, and error definitions.
    pub use keelfix_core::*;
}

pub mod tagvalue {
    //! Tag=value envelope encoding and decoding.
    pub use keelfix_tagvalue::*;
}

pub mod session {
    //! Session layer protocol implementation.
    pub use keelfix_session::*;
}

pub mod store {
    //! Message persistence and storage.
    pub use keelfix_store::*;
}

pub mod transport {
    //! Network transport layer.
    pub use keelfix_transport::*;
}

pub mod engine {
    //! Acceptor, registry, and application callbacks.
    pub use keelfix_engine::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Core types
    pub use keelfix_core::{
        CompId, DecodeError, Direction, FixError, MsgType, OutboundMessage,
        OwnedMessage, RawMessage, Result, SeqNum, SessionError, SessionId, StoreError, Timestamp,
    };

    // Tag-value encoding
    pub use keelfix_tagvalue::{Decoder, Encoder, calculate_checksum};

    // Session
    pub use keelfix_session::{
        HeartbeatManager, SequenceManager, SessionConfig, SessionCore, SessionEvent, SessionStatus,
    };

    // Store
    pub use keelfix_store::{FileStore, MemoryStore, MessageStore};

    // Transport
    pub use keelfix_transport::{CodecError, FixCodec};

    // Engine
    pub use keelfix_engine::{
        Acceptor, Application, EngineError, EngineSettings, NoOpApplication, RejectReason,
    };
}
