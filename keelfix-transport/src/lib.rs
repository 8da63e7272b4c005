/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/5/26
******************************************************************************/

//! # KeelFix Transport
//!
//! TCP transport layer for the KeelFix engine: a tokio codec that frames
//! FIX messages out of a byte stream using BeginString, BodyLength, and
//! CheckSum.

pub mod codec;

pub use codec::{CodecError, FixCodec};
