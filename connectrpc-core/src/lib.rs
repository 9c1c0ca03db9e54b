//! Core protocol types for Connect RPC clients.
//!
//! This crate holds the transport-agnostic pieces of the protocol that the
//! client crate (`connectrpc-client`) builds on.
//!
//! ## Modules
//!
//! - [`error`]: Protocol error codes and error types
//! - [`codec`]: Compression codec trait and implementations
//! - [`compression`]: Request compression policy and header names
//! - [`envelope`]: Streaming envelope framing functions

mod codec;
mod compression;
mod envelope;
mod error;

pub use codec::*;
pub use compression::*;
pub use envelope::*;
pub use error::*;
