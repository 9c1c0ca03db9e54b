//! Connect protocol client for Rust.
//!
//! This crate speaks the Connect protocol over HTTP/1.1 with protobuf
//! payloads.
//!
//! ## Features
//!
//! - Unary RPC calls (request-response)
//! - Server streaming and client streaming RPC calls
//! - Request compression with a size threshold, response decompression
//! - Header and trailer metadata on both call shapes
//! - Request and response size limits
//!
//! Bidirectional streaming needs a full-duplex connection and is rejected
//! with [`ClientError::NotSupported`].
//!
//! ## Example
//!
//! ```ignore
//! use connectrpc_client::{Cardinality, Client, HyperClient, ServiceDescriptor, Transport};
//! use futures::StreamExt;
//!
//! let service = ServiceDescriptor::builder("connectrpc.eliza.v1.ElizaService")
//!     .rpc("Say", Cardinality::Unary, Cardinality::Unary)
//!     .rpc("Introduce", Cardinality::Unary, Cardinality::Stream)
//!     .build();
//!
//! let transport = Transport::builder("http://localhost:8080").build(HyperClient::new())?;
//! let client = Client::new(transport, service);
//!
//! // Unary
//! let say = client.method::<SayRequest, SayResponse>("Say")?;
//! let response = client.unary(&say, &SayRequest { sentence: "Hi".into() }, Default::default()).await?;
//! println!("{}", response.message().sentence);
//!
//! // Server streaming
//! let introduce = client.method::<IntroduceRequest, IntroduceResponse>("Introduce")?;
//! let mut stream = client
//!     .stream(&introduce, IntroduceRequest { name: "Ada".into() }, Default::default())
//!     .await?;
//!
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(msg) => println!("Got: {}", msg.sentence),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//!
//! // Trailers are available once the stream is drained
//! println!("Trailers: {:?}", stream.trailer()?);
//! ```
//!
//! ## Cancellation and timeouts
//!
//! Dropping a [`StreamResponse`] drops the response body, which closes the
//! connection. The client sets no deadline of its own; configure one on the
//! [`HttpClient`], or send `connect-timeout-ms` through [`CallOptions`].
//!
//! ## Feature Flags
//!
//! | Feature | Description | Dependencies |
//! |---------|-------------|--------------|
//! | `compression-gzip` | Gzip compression (default) | `flate2` |
//! | `compression-deflate` | Deflate compression | `flate2` |
//!
//! ## Observability
//!
//! Each call runs in an `rpc.call` span carrying `rpc.service`, `rpc.method`,
//! `rpc.type` (`unary`, `client_stream`, `server_stream`, `bidi_stream`) and
//! `otel.kind = "client"`. Install any `tracing` subscriber to see them.

mod client;
mod error;
mod error_parser;
mod method;
mod options;
mod request;
mod response;
mod streaming;
pub mod transport;

pub use client::Client;
pub use error::ClientError;
pub use method::{
    Cardinality, MessageCodec, Method, MethodDescriptor, MethodKind, ProstCodec,
    ServiceDescriptor, ServiceDescriptorBuilder,
};
pub use options::CallOptions;
pub use request::Input;
pub use response::{CallResponse, Metadata, UnaryResponse};
pub use streaming::StreamResponse;

pub use transport::{
    HttpClient, HyperClient, HyperClientBuilder, ResponseBody, TowerClient, Transport,
    TransportBody, TransportBuilder,
};

// Re-export core types that users need
pub use connectrpc_core::{BoxedCodec, Code, Codec, ErrorDetail, IdentityCodec};

#[cfg(feature = "compression-gzip")]
pub use connectrpc_core::GzipCodec;

#[cfg(feature = "compression-deflate")]
pub use connectrpc_core::DeflateCodec;

pub use bytes::Bytes;
