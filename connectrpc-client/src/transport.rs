//! HTTP transport layer for Connect RPC client.
//!
//! - [`HttpClient`]: the seam to whatever sends HTTP requests
//! - [`HyperClient`]: bundled HTTP/1.1 client on hyper_util
//! - [`TowerClient`]: adapter for tower services
//! - [`Transport`]: the Connect protocol engine built on an `HttpClient`
//!
//! # Example
//!
//! ```ignore
//! use connectrpc_client::{HyperClient, Transport};
//!
//! let transport = Transport::builder("http://localhost:8080")
//!     .compress_min_bytes(0)
//!     .build(HyperClient::new())?;
//! ```

mod body;
mod connect;
mod hyper;
mod service;

use futures::future::BoxFuture;

pub use body::{ResponseBody, TransportBody, boxed_response_body};
pub use connect::{DEFAULT_COMPRESS_MIN_BYTES, DEFAULT_MAX_BYTES, Transport, TransportBuilder};
pub use hyper::{HyperClient, HyperClientBuilder};
pub use service::TowerClient;

use crate::ClientError;

/// Sends one HTTP request and returns the response with a lazily read body.
///
/// Connection management, TLS and timeouts belong to the implementation.
/// Failures to connect or to read the body surface as
/// [`ClientError::Transport`].
pub trait HttpClient: Send + Sync + 'static {
    fn send(
        &self,
        request: http::Request<TransportBody>,
    ) -> BoxFuture<'static, Result<http::Response<ResponseBody>, ClientError>>;
}

impl<T: HttpClient + ?Sized> HttpClient for std::sync::Arc<T> {
    fn send(
        &self,
        request: http::Request<TransportBody>,
    ) -> BoxFuture<'static, Result<http::Response<ResponseBody>, ClientError>> {
        (**self).send(request)
    }
}
