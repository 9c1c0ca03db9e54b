//! Hyper-based HTTP/1.1 client.
//!
//! This module provides [`HyperClient`], the bundled [`HttpClient`]
//! implementation using hyper_util's legacy client over plain TCP.

use std::time::Duration;

use futures::future::BoxFuture;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::{TokioExecutor, TokioTimer};

use super::HttpClient;
use super::body::{ResponseBody, TransportBody, boxed_response_body};
use crate::ClientError;

/// HTTP client using hyper_util's legacy client, with connection pooling.
///
/// # Example
///
/// ```ignore
/// use connectrpc_client::{HyperClient, Transport};
/// use std::time::Duration;
///
/// let http = HyperClient::builder()
///     .pool_idle_timeout(Duration::from_secs(60))
///     .build();
///
/// let transport = Transport::builder("http://localhost:8080").build(http)?;
/// ```
#[derive(Clone)]
pub struct HyperClient {
    client: Client<HttpConnector, TransportBody>,
}

impl std::fmt::Debug for HyperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperClient").finish_non_exhaustive()
    }
}

impl HyperClient {
    pub fn builder() -> HyperClientBuilder {
        HyperClientBuilder::new()
    }

    /// Create a new client with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }
}

impl Default for HyperClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for HyperClient {
    fn send(
        &self,
        request: http::Request<TransportBody>,
    ) -> BoxFuture<'static, Result<http::Response<ResponseBody>, ClientError>> {
        let client = self.client.clone();
        Box::pin(async move {
            let response = client
                .request(request)
                .await
                .map_err(|e| ClientError::Transport(format!("request failed: {}", e)))?;
            Ok(response.map(boxed_response_body))
        })
    }
}

/// Builder for [`HyperClient`].
#[derive(Debug)]
pub struct HyperClientBuilder {
    /// Connection pool idle timeout.
    pool_idle_timeout: Option<Duration>,
    /// Maximum idle connections per host.
    pool_max_idle_per_host: usize,
}

impl Default for HyperClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperClientBuilder {
    pub fn new() -> Self {
        Self {
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }

    /// Set the connection pool idle timeout.
    ///
    /// Default: 90 seconds.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Keep idle connections open indefinitely.
    pub fn pool_idle_timeout_none(mut self) -> Self {
        self.pool_idle_timeout = None;
        self
    }

    /// Set the maximum number of idle connections per host.
    ///
    /// Default: 32.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    pub fn build(self) -> HyperClient {
        let mut builder = Client::builder(TokioExecutor::new());

        // Required for pool_idle_timeout to take effect
        builder.pool_timer(TokioTimer::new());

        if let Some(timeout) = self.pool_idle_timeout {
            builder.pool_idle_timeout(timeout);
        }
        builder.pool_max_idle_per_host(self.pool_max_idle_per_host);

        HyperClient {
            client: builder.build(HttpConnector::new()),
        }
    }
}
