//! [`HttpClient`] adapter for tower services.

use std::fmt::Display;

use bytes::Bytes;
use futures::future::{BoxFuture, poll_fn};
use http_body::Body;
use tower_service::Service;

use super::HttpClient;
use super::body::{ResponseBody, TransportBody, boxed_response_body};
use crate::ClientError;

/// Sends requests through any `tower_service::Service`, so a middleware stack
/// can sit between the protocol engine and the wire.
///
/// The service is cloned per request and driven to readiness before use.
///
/// # Example
///
/// ```ignore
/// use connectrpc_client::{TowerClient, Transport};
///
/// let svc = tower::ServiceBuilder::new()
///     .layer(my_auth_layer)
///     .service(my_http_service);
///
/// let transport = Transport::builder("http://localhost:8080").build(TowerClient::new(svc))?;
/// ```
#[derive(Clone, Debug)]
pub struct TowerClient<S> {
    inner: S,
}

impl<S> TowerClient<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, B> HttpClient for TowerClient<S>
where
    S: Service<http::Request<TransportBody>, Response = http::Response<B>>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send,
    S::Error: Display,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Display,
{
    fn send(
        &self,
        request: http::Request<TransportBody>,
    ) -> BoxFuture<'static, Result<http::Response<ResponseBody>, ClientError>> {
        let mut svc = self.inner.clone();
        Box::pin(async move {
            poll_fn(|cx| svc.poll_ready(cx))
                .await
                .map_err(|e| ClientError::Transport(format!("service not ready: {}", e)))?;

            let response = svc
                .call(request)
                .await
                .map_err(|e| ClientError::Transport(format!("request failed: {}", e)))?;

            Ok(response.map(boxed_response_body))
        })
    }
}
