//! Call options for per-request configuration.
//!
//! This module provides [`CallOptions`], the caller-supplied headers and
//! trailers of a single RPC.

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::ClientError;

/// Options for configuring individual RPC calls.
///
/// Headers are copied verbatim onto the HTTP request after the protocol
/// headers, so a caller header replaces a protocol header of the same name.
/// Trailers are sent as headers carrying the `trailer-` prefix.
///
/// # Example
///
/// ```
/// use connectrpc_client::CallOptions;
/// use http::{HeaderName, HeaderValue};
///
/// let options = CallOptions::new()
///     .header(HeaderName::from_static("authorization"), HeaderValue::from_static("Bearer token123"))
///     .try_trailer("x-checksum", "abc-123")
///     .unwrap();
///
/// assert_eq!(options.get_headers().len(), 1);
/// assert_eq!(options.get_trailers().len(), 1);
/// ```
///
/// Timeouts are not generated by the client. A caller wanting one sends the
/// `connect-timeout-ms` header itself.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub(crate) headers: HeaderMap,
    pub(crate) trailers: HeaderMap,
}

impl CallOptions {
    /// Create new default call options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a custom header for this call, replacing earlier values.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Try to add a custom header for this call.
    ///
    /// Fails if the header name or value is invalid.
    pub fn try_header<K, V>(self, name: K, value: V) -> Result<Self, ClientError>
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        let (name, value) = parse_pair(name, value)?;
        Ok(self.header(name, value))
    }

    /// Set all custom headers for this call, replacing any existing headers.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Add a trailer for this call, replacing earlier values.
    ///
    /// `name` is given without the `trailer-` prefix.
    pub fn trailer(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.trailers.insert(name, value);
        self
    }

    /// Try to add a trailer for this call.
    pub fn try_trailer<K, V>(self, name: K, value: V) -> Result<Self, ClientError>
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        let (name, value) = parse_pair(name, value)?;
        Ok(self.trailer(name, value))
    }

    /// Get a reference to the custom headers.
    pub fn get_headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a reference to the trailers.
    pub fn get_trailers(&self) -> &HeaderMap {
        &self.trailers
    }

    /// Get a mutable reference to the custom headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Get a mutable reference to the trailers.
    pub fn trailers_mut(&mut self) -> &mut HeaderMap {
        &mut self.trailers
    }
}

fn parse_pair<K, V>(name: K, value: V) -> Result<(HeaderName, HeaderValue), ClientError>
where
    K: TryInto<HeaderName>,
    V: TryInto<HeaderValue>,
{
    let name = name
        .try_into()
        .map_err(|_| ClientError::Encode("invalid header name".into()))?;
    let value = value
        .try_into()
        .map_err(|_| ClientError::Encode(format!("invalid value for header {name}")))?;
    Ok((name, value))
}
