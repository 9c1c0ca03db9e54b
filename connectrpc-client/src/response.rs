//! Response types for Connect client.
//!
//! - [`Metadata`]: header or trailer map
//! - [`UnaryResponse`]: a single decoded message with its header and trailer
//! - [`CallResponse`]: what [`Client::call`](crate::Client::call) returns

use connectrpc_core::UNARY_TRAILER_PREFIX;
use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};
use std::ops::Deref;

use crate::streaming::StreamResponse;

/// Response of a unary call.
///
/// # Example
///
/// ```ignore
/// let response = client.call(&say, request.into(), CallOptions::new()).await?;
/// let response = response.into_unary().unwrap();
///
/// // Access the message directly via Deref
/// println!("Sentence: {}", response.sentence);
///
/// if let Some(value) = response.trailer().get("x-checksum") {
///     println!("Checksum: {value}");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct UnaryResponse<T> {
    header: Metadata,
    message: T,
    trailer: Metadata,
}

impl<T> UnaryResponse<T> {
    pub fn new(header: Metadata, message: T, trailer: Metadata) -> Self {
        Self {
            header,
            message,
            trailer,
        }
    }

    /// Response headers, with `trailer-` entries removed.
    pub fn header(&self) -> &Metadata {
        &self.header
    }

    /// Trailers, with the `trailer-` prefix stripped.
    pub fn trailer(&self) -> &Metadata {
        &self.trailer
    }

    pub fn message(&self) -> &T {
        &self.message
    }

    /// Extract the message, discarding metadata.
    pub fn into_message(self) -> T {
        self.message
    }

    /// Decompose into header, message and trailer.
    pub fn into_parts(self) -> (Metadata, T, Metadata) {
        (self.header, self.message, self.trailer)
    }

    /// Transform the message, preserving metadata.
    pub fn map<U, F>(self, f: F) -> UnaryResponse<U>
    where
        F: FnOnce(T) -> U,
    {
        UnaryResponse {
            header: self.header,
            message: f(self.message),
            trailer: self.trailer,
        }
    }
}

impl<T> Deref for UnaryResponse<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.message
    }
}

/// Result of [`Client::call`](crate::Client::call), shaped by the method's cardinality.
#[derive(Debug)]
pub enum CallResponse<T> {
    Unary(UnaryResponse<T>),
    Stream(StreamResponse<T>),
}

impl<T> CallResponse<T> {
    /// Response headers, available for both shapes.
    pub fn header(&self) -> &Metadata {
        match self {
            CallResponse::Unary(response) => response.header(),
            CallResponse::Stream(response) => response.header(),
        }
    }

    pub fn into_unary(self) -> Option<UnaryResponse<T>> {
        match self {
            CallResponse::Unary(response) => Some(response),
            CallResponse::Stream(_) => None,
        }
    }

    pub fn into_stream(self) -> Option<StreamResponse<T>> {
        match self {
            CallResponse::Stream(response) => Some(response),
            CallResponse::Unary(_) => None,
        }
    }
}

/// Response metadata wrapper around HTTP headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    headers: HeaderMap,
}

impl Metadata {
    /// Create new metadata from HTTP headers.
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// Create empty metadata.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Split unary response headers into header and trailer maps.
    ///
    /// Entries named `trailer-{key}` move to the trailer map under `{key}`.
    pub fn split_unary_trailers(headers: HeaderMap) -> (Metadata, Metadata) {
        let mut header = HeaderMap::with_capacity(headers.len());
        let mut trailer = HeaderMap::new();

        let mut current: Option<HeaderName> = None;
        for (name, value) in headers {
            // `None` names repeat the previous one
            if let Some(name) = name {
                current = Some(name);
            }
            let Some(name) = current.as_ref() else {
                continue;
            };

            match name.as_str().strip_prefix(UNARY_TRAILER_PREFIX) {
                Some(key) => {
                    if let Ok(key) = HeaderName::from_bytes(key.as_bytes()) {
                        trailer.append(key, value);
                    }
                }
                None => {
                    header.append(name.clone(), value);
                }
            }
        }

        (Metadata::new(header), Metadata::new(trailer))
    }

    /// Get a header value by name.
    ///
    /// Returns `None` if the header is not present or cannot be converted to a string.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }

    /// Check if a header exists.
    pub fn contains(&self, key: &str) -> bool {
        self.headers.contains_key(key)
    }

    /// Get all values for a header (for headers that appear multiple times).
    pub fn get_all(&self, key: &str) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(key)
            .iter()
            .filter_map(|v| v.to_str().ok())
    }

    /// Append a value, skipping names or values that are not valid in HTTP.
    pub(crate) fn append_lossy(&mut self, key: &str, value: &str) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
    }

    /// Get the underlying HeaderMap.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Consume self and return the underlying HeaderMap.
    pub fn into_headers(self) -> HeaderMap {
        self.headers
    }

    /// Get an iterator over all header names and values.
    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &HeaderValue)> {
        self.headers.iter()
    }

    /// Returns true if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Returns the number of values, counting repeated names.
    pub fn len(&self) -> usize {
        self.headers.len()
    }
}

impl From<HeaderMap> for Metadata {
    fn from(headers: HeaderMap) -> Self {
        Self::new(headers)
    }
}

impl From<Metadata> for HeaderMap {
    fn from(metadata: Metadata) -> Self {
        metadata.headers
    }
}
