//! Connect protocol error codes and types.
//!
//! This module provides the core error types used by the Connect protocol:
//! - [`Code`]: Protocol status codes and their HTTP/name lookups
//! - [`ErrorDetail`]: Self-describing error details
//! - [`EnvelopeError`]: Envelope framing errors

use std::fmt;
use std::str::FromStr;

use base64::Engine;

/// Connect RPC error codes, matching the codes defined in the Connect protocol.
///
/// Two codes are equal when both their name and numeric value match, which for
/// a fieldless enum is plain variant equality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Code {
    Ok = 0,
    Canceled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Code {
    /// All canonical codes, ordered by value.
    pub const ALL: [Code; 17] = [
        Code::Ok,
        Code::Canceled,
        Code::Unknown,
        Code::InvalidArgument,
        Code::DeadlineExceeded,
        Code::NotFound,
        Code::AlreadyExists,
        Code::PermissionDenied,
        Code::ResourceExhausted,
        Code::FailedPrecondition,
        Code::Aborted,
        Code::OutOfRange,
        Code::Unimplemented,
        Code::Internal,
        Code::Unavailable,
        Code::DataLoss,
        Code::Unauthenticated,
    ];

    /// Get the string representation of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::Ok => "ok",
            Code::Canceled => "canceled",
            Code::Unknown => "unknown",
            Code::InvalidArgument => "invalid_argument",
            Code::DeadlineExceeded => "deadline_exceeded",
            Code::NotFound => "not_found",
            Code::AlreadyExists => "already_exists",
            Code::PermissionDenied => "permission_denied",
            Code::ResourceExhausted => "resource_exhausted",
            Code::FailedPrecondition => "failed_precondition",
            Code::Aborted => "aborted",
            Code::OutOfRange => "out_of_range",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal",
            Code::Unavailable => "unavailable",
            Code::DataLoss => "data_loss",
            Code::Unauthenticated => "unauthenticated",
        }
    }

    /// Get the numeric value of this code.
    pub fn value(&self) -> u32 {
        *self as u32
    }

    /// Map an HTTP status code to a Connect code.
    ///
    /// This is the fixed table used when a response does not carry a Connect
    /// error code of its own. Statuses outside the table map to
    /// [`Code::Unknown`].
    ///
    /// # Example
    ///
    /// ```
    /// use connectrpc_core::Code;
    ///
    /// assert_eq!(Code::from_http_code(404), Code::NotFound);
    /// assert_eq!(Code::from_http_code(503), Code::Unavailable);
    /// assert_eq!(Code::from_http_code(999), Code::Unknown);
    /// ```
    pub fn from_http_code(status: u16) -> Code {
        match status {
            200 => Code::Ok,
            400 => Code::InvalidArgument,
            401 => Code::Unauthenticated,
            403 => Code::PermissionDenied,
            404 => Code::NotFound,
            408 => Code::DeadlineExceeded,
            409 => Code::Aborted,
            412 => Code::FailedPrecondition,
            413 => Code::ResourceExhausted,
            415 => Code::Internal,
            429 => Code::Unavailable,
            431 => Code::ResourceExhausted,
            502..=504 => Code::Unavailable,
            _ => Code::Unknown,
        }
    }

    /// Look up a code by its canonical name.
    ///
    /// Unrecognized names map to [`Code::Unknown`]; this never fails.
    pub fn from_name(name: &str) -> Code {
        name.parse().unwrap_or(Code::Unknown)
    }

    /// Returns whether this error code indicates a transient condition that may
    /// be resolved by retrying.
    ///
    /// The following codes are considered retryable:
    /// - [`Unavailable`](Code::Unavailable): Service is temporarily unavailable
    /// - [`ResourceExhausted`](Code::ResourceExhausted): Rate limited or quota exceeded
    /// - [`Aborted`](Code::Aborted): Transaction aborted, can be retried
    ///
    /// The client never retries on its own; this is for callers that do.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Code::Unavailable | Code::ResourceExhausted | Code::Aborted
        )
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`Code`] from a string fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseCodeError(());

impl fmt::Display for ParseCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown error code")
    }
}

impl std::error::Error for ParseCodeError {}

impl FromStr for Code {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Code::ALL
            .iter()
            .find(|code| code.as_str() == s)
            .copied()
            .ok_or(ParseCodeError(()))
    }
}

/// A self-describing error detail following the Connect protocol.
///
/// Error details are structured Protobuf messages attached to errors,
/// allowing clients to receive strongly-typed error information.
/// This maps to `google.protobuf.Any` on the wire.
///
/// # Wire Format
///
/// Details are serialized as JSON objects with `type` and `value` fields, and
/// an optional `debug` field carrying a JSON rendering of the message:
/// ```json
/// {"type": "google.rpc.RetryInfo", "value": "base64-encoded-protobuf"}
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorDetail {
    /// Fully-qualified type name (e.g., "google.rpc.RetryInfo").
    type_url: String,
    /// Protobuf-encoded message bytes.
    value: Vec<u8>,
    /// Server-provided JSON rendering, if any.
    debug: Option<serde_json::Value>,
}

impl ErrorDetail {
    /// Create a new error detail with a type URL and protobuf-encoded bytes.
    pub fn new<S: Into<String>>(type_url: S, value: Vec<u8>) -> Self {
        Self {
            type_url: type_url.into(),
            value,
            debug: None,
        }
    }

    /// Build a detail from its wire form, decoding the base64 `value`.
    ///
    /// Connect uses unpadded standard base64, but padded input is accepted
    /// too. Returns `None` if the value is not valid base64.
    pub fn from_wire<S: Into<String>>(type_url: S, value: &str) -> Option<Self> {
        let value = base64::engine::general_purpose::STANDARD_NO_PAD
            .decode(value)
            .or_else(|_| base64::engine::general_purpose::STANDARD.decode(value))
            .ok()?;

        Some(Self::new(type_url, value))
    }

    /// Attach the debug JSON rendering.
    pub fn with_debug(mut self, debug: serde_json::Value) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Get the fully-qualified type name.
    pub fn type_url(&self) -> &str {
        &self.type_url
    }

    /// Get the protobuf-encoded value bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Get the debug rendering, if the server sent one.
    pub fn debug(&self) -> Option<&serde_json::Value> {
        self.debug.as_ref()
    }
}

/// Envelope framing errors.
///
/// This error type is used for errors that occur during envelope packing,
/// unpacking and per-frame (de)compression in the Connect streaming protocol.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// Fewer than five header bytes were available.
    #[error("incomplete envelope header: expected {expected} bytes, got {actual}")]
    IncompleteHeader { expected: usize, actual: usize },

    /// The header announced more payload bytes than were available.
    #[error("incomplete envelope payload: expected {expected} bytes, got {actual}")]
    IncompletePayload { expected: usize, actual: usize },

    /// The frame is flagged compressed but no compression was negotiated.
    #[error("received compressed frame but no compression was negotiated")]
    MissingCompression,

    /// A message payload is larger than the reader accepts.
    ///
    /// For compressed frames `size` is a lower bound, since inflation stops
    /// just past `max`.
    #[error("envelope payload of {size} bytes exceeds the {max} byte limit")]
    PayloadExceedsLimit { size: usize, max: usize },

    /// The payload does not fit the 32-bit length prefix.
    #[error("envelope payload of {0} bytes exceeds the 4 GiB frame limit")]
    PayloadTooLarge(usize),

    /// Decompression failed.
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// Compression failed.
    #[error("compression failed: {0}")]
    Compression(String),
}
