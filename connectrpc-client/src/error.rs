//! Client-side Connect protocol error types.
//!
//! This module provides [`ClientError`], the error type for every fallible
//! client operation.

use connectrpc_core::{Code, EnvelopeError, ErrorDetail};

use crate::response::Metadata;

/// Client-side Connect protocol error variants.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ClientError {
    /// A server-reported error, or a protocol failure assigned a canonical code.
    #[error("{code}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status {
        code: Code,
        message: Option<String>,
        details: Vec<ErrorDetail>,
        metadata: Metadata,
    },

    /// Malformed end-of-stream message, or a stream that ended without one.
    #[error("invalid stream response: {0}")]
    InvalidStreamResponse(String),

    /// An encoded request or received response is larger than allowed.
    #[error("{kind} exceeded maximum size of {max} bytes")]
    MaxBytesExceeded {
        kind: &'static str,
        size: usize,
        max: usize,
    },

    /// The server picked a compression the client never advertised.
    #[error("received unknown compression: {encoding}. Supported encodings are: {accepted:?}")]
    UnknownCompression {
        encoding: String,
        accepted: Vec<String>,
    },

    /// The method is not registered, or cannot be dispatched.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// Trailer or error read before the stream was exhausted.
    #[error("{0}")]
    StreamRead(&'static str),

    /// The call shape cannot be carried by this transport.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Transport-level error (connection failed, aborted read, etc.).
    #[error("transport error: {0}")]
    Transport(String),

    /// Message encoding error.
    #[error("encode error: {0}")]
    Encode(String),

    /// Message decoding error.
    #[error("decode error: {0}")]
    Decode(String),

    /// Envelope framing error.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

impl ClientError {
    /// Create a new status error with a code and message.
    pub fn new<S: Into<String>>(code: Code, message: S) -> Self {
        ClientError::Status {
            code,
            message: Some(message.into()),
            details: vec![],
            metadata: Metadata::empty(),
        }
    }

    /// Create a new status error with just a code.
    pub fn from_code(code: Code) -> Self {
        ClientError::Status {
            code,
            message: None,
            details: vec![],
            metadata: Metadata::empty(),
        }
    }

    pub(crate) fn request_too_large(size: usize, max: usize) -> Self {
        ClientError::MaxBytesExceeded {
            kind: "request",
            size,
            max,
        }
    }

    pub(crate) fn response_too_large(size: usize, max: usize) -> Self {
        ClientError::MaxBytesExceeded {
            kind: "response",
            size,
            max,
        }
    }

    /// Get the error code.
    ///
    /// Variants other than `Status` map to a fixed code:
    /// - Transport: `Unavailable`
    /// - Encode, Decode, UnknownCompression, UnknownMethod, StreamRead: `Internal`
    /// - MaxBytesExceeded: `ResourceExhausted`
    /// - InvalidStreamResponse, Envelope: `Unknown`
    /// - NotSupported: `Unimplemented`
    pub fn code(&self) -> Code {
        match self {
            ClientError::Status { code, .. } => *code,
            ClientError::Transport(_) => Code::Unavailable,
            ClientError::Encode(_)
            | ClientError::Decode(_)
            | ClientError::UnknownCompression { .. }
            | ClientError::UnknownMethod(_)
            | ClientError::StreamRead(_) => Code::Internal,
            ClientError::MaxBytesExceeded { .. } => Code::ResourceExhausted,
            ClientError::InvalidStreamResponse(_) | ClientError::Envelope(_) => Code::Unknown,
            ClientError::NotSupported(_) => Code::Unimplemented,
        }
    }

    /// Get the error message, if the variant carries one.
    pub fn message(&self) -> Option<&str> {
        match self {
            ClientError::Status { message, .. } => message.as_deref(),
            ClientError::InvalidStreamResponse(msg)
            | ClientError::UnknownMethod(msg)
            | ClientError::NotSupported(msg)
            | ClientError::Transport(msg)
            | ClientError::Encode(msg)
            | ClientError::Decode(msg) => Some(msg),
            ClientError::StreamRead(msg) => Some(*msg),
            _ => None,
        }
    }

    /// Get the error details (only for Status variant).
    pub fn details(&self) -> &[ErrorDetail] {
        match self {
            ClientError::Status { details, .. } => details,
            _ => &[],
        }
    }

    /// Get the metadata attached to a server-reported error.
    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            ClientError::Status { metadata, .. } => Some(metadata),
            _ => None,
        }
    }

    /// Add a pre-constructed ErrorDetail.
    pub fn add_error_detail(mut self, detail: ErrorDetail) -> Self {
        if let ClientError::Status { details, .. } = &mut self {
            details.push(detail);
        }
        self
    }

    /// Replace the metadata of a status error.
    pub fn with_metadata(mut self, value: Metadata) -> Self {
        if let ClientError::Status { metadata, .. } = &mut self {
            *metadata = value;
        }
        self
    }

    /// Returns whether this error indicates a transient condition that may
    /// be resolved by retrying.
    ///
    /// This is a convenience wrapper for [`Code::is_retryable()`].
    ///
    /// # Example
    ///
    /// ```
    /// use connectrpc_client::ClientError;
    /// use connectrpc_core::Code;
    ///
    /// let err = ClientError::new(Code::Unavailable, "service overloaded");
    /// assert!(err.is_retryable());
    ///
    /// let err = ClientError::new(Code::NotFound, "resource missing");
    /// assert!(!err.is_retryable());
    ///
    /// // Transport errors are also retryable (they map to Unavailable)
    /// let err = ClientError::Transport("connection reset".into());
    /// assert!(err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_new() {
        let err = ClientError::new(Code::NotFound, "resource not found");
        assert_eq!(err.code(), Code::NotFound);
        assert_eq!(err.message(), Some("resource not found"));
        assert!(err.details().is_empty());
        assert!(err.metadata().unwrap().is_empty());
        assert_eq!(err.to_string(), "not_found: resource not found");
    }

    #[test]
    fn test_client_error_from_code() {
        let err = ClientError::from_code(Code::Internal);
        assert_eq!(err.code(), Code::Internal);
        assert!(err.message().is_none());
        assert_eq!(err.to_string(), "internal");
    }

    #[test]
    fn test_client_error_variants_code() {
        let cases = [
            (ClientError::Transport("refused".into()), Code::Unavailable),
            (ClientError::Encode("bad".into()), Code::Internal),
            (ClientError::Decode("bad".into()), Code::Internal),
            (ClientError::request_too_large(10, 0), Code::ResourceExhausted),
            (
                ClientError::UnknownCompression {
                    encoding: "gzip".into(),
                    accepted: vec![],
                },
                Code::Internal,
            ),
            (ClientError::UnknownMethod("Nope".into()), Code::Internal),
            (ClientError::StreamRead("early"), Code::Internal),
            (
                ClientError::InvalidStreamResponse("truncated".into()),
                Code::Unknown,
            ),
            (
                ClientError::Envelope(EnvelopeError::MissingCompression),
                Code::Unknown,
            ),
            (ClientError::NotSupported("bidi".into()), Code::Unimplemented),
        ];

        for (err, code) in cases {
            assert_eq!(err.code(), code, "{err}");
        }
    }

    #[test]
    fn test_max_bytes_exceeded_display() {
        assert_eq!(
            ClientError::request_too_large(5, 0).to_string(),
            "request exceeded maximum size of 0 bytes"
        );
        assert_eq!(
            ClientError::response_too_large(5, 4).to_string(),
            "response exceeded maximum size of 4 bytes"
        );
    }

    #[test]
    fn test_unknown_compression_display() {
        let err = ClientError::UnknownCompression {
            encoding: "gzip".into(),
            accepted: vec![],
        };
        assert_eq!(
            err.to_string(),
            "received unknown compression: gzip. Supported encodings are: []"
        );

        let err = ClientError::UnknownCompression {
            encoding: "br".into(),
            accepted: vec!["gzip".into()],
        };
        assert_eq!(
            err.to_string(),
            r#"received unknown compression: br. Supported encodings are: ["gzip"]"#
        );
    }

    #[test]
    fn test_client_error_add_detail() {
        let err = ClientError::new(Code::Internal, "error")
            .add_error_detail(ErrorDetail::new("test.Type", vec![1, 2, 3]));

        assert_eq!(err.details().len(), 1);
        assert_eq!(err.details()[0].type_url(), "test.Type");
        assert_eq!(err.details()[0].value(), &[1, 2, 3]);

        // Details only attach to status errors
        let err = ClientError::Transport("down".into())
            .add_error_detail(ErrorDetail::new("test.Type", vec![]));
        assert!(err.details().is_empty());
    }

    #[test]
    fn test_client_error_is_retryable() {
        assert!(ClientError::new(Code::Unavailable, "").is_retryable());
        assert!(ClientError::new(Code::ResourceExhausted, "").is_retryable());
        assert!(ClientError::new(Code::Aborted, "").is_retryable());
        assert!(ClientError::Transport("reset".into()).is_retryable());
        assert!(ClientError::response_too_large(2, 1).is_retryable());

        assert!(!ClientError::new(Code::NotFound, "").is_retryable());
        assert!(!ClientError::InvalidStreamResponse("x".into()).is_retryable());
        assert!(!ClientError::NotSupported("bidi".into()).is_retryable());
    }

    #[test]
    fn test_envelope_error_conversion() {
        let err: ClientError = EnvelopeError::IncompleteHeader {
            expected: 5,
            actual: 2,
        }
        .into();

        assert!(matches!(err, ClientError::Envelope(_)));
        assert_eq!(
            err.to_string(),
            "incomplete envelope header: expected 5 bytes, got 2"
        );
    }
}
