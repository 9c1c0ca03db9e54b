//! Request compression policy and protocol header names.

use crate::codec::BoxedCodec;

/// Protocol version header.
pub const HEADER_PROTOCOL_VERSION: &str = "connect-protocol-version";
/// The only protocol version this crate speaks.
pub const PROTOCOL_VERSION: &str = "1";

/// Unary content type for binary protobuf payloads.
pub const CONTENT_TYPE_UNARY_PROTO: &str = "application/proto";
/// Streaming content type for binary protobuf payloads.
pub const CONTENT_TYPE_STREAM_PROTO: &str = "application/connect+proto";

/// Unary body compression.
pub const HEADER_UNARY_CONTENT_ENCODING: &str = "content-encoding";
/// Unary accepted compressions.
pub const HEADER_UNARY_ACCEPT_ENCODING: &str = "accept-encoding";
/// Per-frame compression on streams.
pub const HEADER_STREAM_CONTENT_ENCODING: &str = "connect-content-encoding";
/// Accepted per-frame compressions on streams.
pub const HEADER_STREAM_ACCEPT_ENCODING: &str = "connect-accept-encoding";

/// Prefix that carries trailers as headers on unary HTTP/1.1 exchanges.
pub const UNARY_TRAILER_PREFIX: &str = "trailer-";

/// Wire name of the identity encoding.
pub const COMPRESSION_IDENTITY: &str = "identity";

/// Decides whether an outgoing payload is compressed.
///
/// Payloads of at least `min_bytes` are compressed with `codec`.
#[derive(Clone, Debug)]
pub struct RequestCompression {
    codec: BoxedCodec,
    min_bytes: usize,
}

impl RequestCompression {
    pub fn new(codec: BoxedCodec, min_bytes: usize) -> Self {
        Self { codec, min_bytes }
    }

    pub fn codec(&self) -> &BoxedCodec {
        &self.codec
    }

    pub fn min_bytes(&self) -> usize {
        self.min_bytes
    }

    /// True iff `payload.len() >= min_bytes`.
    pub fn should_compress(&self, payload: &[u8]) -> bool {
        payload.len() >= self.min_bytes
    }
}

/// Join codec names for an accept header, or `identity` when there are none.
pub fn accept_encoding_value(codecs: &[BoxedCodec]) -> String {
    if codecs.is_empty() {
        return COMPRESSION_IDENTITY.to_string();
    }

    codecs
        .iter()
        .map(BoxedCodec::name)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::IdentityCodec;

    fn policy(min_bytes: usize) -> RequestCompression {
        RequestCompression::new(BoxedCodec::new(IdentityCodec), min_bytes)
    }

    #[test]
    fn test_should_compress_threshold_boundary() {
        let policy = policy(4);

        assert!(!policy.should_compress(b"abc"));
        assert!(policy.should_compress(b"abcd"));
        assert!(policy.should_compress(b"abcde"));
    }

    #[test]
    fn test_should_compress_zero_threshold() {
        assert!(policy(0).should_compress(b""));
    }

    #[test]
    fn test_accept_encoding_value() {
        assert_eq!(accept_encoding_value(&[]), "identity");

        let codecs = [BoxedCodec::new(IdentityCodec)];
        assert_eq!(accept_encoding_value(&codecs), "identity");

        #[cfg(feature = "compression-gzip")]
        {
            let codecs = [
                BoxedCodec::new(crate::codec::GzipCodec::default()),
                BoxedCodec::new(IdentityCodec),
            ];
            assert_eq!(accept_encoding_value(&codecs), "gzip,identity");
        }
    }
}
