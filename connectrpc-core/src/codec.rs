//! Compression codecs.
//!
//! The [`Codec`] trait compresses whole unary bodies as well as individual
//! envelope payloads. Built-in implementations:
//! - [`GzipCodec`]: Gzip compression (requires `compression-gzip` feature)
//! - [`DeflateCodec`]: zlib compression (requires `compression-deflate` feature)
//! - [`IdentityCodec`]: passthrough

use bytes::Bytes;
use std::io;
use std::sync::Arc;

#[cfg(any(feature = "compression-gzip", feature = "compression-deflate"))]
use std::io::{Read, Write};

/// A named compression algorithm.
///
/// The name is what appears in `content-encoding`, `accept-encoding` and their
/// `connect-` prefixed streaming counterparts.
///
/// # Example
///
/// ```ignore
/// use connectrpc_core::Codec;
/// use bytes::Bytes;
/// use std::io;
///
/// struct SnappyCodec;
///
/// impl Codec for SnappyCodec {
///     fn name(&self) -> &'static str { "snappy" }
///
///     fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
///         // ... snappy compression
///     }
///
///     fn decompress(&self, data: &[u8]) -> io::Result<Bytes> {
///         // ... snappy decompression
///     }
/// }
/// ```
pub trait Codec: Send + Sync + 'static {
    /// The encoding name for HTTP headers (e.g., "gzip").
    fn name(&self) -> &'static str;

    /// Compress data.
    fn compress(&self, data: &[u8]) -> io::Result<Bytes>;

    /// Decompress data.
    fn decompress(&self, data: &[u8]) -> io::Result<Bytes>;

    /// Decompress at most `limit + 1` bytes of output.
    ///
    /// A result longer than `limit` means the payload is oversized and was cut
    /// short. The default inflates everything and leaves the check to callers.
    fn decompress_limited(&self, data: &[u8], limit: usize) -> io::Result<Bytes> {
        let _ = limit;
        self.decompress(data)
    }
}

/// A shareable, type-erased codec.
///
/// `Option<BoxedCodec>` is used throughout, with `None` meaning identity.
#[derive(Clone)]
pub struct BoxedCodec(Arc<dyn Codec>);

impl BoxedCodec {
    pub fn new<C: Codec>(codec: C) -> Self {
        BoxedCodec(Arc::new(codec))
    }

    /// Get the codec name for HTTP headers.
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    pub fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
        self.0.compress(data)
    }

    pub fn decompress(&self, data: &[u8]) -> io::Result<Bytes> {
        self.0.decompress(data)
    }

    /// See [`Codec::decompress_limited`].
    pub fn decompress_limited(&self, data: &[u8], limit: usize) -> io::Result<Bytes> {
        self.0.decompress_limited(data, limit)
    }

    /// Whether this is the identity codec.
    pub fn is_identity(&self) -> bool {
        self.name() == IdentityCodec.name()
    }
}

impl std::fmt::Debug for BoxedCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BoxedCodec").field(&self.name()).finish()
    }
}

impl PartialEq for BoxedCodec {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

/// Gzip codec using flate2.
///
/// Requires the `compression-gzip` feature.
#[cfg(feature = "compression-gzip")]
#[derive(Debug, Clone, Copy)]
pub struct GzipCodec {
    /// Compression level (0-9). Default is 6.
    pub level: u32,
}

#[cfg(feature = "compression-gzip")]
impl Default for GzipCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

#[cfg(feature = "compression-gzip")]
impl GzipCodec {
    /// Level ranges from 0 (no compression) to 9 (best compression).
    pub fn with_level(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }
}

#[cfg(feature = "compression-gzip")]
impl Codec for GzipCodec {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
        use flate2::write::GzEncoder;
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::new(self.level));
        encoder.write_all(data)?;
        Ok(Bytes::from(encoder.finish()?))
    }

    fn decompress(&self, data: &[u8]) -> io::Result<Bytes> {
        use flate2::read::GzDecoder;
        let mut decoder = GzDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        Ok(Bytes::from(decompressed))
    }

    fn decompress_limited(&self, data: &[u8], limit: usize) -> io::Result<Bytes> {
        use flate2::read::GzDecoder;
        read_limited(GzDecoder::new(data), limit)
    }
}

/// Deflate codec using flate2 (zlib format, RFC 1950).
///
/// Requires the `compression-deflate` feature.
#[cfg(feature = "compression-deflate")]
#[derive(Debug, Clone, Copy)]
pub struct DeflateCodec {
    /// Compression level (0-9). Default is 6.
    pub level: u32,
}

#[cfg(feature = "compression-deflate")]
impl Default for DeflateCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

#[cfg(feature = "compression-deflate")]
impl Codec for DeflateCodec {
    fn name(&self) -> &'static str {
        "deflate"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
        use flate2::write::ZlibEncoder;
        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::new(self.level));
        encoder.write_all(data)?;
        Ok(Bytes::from(encoder.finish()?))
    }

    fn decompress(&self, data: &[u8]) -> io::Result<Bytes> {
        use flate2::read::ZlibDecoder;
        let mut decoder = ZlibDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        Ok(Bytes::from(decompressed))
    }

    fn decompress_limited(&self, data: &[u8], limit: usize) -> io::Result<Bytes> {
        use flate2::read::ZlibDecoder;
        read_limited(ZlibDecoder::new(data), limit)
    }
}

/// Drain `reader`, stopping one byte past `limit`.
#[cfg(any(feature = "compression-gzip", feature = "compression-deflate"))]
fn read_limited<R: Read>(reader: R, limit: usize) -> io::Result<Bytes> {
    let mut decompressed = Vec::new();
    reader
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut decompressed)?;
    Ok(Bytes::from(decompressed))
}

/// Identity codec (no compression).
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl Codec for IdentityCodec {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Bytes> {
        Ok(Bytes::copy_from_slice(data))
    }

    fn decompress(&self, data: &[u8]) -> io::Result<Bytes> {
        Ok(Bytes::copy_from_slice(data))
    }
}

/// Look up a built-in codec by its header name.
///
/// Returns `None` for names this build does not support.
pub fn builtin_codec(name: &str) -> Option<BoxedCodec> {
    match name {
        "identity" => Some(BoxedCodec::new(IdentityCodec)),
        #[cfg(feature = "compression-gzip")]
        "gzip" => Some(BoxedCodec::new(GzipCodec::default())),
        #[cfg(feature = "compression-deflate")]
        "deflate" => Some(BoxedCodec::new(DeflateCodec::default())),
        _ => None,
    }
}
