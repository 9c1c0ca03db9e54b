//! Connect streaming envelope framing.
//!
//! The Connect protocol uses envelope framing for streaming RPCs:
//!
//! ```text
//! [flags:1][length:4][payload:length]
//! ```
//!
//! Bit 0 of `flags` marks a compressed payload. Bit 1 marks the end-of-stream
//! frame, whose payload is a JSON object rather than an encoded message.
//! [`unpack`] leaves bit 1 for the caller to interpret.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::BoxedCodec;
use crate::error::EnvelopeError;

/// Connect streaming envelope flags.
pub mod envelope_flags {
    /// Regular message (uncompressed).
    pub const MESSAGE: u8 = 0x00;
    /// Compressed message.
    pub const COMPRESSED: u8 = 0x01;
    /// End of stream.
    pub const END_STREAM: u8 = 0x02;
}

/// Envelope header size (flags + length).
pub const ENVELOPE_HEADER_SIZE: usize = 5;

/// Frame `payload` with the given flags, without touching the payload.
pub fn wrap_envelope(flags: u8, payload: &[u8]) -> Result<Bytes, EnvelopeError> {
    let length =
        u32::try_from(payload.len()).map_err(|_| EnvelopeError::PayloadTooLarge(payload.len()))?;

    let mut frame = BytesMut::with_capacity(ENVELOPE_HEADER_SIZE + payload.len());
    frame.put_u8(flags);
    frame.put_u32(length);
    frame.put_slice(payload);
    Ok(frame.freeze())
}

/// Pack a message payload into a frame.
///
/// The payload is sent raw with flags `0` when no codec is configured, when
/// the codec is identity, or when `payload.len() < compress_min_bytes`.
/// Otherwise it is compressed and the compressed flag is set. The decision is
/// made per frame.
pub fn pack(
    payload: &[u8],
    codec: Option<&BoxedCodec>,
    compress_min_bytes: usize,
) -> Result<Bytes, EnvelopeError> {
    match codec {
        Some(codec) if !codec.is_identity() && payload.len() >= compress_min_bytes => {
            let compressed = codec
                .compress(payload)
                .map_err(|e| EnvelopeError::Compression(e.to_string()))?;
            wrap_envelope(envelope_flags::COMPRESSED, &compressed)
        }
        _ => wrap_envelope(envelope_flags::MESSAGE, payload),
    }
}

/// Parse an envelope header from bytes.
///
/// Returns `(flags, length)`.
pub fn parse_envelope_header(data: &[u8]) -> Result<(u8, u32), EnvelopeError> {
    if data.len() < ENVELOPE_HEADER_SIZE {
        return Err(EnvelopeError::IncompleteHeader {
            expected: ENVELOPE_HEADER_SIZE,
            actual: data.len(),
        });
    }

    let flags = data[0];
    let length = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);

    Ok((flags, length))
}

/// Read one frame from the front of `source`.
///
/// Consumes exactly `5 + length` bytes on success and returns the flags with
/// the (decompressed, if bit 0 is set) payload. A truncated frame leaves
/// `source` untouched.
pub fn unpack(
    source: &mut Bytes,
    codec: Option<&BoxedCodec>,
) -> Result<(u8, Bytes), EnvelopeError> {
    unpack_limited(source, codec, usize::MAX)
}

/// Like [`unpack`], but message payloads may not exceed `max_payload` bytes.
///
/// An uncompressed message frame is rejected from its header alone, before
/// the payload is buffered. Compressed payloads are inflated only until they
/// pass the limit. End-of-stream frames are not limited.
pub fn unpack_limited(
    source: &mut Bytes,
    codec: Option<&BoxedCodec>,
    max_payload: usize,
) -> Result<(u8, Bytes), EnvelopeError> {
    let (flags, length) = parse_envelope_header(&source[..])?;
    let length = length as usize;

    let compressed = flags & envelope_flags::COMPRESSED != 0;
    let max_payload = if is_end_stream(flags) { usize::MAX } else { max_payload };
    if !compressed && length > max_payload {
        return Err(EnvelopeError::PayloadExceedsLimit {
            size: length,
            max: max_payload,
        });
    }

    let available = source.len() - ENVELOPE_HEADER_SIZE;
    if available < length {
        return Err(EnvelopeError::IncompletePayload {
            expected: length,
            actual: available,
        });
    }

    let codec = match (compressed, codec) {
        (true, None) => return Err(EnvelopeError::MissingCompression),
        (true, Some(codec)) => Some(codec),
        (false, _) => None,
    };

    source.advance(ENVELOPE_HEADER_SIZE);
    let payload = source.split_to(length);

    let payload = match codec {
        Some(codec) => codec
            .decompress_limited(&payload, max_payload)
            .map_err(|e| EnvelopeError::Decompression(e.to_string()))?,
        None => payload,
    };
    if payload.len() > max_payload {
        return Err(EnvelopeError::PayloadExceedsLimit {
            size: payload.len(),
            max: max_payload,
        });
    }

    Ok((flags, payload))
}

/// Returns the full length of the first frame in `buf` once it is completely
/// buffered, or `None` while more bytes are needed.
pub fn complete_frame_len(buf: &[u8]) -> Option<usize> {
    let (_, length) = parse_envelope_header(buf).ok()?;
    let total = ENVELOPE_HEADER_SIZE + length as usize;
    (buf.len() >= total).then_some(total)
}

/// Whether the flags mark the end-of-stream frame.
pub fn is_end_stream(flags: u8) -> bool {
    flags & envelope_flags::END_STREAM != 0
}
