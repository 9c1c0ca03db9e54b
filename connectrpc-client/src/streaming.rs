//! Streaming response reader.
//!
//! [`StreamResponse`] reads envelope frames lazily from the response body and
//! yields decoded messages in arrival order. The frame flagged end-of-stream
//! carries the trailer and an optional error, which only become readable once
//! the stream is exhausted.
//!
//! ```text
//! Open ──end-of-stream frame──▶ Exhausted
//!   │
//!   └──body ends early / bad frame──▶ Faulted
//! ```

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use connectrpc_core::{
    BoxedCodec, EnvelopeError, complete_frame_len, envelope_flags, is_end_stream,
    parse_envelope_header, unpack, unpack_limited,
};
use futures::{Stream, StreamExt};
use http_body::Body;

use crate::ClientError;
use crate::error_parser::{EndStream, parse_end_stream};
use crate::response::Metadata;
use crate::transport::ResponseBody;

/// Decodes one data frame payload into a message.
pub(crate) type Decoder<T> = Box<dyn Fn(Bytes) -> Result<T, ClientError> + Send + Sync>;

enum State {
    Open,
    Exhausted {
        trailer: Metadata,
        error: Option<ClientError>,
    },
    Faulted,
}

/// Lazily decoded messages of a streaming call.
///
/// Iterate it as a [`Stream`]. An error reported in the end-of-stream frame is
/// yielded once as the final item. A body that ends without an end-of-stream
/// frame yields [`ClientError::InvalidStreamResponse`]. The stream cannot be
/// restarted; after the final item it only yields `None`.
///
/// # Example
///
/// ```ignore
/// use futures::StreamExt;
///
/// let mut stream = client.call(&introduce, request.into(), CallOptions::new())
///     .await?
///     .into_stream()
///     .unwrap();
///
/// while let Some(message) = stream.next().await {
///     println!("{}", message?.sentence);
/// }
///
/// println!("trailer: {:?}", stream.trailer()?);
/// ```
pub struct StreamResponse<T> {
    header: Metadata,
    body: Option<ResponseBody>,
    buffer: BytesMut,
    codec: Option<BoxedCodec>,
    accepted: Vec<String>,
    read_max_bytes: usize,
    decoder: Decoder<T>,
    state: State,
    pending_error: Option<ClientError>,
}

impl<T> StreamResponse<T> {
    pub(crate) fn new(
        header: Metadata,
        body: ResponseBody,
        codec: Option<BoxedCodec>,
        accepted: Vec<String>,
        read_max_bytes: usize,
        decoder: Decoder<T>,
    ) -> Self {
        Self {
            header,
            body: Some(body),
            buffer: BytesMut::new(),
            codec,
            accepted,
            read_max_bytes,
            decoder,
            state: State::Open,
            pending_error: None,
        }
    }

    /// Response headers, available immediately.
    pub fn header(&self) -> &Metadata {
        &self.header
    }

    /// Trailer from the end-of-stream frame.
    ///
    /// Fails with [`ClientError::StreamRead`] until the stream is exhausted.
    pub fn trailer(&self) -> Result<&Metadata, ClientError> {
        match &self.state {
            State::Exhausted { trailer, .. } => Ok(trailer),
            _ => Err(ClientError::StreamRead(
                "cannot read trailer before stream is exhausted",
            )),
        }
    }

    /// Error from the end-of-stream frame, if the server sent one.
    ///
    /// Fails with [`ClientError::StreamRead`] until the stream is exhausted.
    pub fn error(&self) -> Result<Option<&ClientError>, ClientError> {
        match &self.state {
            State::Exhausted { error, .. } => Ok(error.as_ref()),
            _ => Err(ClientError::StreamRead(
                "cannot read error before stream is exhausted",
            )),
        }
    }

    /// Whether the end-of-stream frame has been consumed.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, State::Exhausted { .. })
    }

    /// Drain the stream, returning every message or the first error.
    pub async fn collect_messages(&mut self) -> Result<Vec<T>, ClientError> {
        let mut messages = Vec::new();
        while let Some(item) = self.next().await {
            messages.push(item?);
        }
        Ok(messages)
    }

    fn exhaust(&mut self, end: EndStream) {
        tracing::debug!(
            trailers = end.trailer.len(),
            error = end.error.is_some(),
            "stream exhausted"
        );

        // Frames after the end-of-stream frame are ignored
        self.body = None;
        self.buffer.clear();
        self.pending_error = end.error.clone();
        self.state = State::Exhausted {
            trailer: end.trailer,
            error: end.error,
        };
    }

    fn fault(&mut self, err: ClientError) -> Poll<Option<Result<T, ClientError>>> {
        tracing::warn!(error = %err, "stream faulted");

        self.body = None;
        self.buffer.clear();
        self.state = State::Faulted;
        Poll::Ready(Some(Err(err)))
    }

    fn envelope_error(&self, err: EnvelopeError) -> ClientError {
        match err {
            EnvelopeError::MissingCompression => ClientError::UnknownCompression {
                encoding: "identity".to_string(),
                accepted: self.accepted.clone(),
            },
            EnvelopeError::PayloadExceedsLimit { size, max } => {
                ClientError::response_too_large(size, max)
            }
            other => other.into(),
        }
    }

    /// Decode the next complete frame in the buffer, if there is one.
    fn next_buffered(&mut self) -> Option<Result<Frame<T>, ClientError>> {
        let Some(len) = complete_frame_len(&self.buffer) else {
            return self.oversized_frame().map(Err);
        };
        let mut frame = self.buffer.split_to(len).freeze();

        let unpacked = unpack_limited(&mut frame, self.codec.as_ref(), self.read_max_bytes);
        let (flags, payload) = match unpacked {
            Ok(unpacked) => unpacked,
            Err(e) => return Some(Err(self.envelope_error(e))),
        };

        if is_end_stream(flags) {
            tracing::trace!(len = payload.len(), "end-of-stream frame");
            Some(parse_end_stream(&payload).map(Frame::End))
        } else {
            tracing::trace!(len = payload.len(), flags, "data frame");
            Some((self.decoder)(payload).map(Frame::Message))
        }
    }

    /// Checks a partially buffered frame against `read_max_bytes` from its
    /// header alone, so an oversized message is never buffered.
    fn oversized_frame(&self) -> Option<ClientError> {
        let (flags, length) = parse_envelope_header(&self.buffer).ok()?;
        let length = length as usize;
        let plain_message =
            flags & (envelope_flags::COMPRESSED | envelope_flags::END_STREAM) == 0;

        (plain_message && length > self.read_max_bytes)
            .then(|| ClientError::response_too_large(length, self.read_max_bytes))
    }

    /// The error for a body that ended while the stream was still open.
    fn ended_early(&mut self) -> ClientError {
        let mut rest = self.buffer.split().freeze();
        match unpack(&mut rest, None) {
            Err(e) if !rest.is_empty() => ClientError::InvalidStreamResponse(format!(
                "stream did not end with end stream message: {}",
                e
            )),
            _ => ClientError::InvalidStreamResponse(
                "stream did not end with end stream message".to_string(),
            ),
        }
    }
}

enum Frame<T> {
    Message(T),
    End(EndStream),
}

impl<T> Stream for StreamResponse<T> {
    type Item = Result<T, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            match this.state {
                State::Exhausted { .. } => return Poll::Ready(this.pending_error.take().map(Err)),
                State::Faulted => return Poll::Ready(None),
                State::Open => {}
            }

            match this.next_buffered() {
                Some(Ok(Frame::Message(message))) => return Poll::Ready(Some(Ok(message))),
                Some(Ok(Frame::End(end))) => {
                    this.exhaust(end);
                    continue;
                }
                Some(Err(e)) => return this.fault(e),
                None => {}
            }

            let polled = match this.body.as_mut() {
                Some(body) => Pin::new(body).poll_frame(cx),
                None => {
                    let err = this.ended_early();
                    return this.fault(err);
                }
            };

            match polled {
                Poll::Ready(Some(Ok(frame))) => {
                    // Trailer frames carry nothing for Connect streams
                    if let Ok(data) = frame.into_data() {
                        this.buffer.extend_from_slice(&data);
                    }
                }
                Poll::Ready(Some(Err(e))) => return this.fault(e),
                Poll::Ready(None) => this.body = None,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<T> fmt::Debug for StreamResponse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Open => "open",
            State::Exhausted { .. } => "exhausted",
            State::Faulted => "faulted",
        };
        f.debug_struct("StreamResponse")
            .field("header", &self.header)
            .field("state", &state)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}
