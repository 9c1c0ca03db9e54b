//! Body types for HTTP transport.
//!
//! [`TransportBody`] is what the client sends. [`ResponseBody`] is what every
//! [`HttpClient`](super::HttpClient) hands back.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;

use crate::ClientError;

/// A response body read lazily, one data frame at a time.
pub type ResponseBody = UnsyncBoxBody<Bytes, ClientError>;

/// Box any body into a [`ResponseBody`], mapping its errors to
/// [`ClientError::Transport`].
pub fn boxed_response_body<B>(body: B) -> ResponseBody
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: std::fmt::Display,
{
    body.map_err(|e| ClientError::Transport(format!("failed to read response body: {}", e)))
        .boxed_unsync()
}

/// A request body for Connect RPC calls.
///
/// - `Full`: a unary body with an exact length.
/// - `Chunked`: pre-encoded envelope frames, one HTTP chunk each. No exact
///   length is advertised, so HTTP/1.1 clients use chunked transfer encoding.
pub enum TransportBody {
    Full { data: Option<Bytes> },
    Chunked { frames: VecDeque<Bytes> },
}

impl TransportBody {
    /// Create a body with the given data.
    pub fn full(data: Bytes) -> Self {
        TransportBody::Full { data: Some(data) }
    }

    /// Create a chunked body from envelope frames, sent in order.
    pub fn chunked<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
    {
        TransportBody::Chunked {
            frames: frames.into_iter().collect(),
        }
    }

    /// Total number of bytes not yet polled.
    pub fn remaining(&self) -> usize {
        match self {
            TransportBody::Full { data } => data.as_ref().map_or(0, Bytes::len),
            TransportBody::Chunked { frames } => frames.iter().map(Bytes::len).sum(),
        }
    }
}

impl Body for TransportBody {
    type Data = Bytes;
    type Error = ClientError;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let next = match self.get_mut() {
            TransportBody::Full { data } => data.take(),
            TransportBody::Chunked { frames } => frames.pop_front(),
        };
        Poll::Ready(next.map(|d| Ok(Frame::data(d))))
    }

    fn is_end_stream(&self) -> bool {
        match self {
            TransportBody::Full { data } => data.is_none(),
            TransportBody::Chunked { frames } => frames.is_empty(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            TransportBody::Full { .. } => SizeHint::with_exact(self.remaining() as u64),
            TransportBody::Chunked { .. } => {
                let mut hint = SizeHint::new();
                hint.set_lower(self.remaining() as u64);
                hint
            }
        }
    }
}

impl std::fmt::Debug for TransportBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportBody::Full { data } => f
                .debug_struct("TransportBody::Full")
                .field("data_len", &data.as_ref().map(|d| d.len()))
                .finish(),
            TransportBody::Chunked { frames } => f
                .debug_struct("TransportBody::Chunked")
                .field("frames", &frames.len())
                .finish(),
        }
    }
}
