//! The Connect protocol engine.
//!
//! [`Transport`] turns a typed call into an HTTP/1.1 request, negotiates
//! compression, enforces size limits and parses the response. It holds only
//! immutable configuration and is cheap to clone and share across tasks.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use connectrpc_core::{
    BoxedCodec, COMPRESSION_IDENTITY, CONTENT_TYPE_STREAM_PROTO, CONTENT_TYPE_UNARY_PROTO,
    HEADER_PROTOCOL_VERSION, HEADER_STREAM_ACCEPT_ENCODING, HEADER_STREAM_CONTENT_ENCODING,
    HEADER_UNARY_ACCEPT_ENCODING, HEADER_UNARY_CONTENT_ENCODING, PROTOCOL_VERSION,
    RequestCompression, UNARY_TRAILER_PREFIX, accept_encoding_value, builtin_codec, pack,
};
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::{Method as HttpMethod, Request, StatusCode, Uri};
use http_body_util::BodyExt;

use super::HttpClient;
use super::body::{ResponseBody, TransportBody};
use crate::error_parser::parse_unary_error;
use crate::method::{MessageCodec, Method};
use crate::options::CallOptions;
use crate::response::{Metadata, UnaryResponse};
use crate::streaming::StreamResponse;
use crate::ClientError;

/// Default minimum payload size before compression is applied.
pub const DEFAULT_COMPRESS_MIN_BYTES: usize = 1024;
/// Default read and write ceiling.
pub const DEFAULT_MAX_BYTES: usize = 0xffff_ffff;

/// Connect protocol engine over an [`HttpClient`].
#[derive(Clone)]
pub struct Transport {
    base_url: String,
    accept_compression: Vec<BoxedCodec>,
    send_compression: Option<BoxedCodec>,
    compress_min_bytes: usize,
    read_max_bytes: usize,
    write_max_bytes: usize,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .field("accept_compression", &self.accepted_names())
            .field("send_compression", &self.send_compression)
            .field("compress_min_bytes", &self.compress_min_bytes)
            .field("read_max_bytes", &self.read_max_bytes)
            .field("write_max_bytes", &self.write_max_bytes)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Start configuring a transport for the server at `base_url`.
    pub fn builder(base_url: impl Into<String>) -> TransportBuilder {
        TransportBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn accept_compression(&self) -> &[BoxedCodec] {
        &self.accept_compression
    }

    pub fn send_compression(&self) -> Option<&BoxedCodec> {
        self.send_compression.as_ref()
    }

    pub fn compress_min_bytes(&self) -> usize {
        self.compress_min_bytes
    }

    pub fn read_max_bytes(&self) -> usize {
        self.read_max_bytes
    }

    pub fn write_max_bytes(&self) -> usize {
        self.write_max_bytes
    }

    /// Perform a unary call.
    ///
    /// The request is encoded, and rejected if too large, before anything is
    /// sent.
    pub async fn unary<Req, Res, C>(
        &self,
        service: &str,
        method: &Method<Req, Res, C>,
        input: &Req,
        options: &CallOptions,
    ) -> Result<UnaryResponse<Res>, ClientError>
    where
        C: MessageCodec<Req> + MessageCodec<Res>,
    {
        let uri = self.build_uri(service, method.name())?;

        let message = method.encode_request(input, self.write_max_bytes)?;

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_PROTOCOL_VERSION, HeaderValue::from_static(PROTOCOL_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_UNARY_PROTO));
        headers.insert(
            HEADER_UNARY_ACCEPT_ENCODING,
            self.accept_encoding_header()?,
        );

        let body = match self.request_compression() {
            Some(policy) if !policy.codec().is_identity() && policy.should_compress(&message) => {
                let codec = policy.codec();
                tracing::debug!(
                    encoding = codec.name(),
                    size = message.len(),
                    "compressing request"
                );
                headers.insert(HEADER_UNARY_CONTENT_ENCODING, encoding_header(codec)?);
                codec
                    .compress(&message)
                    .map_err(|e| ClientError::Encode(format!("compression failed: {}", e)))?
            }
            _ => message,
        };

        inject_header_and_trailer(&mut headers, options)?;

        let response = self
            .send(uri, headers, TransportBody::full(body))
            .await?;
        let (parts, body) = response.into_parts();

        if parts.status != StatusCode::OK {
            // An oversized error body still reports the status code
            let body = match collect_limited(body, self.read_max_bytes).await {
                Err(ClientError::MaxBytesExceeded { .. }) => Bytes::new(),
                body => body?,
            };
            let err = self.unary_error(parts.status, &parts.headers, body);
            tracing::warn!(status = parts.status.as_u16(), code = %err.code(), "unary call failed");
            return Err(err);
        }

        let codec = self.negotiate(parts.headers.get(HEADER_UNARY_CONTENT_ENCODING))?;
        let body = collect_limited(body, self.read_max_bytes).await?;
        let body = match &codec {
            Some(codec) => {
                let body = codec
                    .decompress_limited(&body, self.read_max_bytes)
                    .map_err(|e| ClientError::Decode(format!("decompression failed: {}", e)))?;
                if body.len() > self.read_max_bytes {
                    return Err(ClientError::response_too_large(body.len(), self.read_max_bytes));
                }
                body
            }
            None => body,
        };

        let message = method.decode_response(body, self.read_max_bytes)?;
        let (header, trailer) = Metadata::split_unary_trailers(parts.headers);

        Ok(UnaryResponse::new(header, message, trailer))
    }

    /// Perform a half-duplex streaming call.
    ///
    /// Every request message is encoded and framed up front. The returned
    /// reader has not consumed any of the response body.
    pub async fn stream<Req, Res, C>(
        &self,
        service: &str,
        method: &Method<Req, Res, C>,
        input: Vec<Req>,
        options: &CallOptions,
    ) -> Result<StreamResponse<Res>, ClientError>
    where
        Req: 'static,
        Res: 'static,
        C: MessageCodec<Req> + MessageCodec<Res> + Clone,
    {
        if method.kind().is_bidi_stream() {
            return Err(ClientError::NotSupported(
                "bidi streaming is not supported with HTTP/1.1".to_string(),
            ));
        }
        if input.is_empty() {
            return Err(ClientError::Encode(
                "stream request needs at least one message".to_string(),
            ));
        }

        let uri = self.build_uri(service, method.name())?;

        let mut headers = HeaderMap::new();
        headers.insert(HEADER_PROTOCOL_VERSION, HeaderValue::from_static(PROTOCOL_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_STREAM_PROTO));
        headers.insert(
            HEADER_UNARY_ACCEPT_ENCODING,
            HeaderValue::from_static(COMPRESSION_IDENTITY),
        );
        headers.insert(
            HEADER_STREAM_ACCEPT_ENCODING,
            self.accept_encoding_header()?,
        );
        if let Some(codec) = &self.send_compression {
            headers.insert(HEADER_STREAM_CONTENT_ENCODING, encoding_header(codec)?);
        }

        let frames = input
            .iter()
            .map(|message| -> Result<Bytes, ClientError> {
                let payload = method.encode_request(message, self.write_max_bytes)?;
                Ok(pack(
                    &payload,
                    self.send_compression.as_ref(),
                    self.compress_min_bytes,
                )?)
            })
            .collect::<Result<Vec<Bytes>, ClientError>>()?;

        tracing::debug!(frames = frames.len(), "sending stream request");

        inject_header_and_trailer(&mut headers, options)?;

        let response = self
            .send(uri, headers, TransportBody::chunked(frames))
            .await?;
        let (parts, body) = response.into_parts();

        if parts.status != StatusCode::OK {
            let status = parts.status.as_u16();
            tracing::warn!(status, "stream call failed");
            return Err(ClientError::new(
                connectrpc_core::Code::from_http_code(status),
                format!("unexpected HTTP status code: {}", status),
            ));
        }

        let codec = self.negotiate(parts.headers.get(HEADER_STREAM_CONTENT_ENCODING))?;

        let read_max_bytes = self.read_max_bytes;
        let method = method.clone();
        let decoder = Box::new(move |bytes: Bytes| method.decode_response(bytes, read_max_bytes));

        Ok(StreamResponse::new(
            Metadata::new(parts.headers),
            body,
            codec,
            self.accepted_names(),
            read_max_bytes,
            decoder,
        ))
    }

    fn build_uri(&self, service: &str, method: &str) -> Result<Uri, ClientError> {
        let url = format!("{}/{}/{}", self.base_url, service, method);
        url.parse()
            .map_err(|e| ClientError::Encode(format!("invalid request url {}: {}", url, e)))
    }

    fn request_compression(&self) -> Option<RequestCompression> {
        self.send_compression
            .clone()
            .map(|codec| RequestCompression::new(codec, self.compress_min_bytes))
    }

    fn accept_encoding_header(&self) -> Result<HeaderValue, ClientError> {
        HeaderValue::from_str(&accept_encoding_value(&self.accept_compression))
            .map_err(|e| ClientError::Encode(format!("invalid accept encoding: {}", e)))
    }

    fn accepted_names(&self) -> Vec<String> {
        self.accept_compression
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Resolve a response compression header against the accepted codecs.
    ///
    /// Absent or `identity` means no compression. Anything the client did not
    /// advertise is rejected.
    fn negotiate(&self, header: Option<&HeaderValue>) -> Result<Option<BoxedCodec>, ClientError> {
        let Some(header) = header else {
            return Ok(None);
        };

        let encoding = String::from_utf8_lossy(header.as_bytes());
        if encoding == COMPRESSION_IDENTITY {
            return Ok(None);
        }

        match self
            .accept_compression
            .iter()
            .find(|codec| codec.name() == encoding)
        {
            Some(codec) => {
                tracing::trace!(encoding = codec.name(), "response compression");
                Ok(Some(codec.clone()))
            }
            None => Err(ClientError::UnknownCompression {
                encoding: encoding.into_owned(),
                accepted: self.accepted_names(),
            }),
        }
    }

    /// Parse a failed unary body, decompressing it first when the server used
    /// an accepted encoding.
    fn unary_error(&self, status: StatusCode, headers: &HeaderMap, body: Bytes) -> ClientError {
        let status = status.as_u16();
        let body = match self.negotiate(headers.get(HEADER_UNARY_CONTENT_ENCODING)) {
            Ok(Some(codec)) => match codec.decompress_limited(&body, self.read_max_bytes) {
                Ok(body) if body.len() <= self.read_max_bytes => body,
                _ => return ClientError::from_code(connectrpc_core::Code::from_http_code(status)),
            },
            _ => body,
        };

        parse_unary_error(status, &body)
    }

    async fn send(
        &self,
        uri: Uri,
        headers: HeaderMap,
        body: TransportBody,
    ) -> Result<http::Response<ResponseBody>, ClientError> {
        tracing::debug!(%uri, "sending request");

        let mut request = Request::builder()
            .method(HttpMethod::POST)
            .uri(uri)
            .body(body)
            .map_err(|e| ClientError::Encode(format!("failed to build request: {}", e)))?;
        *request.headers_mut() = headers;

        let response = self.http.send(request).await?;
        tracing::debug!(status = response.status().as_u16(), "received response");
        Ok(response)
    }
}

/// Copy caller headers over the protocol headers, then add the caller's
/// trailers under the `trailer-` prefix.
fn inject_header_and_trailer(
    headers: &mut HeaderMap,
    options: &CallOptions,
) -> Result<(), ClientError> {
    for name in options.headers.keys() {
        headers.remove(name);
    }
    for (name, value) in options.headers.iter() {
        headers.append(name.clone(), value.clone());
    }

    for (name, value) in options.trailers.iter() {
        let prefixed = format!("{}{}", UNARY_TRAILER_PREFIX, name.as_str());
        let prefixed = HeaderName::from_bytes(prefixed.as_bytes())
            .map_err(|e| ClientError::Encode(format!("invalid trailer name {}: {}", name, e)))?;
        headers.append(prefixed, value.clone());
    }

    Ok(())
}

fn encoding_header(codec: &BoxedCodec) -> Result<HeaderValue, ClientError> {
    HeaderValue::from_str(codec.name())
        .map_err(|e| ClientError::Encode(format!("invalid encoding name {}: {}", codec.name(), e)))
}

/// Buffer a whole body, failing as soon as it grows past `max` bytes.
async fn collect_limited(mut body: ResponseBody, max: usize) -> Result<Bytes, ClientError> {
    let mut buffer = BytesMut::new();
    while let Some(frame) = body.frame().await {
        if let Ok(data) = frame?.into_data() {
            let size = buffer.len() + data.len();
            if size > max {
                return Err(ClientError::response_too_large(size, max));
            }
            buffer.extend_from_slice(&data);
        }
    }
    Ok(buffer.freeze())
}

/// Builder for [`Transport`].
///
/// Defaults: accept `[gzip]`, send `gzip`, compress payloads of 1024 bytes or
/// more, and a 4 GiB read/write ceiling. Without the `compression-gzip`
/// feature nothing is compressed by default.
#[derive(Debug)]
pub struct TransportBuilder {
    base_url: String,
    accept_compression: Vec<BoxedCodec>,
    send_compression: Option<BoxedCodec>,
    compress_min_bytes: usize,
    read_max_bytes: usize,
    write_max_bytes: usize,
}

impl TransportBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        let gzip = default_codec();
        Self {
            base_url: base_url.into(),
            accept_compression: gzip.clone().into_iter().collect(),
            send_compression: gzip,
            compress_min_bytes: DEFAULT_COMPRESS_MIN_BYTES,
            read_max_bytes: DEFAULT_MAX_BYTES,
            write_max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    /// Codecs the server may use for responses, in preference order.
    pub fn accept_compression<I>(mut self, codecs: I) -> Self
    where
        I: IntoIterator<Item = BoxedCodec>,
    {
        self.accept_compression = codecs.into_iter().collect();
        self
    }

    /// Codec for request bodies, or `None` to never compress.
    pub fn send_compression(mut self, codec: Option<BoxedCodec>) -> Self {
        self.send_compression = codec;
        self
    }

    /// Smallest payload, in bytes, that gets compressed.
    pub fn compress_min_bytes(mut self, bytes: usize) -> Self {
        self.compress_min_bytes = bytes;
        self
    }

    /// Largest accepted response message, after decompression.
    pub fn read_max_bytes(mut self, bytes: usize) -> Self {
        self.read_max_bytes = bytes;
        self
    }

    /// Largest request message, before compression.
    pub fn write_max_bytes(mut self, bytes: usize) -> Self {
        self.write_max_bytes = bytes;
        self
    }

    /// Build the transport over `http`.
    ///
    /// Fails if `base_url` is not a valid absolute URL.
    pub fn build<H: HttpClient>(self, http: H) -> Result<Transport, ClientError> {
        let base_url = self.base_url.trim_end_matches('/').to_string();

        let uri: Uri = base_url
            .parse()
            .map_err(|e| ClientError::Encode(format!("invalid base url {}: {}", base_url, e)))?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(ClientError::Encode(format!(
                "base url must be absolute: {}",
                base_url
            )));
        }

        Ok(Transport {
            base_url,
            accept_compression: self.accept_compression,
            send_compression: self.send_compression,
            compress_min_bytes: self.compress_min_bytes,
            read_max_bytes: self.read_max_bytes,
            write_max_bytes: self.write_max_bytes,
            http: Arc::new(http),
        })
    }
}

fn default_codec() -> Option<BoxedCodec> {
    builtin_codec("gzip")
}
