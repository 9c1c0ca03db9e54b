#![allow(dead_code)]

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use connectrpc_client::{
    BoxedCodec, Cardinality, ClientError, HttpClient, ResponseBody, ServiceDescriptor,
    TransportBody, transport::boxed_response_body,
};
use futures::future::BoxFuture;
use futures::stream;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body::Frame;
use http_body_util::{BodyExt, StreamBody};

pub const BASE_URL: &str = "http://localhost:8080";
pub const ELIZA: &str = "connectrpc.eliza.v1.ElizaService";

#[derive(Clone, PartialEq, prost::Message)]
pub struct SayRequest {
    #[prost(string, tag = "1")]
    pub sentence: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SayResponse {
    #[prost(string, tag = "1")]
    pub sentence: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct IntroduceRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct IntroduceResponse {
    #[prost(string, tag = "1")]
    pub sentence: String,
}

pub fn eliza() -> ServiceDescriptor {
    ServiceDescriptor::builder(ELIZA)
        .rpc("Say", Cardinality::Unary, Cardinality::Unary)
        .rpc("Converse", Cardinality::Stream, Cardinality::Stream)
        .rpc("Introduce", Cardinality::Unary, Cardinality::Stream)
        .rpc("Reflect", Cardinality::Stream, Cardinality::Unary)
        .build()
}

pub fn gzip() -> BoxedCodec {
    BoxedCodec::new(connectrpc_client::GzipCodec::default())
}

/// A request as it reached the mock.
#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: http::Method,
    pub uri: String,
    pub headers: HeaderMap,
    /// Body frames in the order they were polled.
    pub chunks: Vec<Bytes>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> Bytes {
        self.chunks.concat().into()
    }
}

/// In-memory [`HttpClient`] that records every request and replies with a
/// canned response.
#[derive(Clone)]
pub struct MockHttp {
    requests: Arc<Mutex<Vec<Recorded>>>,
    status: StatusCode,
    headers: HeaderMap,
    chunks: Vec<Bytes>,
}

impl MockHttp {
    pub fn new(status: u16) -> Self {
        Self {
            requests: Arc::default(),
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            chunks: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.append(
            HeaderName::from_static(name),
            HeaderValue::from_str(value).unwrap(),
        );
        self
    }

    /// Append one body chunk.
    pub fn chunk(mut self, data: impl Into<Bytes>) -> Self {
        self.chunks.push(data.into());
        self
    }

    /// Append `data` split into chunks of `size` bytes.
    pub fn chunked(mut self, data: &[u8], size: usize) -> Self {
        self.chunks
            .extend(data.chunks(size).map(Bytes::copy_from_slice));
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn only_request(&self) -> Recorded {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request");
        requests.into_iter().next().unwrap()
    }
}

impl HttpClient for MockHttp {
    fn send(
        &self,
        request: http::Request<TransportBody>,
    ) -> BoxFuture<'static, Result<http::Response<ResponseBody>, ClientError>> {
        let this = self.clone();
        Box::pin(async move {
            let (parts, mut body) = request.into_parts();

            let mut chunks = Vec::new();
            while let Some(frame) = body.frame().await {
                if let Ok(data) = frame?.into_data() {
                    chunks.push(data);
                }
            }

            this.requests.lock().unwrap().push(Recorded {
                method: parts.method,
                uri: parts.uri.to_string(),
                headers: parts.headers,
                chunks,
            });

            let frames = this
                .chunks
                .into_iter()
                .map(|c| Ok::<_, Infallible>(Frame::data(c)));
            let mut response =
                http::Response::new(boxed_response_body(StreamBody::new(stream::iter(frames))));
            *response.status_mut() = this.status;
            *response.headers_mut() = this.headers;
            Ok(response)
        })
    }
}
