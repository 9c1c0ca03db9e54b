//! RPC method and service metadata.
//!
//! A [`ServiceDescriptor`] is built once from a static listing of RPCs and is
//! read-only afterwards. [`Method`] binds one [`MethodDescriptor`] to concrete
//! request/response types and a [`MessageCodec`].
//!
//! # Example
//!
//! ```
//! use connectrpc_client::{Cardinality, MethodKind, ServiceDescriptor};
//!
//! let service = ServiceDescriptor::builder("connectrpc.eliza.v1.ElizaService")
//!     .rpc("Say", Cardinality::Unary, Cardinality::Unary)
//!     .rpc("Introduce", Cardinality::Unary, Cardinality::Stream)
//!     .build();
//!
//! let introduce = service.get("Introduce").unwrap();
//! assert_eq!(introduce.kind(), MethodKind::ServerStream);
//! assert_eq!(introduce.accessor(), "introduce");
//! ```

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use convert_case::{Case, Casing};

use crate::ClientError;

/// Encodes request messages and decodes response messages.
///
/// Implementations are stateless and shared across calls.
pub trait MessageCodec<T>: Send + Sync + 'static {
    fn encode(&self, message: &T) -> Result<Bytes, ClientError>;

    fn decode(&self, bytes: Bytes) -> Result<T, ClientError>;
}

/// Binary protobuf codec backed by `prost`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProstCodec;

impl<T> MessageCodec<T> for ProstCodec
where
    T: prost::Message + Default,
{
    fn encode(&self, message: &T) -> Result<Bytes, ClientError> {
        Ok(Bytes::from(message.encode_to_vec()))
    }

    fn decode(&self, bytes: Bytes) -> Result<T, ClientError> {
        T::decode(bytes)
            .map_err(|e| ClientError::Decode(format!("protobuf decoding failed: {}", e)))
    }
}

/// How many messages one side of an RPC carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Unary,
    Stream,
}

/// Classification of an RPC by its request and response cardinality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Unary,
    ClientStream,
    ServerStream,
    BidiStream,
}

impl MethodKind {
    pub fn from_cardinality(request: Cardinality, response: Cardinality) -> Self {
        match (request, response) {
            (Cardinality::Unary, Cardinality::Unary) => MethodKind::Unary,
            (Cardinality::Stream, Cardinality::Unary) => MethodKind::ClientStream,
            (Cardinality::Unary, Cardinality::Stream) => MethodKind::ServerStream,
            (Cardinality::Stream, Cardinality::Stream) => MethodKind::BidiStream,
        }
    }

    /// Both sides unary.
    pub fn is_unary(&self) -> bool {
        matches!(self, MethodKind::Unary)
    }

    /// Either side streams. Half-duplex and bidi methods are both streams.
    pub fn is_stream(&self) -> bool {
        !self.is_unary()
    }

    /// Both sides stream.
    pub fn is_bidi_stream(&self) -> bool {
        matches!(self, MethodKind::BidiStream)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MethodKind::Unary => "unary",
            MethodKind::ClientStream => "client_stream",
            MethodKind::ServerStream => "server_stream",
            MethodKind::BidiStream => "bidi_stream",
        }
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one RPC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    name: String,
    request: Cardinality,
    response: Cardinality,
    accessor: String,
}

impl MethodDescriptor {
    /// Describe an RPC, deriving the accessor name as the snake_case form of `name`.
    pub fn new(name: impl Into<String>, request: Cardinality, response: Cardinality) -> Self {
        let name = name.into();
        let accessor = name.to_case(Case::Snake);
        Self {
            name,
            request,
            response,
            accessor,
        }
    }

    /// Override the derived accessor name.
    pub fn with_accessor(mut self, accessor: impl Into<String>) -> Self {
        self.accessor = accessor.into();
        self
    }

    /// RPC name as it appears in the request path.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn request(&self) -> Cardinality {
        self.request
    }

    pub fn response(&self) -> Cardinality {
        self.response
    }

    /// Name of the generated call function for this RPC.
    pub fn accessor(&self) -> &str {
        &self.accessor
    }

    pub fn kind(&self) -> MethodKind {
        MethodKind::from_cardinality(self.request, self.response)
    }

    pub fn is_unary(&self) -> bool {
        self.kind().is_unary()
    }

    pub fn is_stream(&self) -> bool {
        self.kind().is_stream()
    }

    pub fn is_bidi_stream(&self) -> bool {
        self.kind().is_bidi_stream()
    }
}

/// The RPCs of one service, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceDescriptor {
    name: String,
    methods: Vec<MethodDescriptor>,
}

impl ServiceDescriptor {
    /// Start describing the service with the given fully-qualified name.
    pub fn builder(name: impl Into<String>) -> ServiceDescriptorBuilder {
        ServiceDescriptorBuilder {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Fully-qualified service name, e.g. `connectrpc.eliza.v1.ElizaService`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Look up an RPC by name.
    pub fn get(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Look up an RPC by its accessor name.
    pub fn by_accessor(&self, accessor: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.accessor == accessor)
    }

    /// Bind an RPC to message types using the protobuf codec.
    pub fn method<Req, Res>(&self, name: &str) -> Result<Method<Req, Res>, ClientError>
    where
        ProstCodec: MessageCodec<Req> + MessageCodec<Res>,
    {
        self.method_with_codec(name, ProstCodec)
    }

    /// Bind an RPC to message types using a custom codec.
    pub fn method_with_codec<Req, Res, C>(
        &self,
        name: &str,
        codec: C,
    ) -> Result<Method<Req, Res, C>, ClientError>
    where
        C: MessageCodec<Req> + MessageCodec<Res>,
    {
        let descriptor = self
            .get(name)
            .ok_or_else(|| ClientError::UnknownMethod(format!("{}/{}", self.name, name)))?;

        Ok(Method::new(descriptor.clone(), codec))
    }
}

/// Builder for [`ServiceDescriptor`].
#[derive(Debug)]
pub struct ServiceDescriptorBuilder {
    name: String,
    methods: Vec<MethodDescriptor>,
}

impl ServiceDescriptorBuilder {
    /// Register an RPC. Registering a name twice replaces the earlier entry
    /// in its original position.
    pub fn rpc(self, name: impl Into<String>, request: Cardinality, response: Cardinality) -> Self {
        self.descriptor(MethodDescriptor::new(name, request, response))
    }

    /// Register an RPC with an explicit accessor name.
    pub fn rpc_with_accessor(
        self,
        name: impl Into<String>,
        request: Cardinality,
        response: Cardinality,
        accessor: impl Into<String>,
    ) -> Self {
        self.descriptor(MethodDescriptor::new(name, request, response).with_accessor(accessor))
    }

    /// Register a pre-built descriptor.
    pub fn descriptor(mut self, descriptor: MethodDescriptor) -> Self {
        match self.methods.iter_mut().find(|m| m.name == descriptor.name) {
            Some(existing) => *existing = descriptor,
            None => self.methods.push(descriptor),
        }
        self
    }

    pub fn build(self) -> ServiceDescriptor {
        ServiceDescriptor {
            name: self.name,
            methods: self.methods,
        }
    }
}

/// An RPC bound to its request/response types and codec.
pub struct Method<Req, Res, C = ProstCodec> {
    descriptor: MethodDescriptor,
    codec: C,
    _marker: PhantomData<fn(Req) -> Res>,
}

impl<Req, Res, C> Method<Req, Res, C>
where
    C: MessageCodec<Req> + MessageCodec<Res>,
{
    pub fn new(descriptor: MethodDescriptor, codec: C) -> Self {
        Self {
            descriptor,
            codec,
            _marker: PhantomData,
        }
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn kind(&self) -> MethodKind {
        self.descriptor.kind()
    }

    /// Encode a request, failing if the encoded size exceeds `max_bytes`.
    pub fn encode_request(&self, message: &Req, max_bytes: usize) -> Result<Bytes, ClientError> {
        let encoded = MessageCodec::<Req>::encode(&self.codec, message)?;
        if encoded.len() > max_bytes {
            return Err(ClientError::request_too_large(encoded.len(), max_bytes));
        }
        Ok(encoded)
    }

    /// Decode a response, failing without decoding if `bytes` exceeds `max_bytes`.
    pub fn decode_response(&self, bytes: Bytes, max_bytes: usize) -> Result<Res, ClientError> {
        if bytes.len() > max_bytes {
            return Err(ClientError::response_too_large(bytes.len(), max_bytes));
        }
        MessageCodec::<Res>::decode(&self.codec, bytes)
    }
}

impl<Req, Res, C: Clone> Clone for Method<Req, Res, C> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            codec: self.codec.clone(),
            _marker: PhantomData,
        }
    }
}

impl<Req, Res, C> fmt::Debug for Method<Req, Res, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.descriptor.name)
            .field("kind", &self.descriptor.kind())
            .finish()
    }
}
