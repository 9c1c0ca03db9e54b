//! Client dispatcher.
//!
//! [`Client`] binds a [`Transport`] to one service and routes each call by
//! the method's cardinality.

use std::sync::Arc;

use tracing::{Instrument, info_span};

use crate::ClientError;
use crate::method::{MessageCodec, Method, MethodKind, ProstCodec, ServiceDescriptor};
use crate::options::CallOptions;
use crate::request::Input;
use crate::response::{CallResponse, UnaryResponse};
use crate::streaming::StreamResponse;
use crate::transport::Transport;

/// A client for one Connect service.
///
/// Cloning is cheap: the transport configuration and the service descriptor
/// are shared.
///
/// # Example
///
/// ```ignore
/// use connectrpc_client::{Cardinality, Client, HyperClient, ServiceDescriptor, Transport};
///
/// let service = ServiceDescriptor::builder("connectrpc.eliza.v1.ElizaService")
///     .rpc("Say", Cardinality::Unary, Cardinality::Unary)
///     .rpc("Introduce", Cardinality::Unary, Cardinality::Stream)
///     .build();
///
/// let transport = Transport::builder("http://localhost:8080").build(HyperClient::new())?;
/// let client = Client::new(transport, service);
///
/// let say = client.method::<SayRequest, SayResponse>("Say")?;
/// let response = client.unary(&say, &SayRequest { sentence: "Hello".into() }, Default::default()).await?;
/// println!("{}", response.message().sentence);
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    transport: Transport,
    service: Arc<ServiceDescriptor>,
}

impl Client {
    pub fn new(transport: Transport, service: ServiceDescriptor) -> Self {
        Self {
            transport,
            service: Arc::new(service),
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn service(&self) -> &ServiceDescriptor {
        &self.service
    }

    /// Bind one of the service's RPCs to protobuf message types.
    ///
    /// `name` may be the RPC name (`IntroduceMe`) or its accessor
    /// (`introduce_me`).
    pub fn method<Req, Res>(&self, name: &str) -> Result<Method<Req, Res>, ClientError>
    where
        ProstCodec: MessageCodec<Req> + MessageCodec<Res>,
    {
        self.method_with_codec(name, ProstCodec)
    }

    /// Bind one of the service's RPCs with a custom codec.
    pub fn method_with_codec<Req, Res, C>(
        &self,
        name: &str,
        codec: C,
    ) -> Result<Method<Req, Res, C>, ClientError>
    where
        C: MessageCodec<Req> + MessageCodec<Res>,
    {
        let name = match self.service.by_accessor(name) {
            Some(descriptor) if self.service.get(name).is_none() => descriptor.name(),
            _ => name,
        };
        self.service.method_with_codec(name, codec)
    }

    /// Call `method`, routing by its cardinality.
    ///
    /// Unary methods take exactly one message and return
    /// [`CallResponse::Unary`]. Streaming methods take any number of messages
    /// and return [`CallResponse::Stream`] without reading the body.
    pub async fn call<Req, Res, C>(
        &self,
        method: &Method<Req, Res, C>,
        input: impl Into<Input<Req>>,
        options: CallOptions,
    ) -> Result<CallResponse<Res>, ClientError>
    where
        Req: 'static,
        Res: 'static,
        C: MessageCodec<Req> + MessageCodec<Res> + Clone,
    {
        let input = input.into();
        let kind = method.kind();
        let span = self.span(method.name(), kind);

        async move {
            match kind {
                MethodKind::Unary => {
                    let count = input.len();
                    let message = input.into_single().ok_or_else(|| {
                        ClientError::Encode(format!(
                            "unary method {} expects exactly one request message, got {}",
                            method.name(),
                            count
                        ))
                    })?;
                    self.transport
                        .unary(self.service.name(), method, &message, &options)
                        .await
                        .map(CallResponse::Unary)
                }
                MethodKind::ClientStream | MethodKind::ServerStream | MethodKind::BidiStream => self
                    .transport
                    .stream(self.service.name(), method, input.into_messages(), &options)
                    .await
                    .map(CallResponse::Stream),
            }
        }
        .instrument(span)
        .await
    }

    /// Call a unary method.
    pub async fn unary<Req, Res, C>(
        &self,
        method: &Method<Req, Res, C>,
        request: &Req,
        options: CallOptions,
    ) -> Result<UnaryResponse<Res>, ClientError>
    where
        C: MessageCodec<Req> + MessageCodec<Res>,
    {
        let kind = method.kind();
        if !kind.is_unary() {
            return Err(ClientError::UnknownMethod(format!(
                "{}/{} is a {} method",
                self.service.name(),
                method.name(),
                kind
            )));
        }

        self.transport
            .unary(self.service.name(), method, request, &options)
            .instrument(self.span(method.name(), kind))
            .await
    }

    /// Call a client or server streaming method.
    pub async fn stream<Req, Res, C>(
        &self,
        method: &Method<Req, Res, C>,
        input: impl Into<Input<Req>>,
        options: CallOptions,
    ) -> Result<StreamResponse<Res>, ClientError>
    where
        Req: 'static,
        Res: 'static,
        C: MessageCodec<Req> + MessageCodec<Res> + Clone,
    {
        let kind = method.kind();
        if !kind.is_stream() {
            return Err(ClientError::UnknownMethod(format!(
                "{}/{} is a {} method",
                self.service.name(),
                method.name(),
                kind
            )));
        }

        self.transport
            .stream(
                self.service.name(),
                method,
                input.into().into_messages(),
                &options,
            )
            .instrument(self.span(method.name(), kind))
            .await
    }

    fn span(&self, method: &str, kind: MethodKind) -> tracing::Span {
        info_span!(
            "rpc.call",
            rpc.service = %self.service.name(),
            rpc.method = %method,
            rpc.type = kind.as_str(),
            otel.kind = "client",
        )
    }
}
