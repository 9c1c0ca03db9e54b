mod common;

use bytes::Bytes;
use common::*;
use connectrpc_client::{
    BoxedCodec, CallOptions, Client, ClientError, Code, Input, Transport,
};
use connectrpc_core::{envelope_flags, unpack, wrap_envelope};
use futures::StreamExt;
use prost::Message;

fn client(http: MockHttp) -> Client {
    let transport = Transport::builder(BASE_URL).build(http).unwrap();
    Client::new(transport, eliza())
}

fn data_frame(sentence: &str) -> Bytes {
    let message = IntroduceResponse {
        sentence: sentence.into(),
    };
    wrap_envelope(envelope_flags::MESSAGE, &message.encode_to_vec()).unwrap()
}

fn end_frame(json: &str) -> Bytes {
    wrap_envelope(envelope_flags::END_STREAM, json.as_bytes()).unwrap()
}

fn introduce() -> IntroduceRequest {
    IntroduceRequest {
        name: "Ada".into(),
    }
}

#[tokio::test]
async fn server_stream_happy_path() {
    let body = [
        data_frame("Hi Ada, I'm Eliza."),
        data_frame("How are you feeling today?"),
        end_frame(r#"{"metadata":{"x-checksum":["abc"]}}"#),
    ]
    .concat();

    // Frame boundaries deliberately straddle chunk boundaries
    let http = MockHttp::ok()
        .header("content-type", "application/connect+proto")
        .chunked(&body, 7);
    let client = client(http.clone());

    let method = client
        .method::<IntroduceRequest, IntroduceResponse>("Introduce")
        .unwrap();
    let mut stream = client
        .stream(&method, introduce(), CallOptions::new())
        .await
        .unwrap();

    assert_eq!(
        stream.header().get("content-type"),
        Some("application/connect+proto")
    );
    assert!(matches!(stream.trailer(), Err(ClientError::StreamRead(_))));
    assert!(matches!(stream.error(), Err(ClientError::StreamRead(_))));

    let messages = stream.collect_messages().await.unwrap();
    let sentences: Vec<_> = messages.into_iter().map(|m| m.sentence).collect();
    assert_eq!(sentences, ["Hi Ada, I'm Eliza.", "How are you feeling today?"]);

    assert!(stream.is_exhausted());
    assert_eq!(stream.trailer().unwrap().get("x-checksum"), Some("abc"));
    assert!(stream.error().unwrap().is_none());

    // Not restartable
    assert!(stream.next().await.is_none());

    let sent = http.only_request();
    assert_eq!(
        sent.uri,
        "http://localhost:8080/connectrpc.eliza.v1.ElizaService/Introduce"
    );
    assert_eq!(sent.header("connect-protocol-version"), Some("1"));
    assert_eq!(sent.header("content-type"), Some("application/connect+proto"));
    assert_eq!(sent.header("accept-encoding"), Some("identity"));
    assert_eq!(sent.header("connect-accept-encoding"), Some("gzip"));
    assert_eq!(sent.header("connect-content-encoding"), Some("gzip"));

    assert_eq!(sent.chunks.len(), 1);
    let mut frame = sent.chunks[0].clone();
    let (flags, payload) = unpack(&mut frame, None).unwrap();
    assert_eq!(flags, envelope_flags::MESSAGE);
    assert_eq!(IntroduceRequest::decode(payload).unwrap(), introduce());
}

#[tokio::test]
async fn stream_call_dispatch() {
    let http = MockHttp::ok().chunk(end_frame("{}"));
    let client = client(http);

    let method = client
        .method::<IntroduceRequest, IntroduceResponse>("Introduce")
        .unwrap();
    let mut stream = client
        .call(&method, introduce(), CallOptions::new())
        .await
        .unwrap()
        .into_stream()
        .unwrap();

    assert!(stream.collect_messages().await.unwrap().is_empty());
    assert!(stream.trailer().unwrap().is_empty());
}

#[tokio::test]
async fn client_stream_frames_every_message_in_order() {
    let reply = SayResponse {
        sentence: "Thanks for sharing.".into(),
    };
    let response_body = [
        wrap_envelope(envelope_flags::MESSAGE, &reply.encode_to_vec()).unwrap(),
        end_frame("{}"),
    ]
    .concat();
    let http = MockHttp::ok().chunk(response_body);

    let transport = Transport::builder(BASE_URL)
        .compress_min_bytes(0)
        .build(http.clone())
        .unwrap();
    let client = Client::new(transport, eliza());

    let requests = ["one", "two", "three"].map(|s| SayRequest {
        sentence: s.into(),
    });
    let method = client.method::<SayRequest, SayResponse>("Reflect").unwrap();
    let mut stream = client
        .stream(&method, Input::stream(requests.clone()), CallOptions::new())
        .await
        .unwrap();

    assert_eq!(stream.collect_messages().await.unwrap(), [reply]);

    let sent = http.only_request();
    assert_eq!(sent.chunks.len(), 3);

    let gzip = gzip();
    for (chunk, expected) in sent.chunks.iter().zip(&requests) {
        let mut frame = chunk.clone();
        let (flags, payload) = unpack(&mut frame, Some(&gzip)).unwrap();
        assert_eq!(flags, envelope_flags::COMPRESSED);
        assert_eq!(&SayRequest::decode(payload).unwrap(), expected);
    }
}

#[tokio::test]
async fn compressed_response_frames() {
    let gzip = gzip();
    let message = IntroduceResponse {
        sentence: "compressed".into(),
    };
    let compressed = gzip.compress(&message.encode_to_vec()).unwrap();
    let body = [
        wrap_envelope(envelope_flags::COMPRESSED, &compressed).unwrap(),
        data_frame("plain"),
        end_frame("{}"),
    ]
    .concat();
    let http = MockHttp::ok()
        .header("connect-content-encoding", "gzip")
        .chunk(body);
    let client = client(http);

    let method = client
        .method::<IntroduceRequest, IntroduceResponse>("Introduce")
        .unwrap();
    let mut stream = client
        .stream(&method, introduce(), CallOptions::new())
        .await
        .unwrap();

    let sentences: Vec<_> = stream
        .collect_messages()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.sentence)
        .collect();
    assert_eq!(sentences, ["compressed", "plain"]);
}

#[tokio::test]
async fn end_stream_error_is_raised_and_recorded() {
    let body = [
        data_frame("first"),
        end_frame(
            r#"{"metadata":{"x-trailer":["t"]},"error":{"code":"resource_exhausted","message":"quota"}}"#,
        ),
    ]
    .concat();
    let http = MockHttp::ok().chunk(body);
    let client = client(http);

    let method = client
        .method::<IntroduceRequest, IntroduceResponse>("Introduce")
        .unwrap();
    let mut stream = client
        .stream(&method, introduce(), CallOptions::new())
        .await
        .unwrap();

    assert_eq!(stream.next().await.unwrap().unwrap().sentence, "first");

    let err = stream.next().await.unwrap().unwrap_err();
    assert_eq!(err.code(), Code::ResourceExhausted);
    assert_eq!(err.message(), Some("quota"));
    assert!(stream.next().await.is_none());

    assert_eq!(stream.trailer().unwrap().get("x-trailer"), Some("t"));
    let recorded = stream.error().unwrap().unwrap();
    assert_eq!(recorded.code(), Code::ResourceExhausted);
}

#[tokio::test]
async fn stream_without_end_frame_is_invalid() {
    let http = MockHttp::ok().chunk(data_frame("only"));
    let client = client(http);

    let method = client
        .method::<IntroduceRequest, IntroduceResponse>("Introduce")
        .unwrap();
    let mut stream = client
        .stream(&method, introduce(), CallOptions::new())
        .await
        .unwrap();

    assert_eq!(stream.next().await.unwrap().unwrap().sentence, "only");

    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::InvalidStreamResponse(_)));
    assert!(stream.next().await.is_none());

    assert!(!stream.is_exhausted());
    assert!(matches!(stream.trailer(), Err(ClientError::StreamRead(_))));
    assert!(matches!(stream.error(), Err(ClientError::StreamRead(_))));
}

#[tokio::test]
async fn truncated_frame_is_reported() {
    let frame = data_frame("cut short");
    let http = MockHttp::ok().chunk(frame.slice(..frame.len() - 2));
    let client = client(http);

    let method = client
        .method::<IntroduceRequest, IntroduceResponse>("Introduce")
        .unwrap();
    let mut stream = client
        .stream(&method, introduce(), CallOptions::new())
        .await
        .unwrap();

    let err = stream.collect_messages().await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidStreamResponse(_)));
    assert!(err.to_string().contains("incomplete envelope payload"));
    assert_eq!(err.code(), Code::Unknown);
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn invalid_end_stream_json() {
    let http = MockHttp::ok().chunk(end_frame("not json"));
    let client = client(http);

    let method = client
        .method::<IntroduceRequest, IntroduceResponse>("Introduce")
        .unwrap();
    let mut stream = client
        .stream(&method, introduce(), CallOptions::new())
        .await
        .unwrap();

    let err = stream.collect_messages().await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidStreamResponse(_)));
}

#[tokio::test]
async fn stream_frame_over_read_limit() {
    let body = [data_frame(&"x".repeat(64)), end_frame("{}")].concat();
    let http = MockHttp::ok().chunk(body);
    let transport = Transport::builder(BASE_URL)
        .read_max_bytes(16)
        .build(http)
        .unwrap();
    let client = Client::new(transport, eliza());

    let method = client
        .method::<IntroduceRequest, IntroduceResponse>("Introduce")
        .unwrap();
    let mut stream = client
        .stream(&method, introduce(), CallOptions::new())
        .await
        .unwrap();

    let err = stream.collect_messages().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::MaxBytesExceeded {
            kind: "response",
            ..
        }
    ));
}

#[tokio::test]
async fn oversized_frame_is_rejected_from_its_header() {
    // Announces 1 MiB but only a fraction of the payload follows
    let mut body = vec![envelope_flags::MESSAGE];
    body.extend_from_slice(&(1024u32 * 1024).to_be_bytes());
    body.extend_from_slice(&[0u8; 256 * 1024]);
    let http = MockHttp::ok().chunked(&body, 64 * 1024);
    let transport = Transport::builder(BASE_URL)
        .read_max_bytes(16)
        .build(http)
        .unwrap();
    let client = Client::new(transport, eliza());

    let method = client
        .method::<IntroduceRequest, IntroduceResponse>("Introduce")
        .unwrap();
    let mut stream = client
        .stream(&method, introduce(), CallOptions::new())
        .await
        .unwrap();

    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        ClientError::MaxBytesExceeded {
            kind: "response",
            size: 1048576,
            max: 16
        }
    ));
    assert!(format!("{stream:?}").contains("buffered: 0"));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn compressed_frame_over_read_limit() {
    let reply = IntroduceResponse {
        sentence: "x".repeat(4096),
    };
    let compressed = gzip().compress(&reply.encode_to_vec()).unwrap();
    let body = [
        wrap_envelope(envelope_flags::COMPRESSED, &compressed).unwrap(),
        end_frame("{}"),
    ]
    .concat();
    let http = MockHttp::ok()
        .header("connect-content-encoding", "gzip")
        .chunk(body);
    let transport = Transport::builder(BASE_URL)
        .read_max_bytes(256)
        .build(http)
        .unwrap();
    let client = Client::new(transport, eliza());

    let method = client
        .method::<IntroduceRequest, IntroduceResponse>("Introduce")
        .unwrap();
    let mut stream = client
        .stream(&method, introduce(), CallOptions::new())
        .await
        .unwrap();

    let err = stream.collect_messages().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::MaxBytesExceeded {
            kind: "response",
            size: 257,
            max: 256
        }
    ));
}

#[tokio::test]
async fn empty_request_stream_is_rejected_without_io() {
    let http = MockHttp::ok();
    let client = client(http.clone());

    let method = client.method::<SayRequest, SayResponse>("Reflect").unwrap();
    let err = client
        .stream(&method, Input::stream(Vec::<SayRequest>::new()), CallOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Encode(_)));
    assert!(err.to_string().contains("at least one message"));
    assert!(http.requests().is_empty());
}

#[tokio::test]
async fn non_200_stream_response() {
    let http = MockHttp::new(503).chunk("unavailable");
    let client = client(http);

    let method = client
        .method::<IntroduceRequest, IntroduceResponse>("Introduce")
        .unwrap();
    let err = client
        .stream(&method, introduce(), CallOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), Code::Unavailable);
    assert_eq!(err.message(), Some("unexpected HTTP status code: 503"));
}

#[tokio::test]
async fn unknown_stream_compression() {
    let http = MockHttp::ok()
        .header("connect-content-encoding", "br")
        .chunk(end_frame("{}"));
    let client = client(http);

    let method = client
        .method::<IntroduceRequest, IntroduceResponse>("Introduce")
        .unwrap();
    let err = client
        .stream(&method, introduce(), CallOptions::new())
        .await
        .unwrap_err();

    match err {
        ClientError::UnknownCompression { encoding, accepted } => {
            assert_eq!(encoding, "br");
            assert_eq!(accepted, ["gzip"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn compressed_frame_without_negotiated_codec() {
    let gzip = gzip();
    let compressed = gzip
        .compress(&IntroduceResponse::default().encode_to_vec())
        .unwrap();
    let http =
        MockHttp::ok().chunk(wrap_envelope(envelope_flags::COMPRESSED, &compressed).unwrap());
    let client = client(http);

    let method = client
        .method::<IntroduceRequest, IntroduceResponse>("Introduce")
        .unwrap();
    let mut stream = client
        .stream(&method, introduce(), CallOptions::new())
        .await
        .unwrap();

    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::UnknownCompression { .. }));
}

#[tokio::test]
async fn stream_without_send_compression() {
    let http = MockHttp::ok().chunk(end_frame("{}"));
    let transport = Transport::builder(BASE_URL)
        .accept_compression(Vec::<BoxedCodec>::new())
        .send_compression(None)
        .build(http.clone())
        .unwrap();
    let client = Client::new(transport, eliza());

    let method = client
        .method::<IntroduceRequest, IntroduceResponse>("Introduce")
        .unwrap();
    client
        .stream(&method, introduce(), CallOptions::new())
        .await
        .unwrap();

    let sent = http.only_request();
    assert_eq!(sent.header("connect-accept-encoding"), Some("identity"));
    assert_eq!(sent.header("connect-content-encoding"), None);
}

#[tokio::test]
async fn stream_request_trailers() {
    let http = MockHttp::ok().chunk(end_frame("{}"));
    let client = client(http.clone());

    let options = CallOptions::new()
        .try_header("x-user", "ada")
        .unwrap()
        .try_trailer("x-sent", "3")
        .unwrap();
    let method = client
        .method::<IntroduceRequest, IntroduceResponse>("Introduce")
        .unwrap();
    client.stream(&method, introduce(), options).await.unwrap();

    let sent = http.only_request();
    assert_eq!(sent.header("x-user"), Some("ada"));
    assert_eq!(sent.header("trailer-x-sent"), Some("3"));
}

#[tokio::test]
async fn bidi_is_rejected_without_io() {
    let http = MockHttp::ok();
    let client = client(http.clone());

    let method = client.method::<SayRequest, SayResponse>("Converse").unwrap();
    let err = client
        .stream(&method, SayRequest::default(), CallOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::NotSupported(_)));
    assert!(err.to_string().contains("bidi streaming is not supported"));
    assert!(http.requests().is_empty());
}
