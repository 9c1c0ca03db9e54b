//! Error and end-of-stream parsing for the Connect protocol.
//!
//! Two fixed JSON shapes cross the wire:
//!
//! ```json
//! {"code": "not_found", "message": "resource not found", "details": [
//!   {"type": "google.rpc.RetryInfo", "value": "base64-encoded-bytes"}
//! ]}
//! ```
//!
//! is the body of a failed unary call, and
//!
//! ```json
//! {"metadata": {"x-checksum": ["abc"]}, "error": {"code": "internal"}}
//! ```
//!
//! is the payload of the end-of-stream frame that closes every streaming response.

use std::collections::BTreeMap;

use connectrpc_core::{Code, ErrorDetail};
use serde::Deserialize;

use crate::ClientError;
use crate::response::Metadata;

/// JSON structure for Connect errors.
#[derive(Deserialize)]
struct ErrorJson {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Vec<serde_json::Value>,
    #[serde(default)]
    metadata: BTreeMap<String, MetadataValues>,
}

/// JSON structure for error details.
#[derive(Deserialize)]
struct ErrorDetailJson {
    #[serde(rename = "type")]
    type_url: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    debug: Option<serde_json::Value>,
}

/// JSON structure for the end-of-stream message.
#[derive(Deserialize, Default)]
struct EndStreamJson {
    #[serde(default)]
    metadata: BTreeMap<String, MetadataValues>,
    #[serde(default)]
    error: Option<ErrorJson>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MetadataValues {
    Many(Vec<String>),
    One(String),
}

/// Decoded end-of-stream message.
#[derive(Debug)]
pub(crate) struct EndStream {
    pub(crate) trailer: Metadata,
    pub(crate) error: Option<ClientError>,
}

/// Parse the body of a non-200 unary response.
///
/// The code comes from the body when present, otherwise from the HTTP status.
/// A body that is not a JSON error object yields a status-derived error with
/// no message.
pub(crate) fn parse_unary_error(status: u16, body: &[u8]) -> ClientError {
    match serde_json::from_slice::<ErrorJson>(body) {
        Ok(json) => {
            let fallback = Code::from_http_code(status);
            build_error(json, fallback)
        }
        Err(e) => {
            tracing::debug!(status, error = %e, "error body is not a Connect error");
            ClientError::from_code(Code::from_http_code(status))
        }
    }
}

/// Parse the payload of an end-of-stream frame.
///
/// An empty payload is treated as `{}`.
pub(crate) fn parse_end_stream(payload: &[u8]) -> Result<EndStream, ClientError> {
    let json = if payload.is_empty() {
        EndStreamJson::default()
    } else {
        serde_json::from_slice::<EndStreamJson>(payload).map_err(|_| {
            ClientError::InvalidStreamResponse(format!(
                "invalid end stream message: {:?}",
                String::from_utf8_lossy(payload)
            ))
        })?
    };

    Ok(EndStream {
        trailer: to_metadata(json.metadata),
        error: json.error.map(|error| build_error(error, Code::Unknown)),
    })
}

fn build_error(json: ErrorJson, fallback: Code) -> ClientError {
    let code = json
        .code
        .as_deref()
        .map(Code::from_name)
        .unwrap_or(fallback);

    let mut err = match json.message {
        Some(message) => ClientError::new(code, message),
        None => ClientError::from_code(code),
    };

    for detail in json.details {
        if let Some(detail) = parse_error_detail(detail) {
            err = err.add_error_detail(detail);
        }
    }

    err.with_metadata(to_metadata(json.metadata))
}

/// Parse a single error detail, skipping it if malformed.
fn parse_error_detail(value: serde_json::Value) -> Option<ErrorDetail> {
    let json: ErrorDetailJson = serde_json::from_value(value).ok()?;
    let detail = ErrorDetail::from_wire(json.type_url, &json.value)?;

    Some(match json.debug {
        Some(debug) => detail.with_debug(debug),
        None => detail,
    })
}

fn to_metadata(map: BTreeMap<String, MetadataValues>) -> Metadata {
    let mut metadata = Metadata::empty();
    for (key, values) in map {
        match values {
            MetadataValues::Many(values) => {
                for value in values {
                    metadata.append_lossy(&key, &value);
                }
            }
            MetadataValues::One(value) => metadata.append_lossy(&key, &value),
        }
    }
    metadata
}
