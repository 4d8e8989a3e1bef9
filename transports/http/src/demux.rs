//! Splits an HTTP reply into its structured part and its payload stream.
//!
//! Three layouts are accepted, tried in this order:
//!
//! 1. `WEB5-RESPONSE` header: base64url JSON reply, body is the payload.
//!    Older nodes only; slated for removal.
//! 2. `dwn-response` header: JSON-RPC envelope, body is the payload.
//! 3. No header: the body is a JSON-RPC envelope with no payload.

use dwn_core::{
    DataStream, DecodeError, DwnReply, Result, TransportError, WireReply, base64url,
    rpc::{self, JsonRpcResponse},
};
use futures::StreamExt;
use reqwest::header::HeaderValue;
use serde_json::Value;

pub const DWN_RESPONSE_HEADER: &str = "dwn-response";
pub const LEGACY_RESPONSE_HEADER: &str = "web5-response";

pub(crate) async fn decode_response(endpoint: &str, response: reqwest::Response) -> Result<DwnReply> {
    let headers = response.headers();
    let wire = if let Some(value) = headers.get(LEGACY_RESPONSE_HEADER) {
        tracing::warn!(%endpoint, "node replied with deprecated WEB5-RESPONSE header");
        Some(parse_legacy_header(header_str(value, "WEB5-RESPONSE")?)?)
    } else if let Some(value) = headers.get(DWN_RESPONSE_HEADER) {
        tracing::debug!(%endpoint, "reply metadata in dwn-response header");
        Some(parse_envelope(header_str(value, "dwn-response")?)?)
    } else {
        None
    };

    if let Some(wire) = wire {
        return Ok(wire.into_reply(Some(body_stream(response)))?);
    }

    tracing::debug!(%endpoint, "reply embedded in body");
    let body = response
        .bytes()
        .await
        .map_err(|source| TransportError::Connection {
            endpoint: endpoint.to_owned(),
            source: Box::new(source),
        })?;
    let envelope: JsonRpcResponse =
        serde_json::from_slice(&body).map_err(|source| DecodeError::Json {
            context: "reply body",
            source,
        })?;
    Ok(unwrap_reply(envelope)?.into_reply(None)?)
}

fn body_stream(response: reqwest::Response) -> DataStream {
    Box::new(
        response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other)),
    )
}

fn header_str<'a>(value: &'a HeaderValue, context: &'static str) -> Result<&'a str> {
    value
        .to_str()
        .map_err(|_| DecodeError::Header { context }.into())
}

pub(crate) fn parse_legacy_header(value: &str) -> Result<WireReply> {
    let json = base64url::decode(value, "WEB5-RESPONSE header")?;
    serde_json::from_slice(&json).map_err(|source| {
        DecodeError::Json {
            context: "WEB5-RESPONSE header",
            source,
        }
        .into()
    })
}

pub(crate) fn parse_envelope(value: &str) -> Result<WireReply> {
    unwrap_reply(rpc::decode_response(value)?)
}

/// Takes `result.reply` out of a successful envelope. An `error` member is
/// surfaced as [`dwn_core::Error::Protocol`].
pub(crate) fn unwrap_reply(envelope: JsonRpcResponse) -> Result<WireReply> {
    let reply = match envelope.into_result()? {
        Value::Object(mut result) => result.remove("reply"),
        _ => None,
    };
    let reply = reply.ok_or_else(|| DecodeError::Shape {
        context: "JSON-RPC result",
        reason: "missing 'reply'".to_owned(),
    })?;
    serde_json::from_value(reply).map_err(|source| {
        DecodeError::Json {
            context: "JSON-RPC result.reply",
            source,
        }
        .into()
    })
}
