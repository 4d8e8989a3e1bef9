//! JSON-RPC 2.0 envelopes exchanged with a DWN.
//!
//! Builders in this module are pure. Optional members (`id` on requests,
//! `data` on errors) keep "absent" distinct from `null` both when encoding
//! and after decoding.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::DecodeError;

/// The single method every DWN message submission goes through.
pub const PROCESS_MESSAGE_METHOD: &str = "dwn.processMessage";

const JSONRPC_VERSION: &str = "2.0";

/// Correlation token of a request/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcId {
    Number(i64),
    String(String),
    Null,
}

impl From<String> for JsonRpcId {
    fn from(value: String) -> Self {
        JsonRpcId::String(value)
    }
}

impl From<&str> for JsonRpcId {
    fn from(value: &str) -> Self {
        JsonRpcId::String(value.to_owned())
    }
}

impl From<i64> for JsonRpcId {
    fn from(value: i64) -> Self {
        JsonRpcId::Number(value)
    }
}

/// The `"jsonrpc": "2.0"` marker. Decoding any other value fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let version = String::deserialize(deserializer)?;
        if version == JSONRPC_VERSION {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported jsonrpc version '{version}'"
            )))
        }
    }
}

/// Error codes a DWN may answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonRpcErrorCode {
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ParseError,
    BadRequest,
    Unauthorized,
    Forbidden,
    /// A code outside the list above, kept so the node's message survives.
    Other(i64),
}

impl JsonRpcErrorCode {
    pub const fn code(self) -> i64 {
        match self {
            JsonRpcErrorCode::InvalidRequest => -32600,
            JsonRpcErrorCode::MethodNotFound => -32601,
            JsonRpcErrorCode::InvalidParams => -32602,
            JsonRpcErrorCode::InternalError => -32603,
            JsonRpcErrorCode::ParseError => -32700,
            JsonRpcErrorCode::BadRequest => -50400,
            JsonRpcErrorCode::Unauthorized => -50401,
            JsonRpcErrorCode::Forbidden => -50403,
            JsonRpcErrorCode::Other(code) => code,
        }
    }

    pub const fn from_code(code: i64) -> Self {
        match code {
            -32600 => JsonRpcErrorCode::InvalidRequest,
            -32601 => JsonRpcErrorCode::MethodNotFound,
            -32602 => JsonRpcErrorCode::InvalidParams,
            -32603 => JsonRpcErrorCode::InternalError,
            -32700 => JsonRpcErrorCode::ParseError,
            -50400 => JsonRpcErrorCode::BadRequest,
            -50401 => JsonRpcErrorCode::Unauthorized,
            -50403 => JsonRpcErrorCode::Forbidden,
            other => JsonRpcErrorCode::Other(other),
        }
    }
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for JsonRpcErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for JsonRpcErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(JsonRpcErrorCode::from_code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: JsonRpcVersion,
    /// `None` marks a notification.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub id: Option<JsonRpcId>,
    pub method: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Error member of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("JSON-RPC error {code}: {message}")]
pub struct JsonRpcError {
    pub code: JsonRpcErrorCode,
    pub message: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcOutcome {
    Success(Value),
    Failure(JsonRpcError),
}

/// A response carries exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireResponse", try_from = "WireResponse")]
pub struct JsonRpcResponse {
    pub id: JsonRpcId,
    pub outcome: JsonRpcOutcome,
}

impl JsonRpcResponse {
    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            JsonRpcOutcome::Success(result) => Some(result),
            JsonRpcOutcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&JsonRpcError> {
        match &self.outcome {
            JsonRpcOutcome::Success(_) => None,
            JsonRpcOutcome::Failure(error) => Some(error),
        }
    }

    /// Turns the envelope into its result, surfacing a failure as the error.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match self.outcome {
            JsonRpcOutcome::Success(result) => Ok(result),
            JsonRpcOutcome::Failure(error) => Err(error),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireResponse {
    jsonrpc: JsonRpcVersion,
    id: JsonRpcId,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

impl From<JsonRpcResponse> for WireResponse {
    fn from(response: JsonRpcResponse) -> Self {
        let (result, error) = match response.outcome {
            JsonRpcOutcome::Success(result) => (Some(result), None),
            JsonRpcOutcome::Failure(error) => (None, Some(error)),
        };
        WireResponse {
            jsonrpc: JsonRpcVersion,
            id: response.id,
            result,
            error,
        }
    }
}

impl TryFrom<WireResponse> for JsonRpcResponse {
    type Error = String;

    fn try_from(wire: WireResponse) -> Result<Self, Self::Error> {
        let outcome = match (wire.result, wire.error) {
            (Some(result), None) => JsonRpcOutcome::Success(result),
            (None, Some(error)) => JsonRpcOutcome::Failure(error),
            (Some(_), Some(_)) => {
                return Err("response carries both 'result' and 'error'".to_owned());
            }
            (None, None) => return Err("response carries neither 'result' nor 'error'".to_owned()),
        };
        Ok(JsonRpcResponse {
            id: wire.id,
            outcome,
        })
    }
}

/// Deserializes a present member (even `null`) as `Some`, so that together
/// with `#[serde(default)]` a missing member stays `None`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

pub fn build_request(
    id: impl Into<JsonRpcId>,
    method: impl Into<String>,
    params: Option<Value>,
) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: JsonRpcVersion,
        id: Some(id.into()),
        method: method.into(),
        params,
    }
}

pub fn build_notification(method: impl Into<String>, params: Option<Value>) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: JsonRpcVersion,
        id: None,
        method: method.into(),
        params,
    }
}

pub fn build_success(id: impl Into<JsonRpcId>, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        id: id.into(),
        outcome: JsonRpcOutcome::Success(result),
    }
}

/// Builds an error response. With `data: None` the `data` member is left
/// out of the encoded object entirely.
pub fn build_error(
    id: impl Into<JsonRpcId>,
    code: JsonRpcErrorCode,
    message: impl Into<String>,
    data: Option<Value>,
) -> JsonRpcResponse {
    JsonRpcResponse {
        id: id.into(),
        outcome: JsonRpcOutcome::Failure(JsonRpcError {
            code,
            message: message.into(),
            data,
        }),
    }
}

pub fn encode<T: Serialize>(envelope: &T) -> Result<String, DecodeError> {
    serde_json::to_string(envelope).map_err(|source| DecodeError::Json {
        context: "JSON-RPC envelope",
        source,
    })
}

fn decode<T: DeserializeOwned>(text: &str, context: &'static str) -> Result<T, DecodeError> {
    serde_json::from_str(text).map_err(|source| DecodeError::Json { context, source })
}

pub fn decode_request(text: &str) -> Result<JsonRpcRequest, DecodeError> {
    decode(text, "JSON-RPC request")
}

pub fn decode_response(text: &str) -> Result<JsonRpcResponse, DecodeError> {
    decode(text, "JSON-RPC response")
}
