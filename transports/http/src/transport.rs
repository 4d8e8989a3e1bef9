use std::time::Duration;

use async_trait::async_trait;
use dwn_core::{
    DwnReply, DwnRequest, Result, Transport, TransportError,
    rpc::{self, PROCESS_MESSAGE_METHOD},
};
use reqwest::header::{CACHE_CONTROL, HeaderName, HeaderValue};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::HttpTransportConfig;
use crate::demux;

/// Longest error body kept in [`TransportError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Sends DWN messages to a node over HTTP.
///
/// The JSON-RPC envelope travels in a request header so that the request
/// body can carry the record payload as a raw stream.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    request_header: HeaderName,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
            request_header: HeaderName::from_static(crate::DWN_REQUEST_HEADER),
        }
    }

    pub fn from_config(config: &HttpTransportConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent);
        }
        let http_client = builder
            .build()
            .map_err(|err| TransportError::Request(format!("invalid HTTP client config: {err}")))?;
        Self::with_client(http_client, config)
    }

    pub fn with_client(http_client: reqwest::Client, config: &HttpTransportConfig) -> Result<Self> {
        let request_header = HeaderName::from_bytes(config.request_header.as_bytes()).map_err(|_| {
            TransportError::Request(format!(
                "invalid request header name '{}'",
                config.request_header
            ))
        })?;
        Ok(Self {
            http_client,
            request_header,
        })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, endpoint: &str, request: DwnRequest) -> Result<DwnReply> {
        let DwnRequest {
            target,
            author,
            message,
            data,
        } = request;

        let request_id = Uuid::new_v4().to_string();
        let envelope = rpc::build_request(
            request_id.as_str(),
            PROCESS_MESSAGE_METHOD,
            Some(merge_params(message, author, target)),
        );
        let envelope = ascii_only(&rpc::encode(&envelope)?);
        let envelope = HeaderValue::from_str(&envelope)
            .map_err(|err| TransportError::Request(format!("envelope is not a valid header: {err}")))?;

        tracing::debug!(%endpoint, %request_id, with_data = data.is_some(), "sending DWN message");
        let mut builder = self
            .http_client
            .post(endpoint)
            .header(self.request_header.clone(), envelope)
            .header(CACHE_CONTROL, "no-cache");
        if let Some(data) = data {
            builder = builder.body(reqwest::Body::wrap_stream(data));
        }

        let response = builder.send().await.map_err(|err| {
            if err.is_builder() {
                TransportError::Request(err.to_string())
            } else {
                TransportError::Connection {
                    endpoint: endpoint.to_owned(),
                    source: Box::new(err),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect();
            tracing::warn!(%endpoint, %request_id, status = status.as_u16(), "DWN request failed");
            return Err(TransportError::Status {
                endpoint: endpoint.to_owned(),
                status: status.as_u16(),
                body,
            }
            .into());
        }

        demux::decode_response(endpoint, response).await
    }
}

/// Flattens the message and the identity fields into one params object.
///
/// `author` and `target` always come from the request; keys of the same
/// name inside the message are overwritten.
fn merge_params(mut message: Map<String, Value>, author: String, target: String) -> Value {
    if message.contains_key("author") || message.contains_key("target") {
        tracing::debug!("message author/target replaced by the request's identity");
    }
    message.insert("author".to_owned(), Value::String(author));
    message.insert("target".to_owned(), Value::String(target));
    Value::Object(message)
}

/// Escapes every character of a JSON text that is not allowed in an HTTP
/// header value as `\uXXXX`. serde_json leaves non-ASCII text and DEL
/// unescaped; both only occur inside strings.
fn ascii_only(json: &str) -> String {
    let needs_escape = |c: char| !c.is_ascii() || c.is_ascii_control();
    if !json.chars().any(needs_escape) {
        return json.to_owned();
    }
    let mut out = String::with_capacity(json.len() + 16);
    let mut units = [0u16; 2];
    for c in json.chars() {
        if !needs_escape(c) {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}
