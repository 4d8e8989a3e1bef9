use std::fmt;

use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// A byte stream that can be read once, front to back.
pub type DataStream = Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send + Unpin + 'static>;

/// Wraps an in-memory buffer as a single-chunk [`DataStream`].
pub fn stream_from_bytes(bytes: Bytes) -> DataStream {
    Box::new(futures::stream::once(futures::future::ready(Ok(bytes))))
}

/// HTTP-style status a node attaches to every reply, whatever the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: u16,
    pub detail: String,
}

impl Status {
    pub fn new(code: u16, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.detail)
    }
}

/// A message submission addressed to a node.
pub struct DwnRequest {
    /// The DID whose node context the message is processed in.
    pub target: String,
    /// The DID on whose behalf the message is authorized.
    pub author: String,
    /// Protocol message; passed through without interpretation.
    pub message: Map<String, Value>,
    pub data: Option<DataStream>,
}

impl DwnRequest {
    pub fn new(
        target: impl Into<String>,
        author: impl Into<String>,
        message: Map<String, Value>,
    ) -> Self {
        Self {
            target: target.into(),
            author: author.into(),
            message,
            data: None,
        }
    }

    pub fn with_data(mut self, data: DataStream) -> Self {
        self.data = Some(data);
        self
    }
}

impl fmt::Debug for DwnRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DwnRequest")
            .field("target", &self.target)
            .field("author", &self.author)
            .field("message", &self.message)
            .field("data", &self.data.is_some())
            .finish()
    }
}

/// A single record returned by a node, with its payload stream if the
/// transport delivered one.
pub struct ReplyRecord {
    pub message: Map<String, Value>,
    pub data: Option<DataStream>,
}

impl fmt::Debug for ReplyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyRecord")
            .field("message", &self.message)
            .field("data", &self.data.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub struct DwnReply {
    pub status: Status,
    pub message: Option<Value>,
    pub record: Option<ReplyRecord>,
    /// Only set for query-style operations.
    pub entries: Option<Vec<Value>>,
}

impl DwnReply {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            message: None,
            record: None,
            entries: None,
        }
    }
}

/// The JSON part of a reply as it travels in headers and bodies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireReply {
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<Value>>,
}

impl WireReply {
    /// Attaches the payload stream. Any `data` member in the wire record is
    /// dropped since a stream cannot travel inside JSON.
    pub fn into_reply(self, data: Option<DataStream>) -> Result<DwnReply, DecodeError> {
        let status = self.status.ok_or_else(|| DecodeError::Shape {
            context: "reply",
            reason: "missing 'status'".to_owned(),
        })?;
        let record = self.record.map(|mut message| {
            message.remove("data");
            ReplyRecord { message, data }
        });
        Ok(DwnReply {
            status,
            message: self.message,
            record,
            entries: self.entries,
        })
    }

    /// Detaches the payload stream from a reply, leaving its JSON part.
    pub fn from_reply(reply: DwnReply) -> (Self, Option<DataStream>) {
        let (record, data) = match reply.record {
            Some(record) => (Some(record.message), record.data),
            None => (None, None),
        };
        let wire = WireReply {
            status: Some(reply.status),
            message: reply.message,
            record,
            entries: reply.entries,
        };
        (wire, data)
    }
}
