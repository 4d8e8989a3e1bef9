use async_trait::async_trait;
use bytes::Bytes;
use dwn_core::{DecodeError, DwnRequest, Error, Result, Transport, base64url};
use serde_json::{Map, Value};

use crate::data::RecordData;

/// Identifies a record for a data fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub record_id: String,
    pub author: String,
    pub target: String,
}

/// The owning node, as seen by a record whose payload was not delivered
/// with it.
#[async_trait]
pub trait RecordReader: Send + Sync {
    /// Fetches the payload of `record`. Called at most once per successful
    /// materialization.
    async fn read_data(&self, record: &RecordRef) -> Result<RecordData>;
}

/// Builds the signed `RecordsRead` message for a record.
///
/// Signing and DID handling live outside this crate; implementations
/// return the finished message object.
#[async_trait]
pub trait ReadMessageBuilder: Send + Sync {
    async fn records_read(&self, record: &RecordRef) -> Result<Map<String, Value>>;
}

/// [`RecordReader`] that issues a `RecordsRead` over a [`Transport`].
pub struct TransportRecordReader<T, B> {
    transport: T,
    endpoint: String,
    builder: B,
}

impl<T, B> TransportRecordReader<T, B>
where
    T: Transport,
    B: ReadMessageBuilder,
{
    pub fn new(transport: T, endpoint: impl Into<String>, builder: B) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            builder,
        }
    }
}

#[async_trait]
impl<T, B> RecordReader for TransportRecordReader<T, B>
where
    T: Transport,
    B: ReadMessageBuilder,
{
    async fn read_data(&self, record: &RecordRef) -> Result<RecordData> {
        let message = self.builder.records_read(record).await?;
        let request = DwnRequest::new(&record.target, &record.author, message);
        let reply = self.transport.send(&self.endpoint, request).await?;
        if !reply.status.is_success() {
            return Err(Error::Rejected(reply.status));
        }

        let read = reply.record.ok_or_else(|| DecodeError::Shape {
            context: "RecordsRead reply",
            reason: "no record in reply".to_owned(),
        })?;
        if let Some(encoded) = encoded_data(&read.message)? {
            return Ok(RecordData::Encoded(encoded));
        }
        match read.data {
            Some(stream) => Ok(RecordData::Stream(stream)),
            None => Err(DecodeError::Shape {
                context: "RecordsRead reply",
                reason: "record carries no data".to_owned(),
            }
            .into()),
        }
    }
}

/// Decodes the `encodedData` member of a record message, if present.
pub(crate) fn encoded_data(message: &Map<String, Value>) -> Result<Option<Bytes>> {
    match message.get("encodedData") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(Bytes::from(base64url::decode(text, "encodedData")?))),
        Some(other) => Err(DecodeError::Shape {
            context: "encodedData",
            reason: format!("expected a base64url string, got {other}"),
        }
        .into()),
    }
}
