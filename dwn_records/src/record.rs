use std::sync::Arc;

use bytes::Bytes;
use dwn_core::{DataStream, DecodeError, ReplyRecord, Result};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::data::{DataAccessor, RecordData};
use crate::descriptor::RecordsWriteDescriptor;
use crate::reader::{RecordReader, RecordRef, encoded_data};

/// Everything a [`Record`] is built from.
pub struct RecordOptions {
    pub record_id: String,
    pub author: String,
    pub target: String,
    pub context_id: Option<String>,
    pub descriptor: RecordsWriteDescriptor,
    pub encryption: Option<Value>,
    pub attestation: Option<Value>,
    /// Inline payload. Takes precedence over `data`.
    pub encoded_data: Option<Bytes>,
    pub data: Option<DataStream>,
}

/// Client-side handle to one stored record.
///
/// Metadata is fixed at construction. The payload is read through
/// [`Record::data`]; see [`DataAccessor`] for when it can be read more than
/// once.
#[derive(Debug)]
pub struct Record {
    id: String,
    author: String,
    target: String,
    context_id: Option<String>,
    descriptor: RecordsWriteDescriptor,
    encryption: Option<Value>,
    attestation: Option<Value>,
    data: DataAccessor,
}

impl Record {
    /// `reader` is only used when neither inline bytes nor a stream were
    /// supplied.
    pub fn new(reader: Arc<dyn RecordReader>, options: RecordOptions) -> Self {
        let data = match (options.encoded_data, options.data) {
            (Some(bytes), stream) => {
                if stream.is_some() {
                    tracing::debug!(record_id = %options.record_id, "inline data supplied, dropping stream");
                }
                DataAccessor::new(RecordData::Encoded(bytes))
            }
            (None, Some(stream)) => DataAccessor::new(RecordData::Stream(stream)),
            (None, None) => DataAccessor::pending(
                reader,
                RecordRef {
                    record_id: options.record_id.clone(),
                    author: options.author.clone(),
                    target: options.target.clone(),
                },
            ),
        };

        Self {
            id: options.record_id,
            author: options.author,
            target: options.target,
            context_id: options.context_id,
            descriptor: options.descriptor,
            encryption: options.encryption,
            attestation: options.attestation,
            data,
        }
    }

    /// Builds a record from the record member of a node reply.
    pub fn from_reply(
        reader: Arc<dyn RecordReader>,
        author: impl Into<String>,
        target: impl Into<String>,
        record: ReplyRecord,
    ) -> Result<Self> {
        let ReplyRecord { message, data } = record;
        let record_id = required_str(&message, "recordId")?;
        let descriptor = message.get("descriptor").cloned().ok_or_else(|| DecodeError::Shape {
            context: "record",
            reason: "missing 'descriptor'".to_owned(),
        })?;
        let descriptor: RecordsWriteDescriptor = serde_json::from_value(descriptor)
            .map_err(|source| DecodeError::Json {
                context: "record descriptor",
                source,
            })?;

        Ok(Self::new(
            reader,
            RecordOptions {
                record_id,
                author: author.into(),
                target: target.into(),
                context_id: optional_str(&message, "contextId")?,
                descriptor,
                encryption: present(&message, "encryption"),
                attestation: present(&message, "attestation"),
                encoded_data: encoded_data(&message)?,
                data,
            },
        ))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn context_id(&self) -> Option<&str> {
        self.context_id.as_deref()
    }

    pub fn descriptor(&self) -> &RecordsWriteDescriptor {
        &self.descriptor
    }

    pub fn interface(&self) -> &str {
        &self.descriptor.interface
    }

    pub fn method(&self) -> &str {
        &self.descriptor.method
    }

    pub fn protocol(&self) -> Option<&str> {
        self.descriptor.protocol.as_deref()
    }

    pub fn protocol_path(&self) -> Option<&str> {
        self.descriptor.protocol_path.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.descriptor.schema.as_deref()
    }

    pub fn recipient(&self) -> Option<&str> {
        self.descriptor.recipient.as_deref()
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.descriptor.parent_id.as_deref()
    }

    pub fn data_cid(&self) -> &str {
        &self.descriptor.data_cid
    }

    pub fn data_format(&self) -> &str {
        &self.descriptor.data_format
    }

    pub fn data_size(&self) -> u64 {
        self.descriptor.data_size
    }

    pub fn date_created(&self) -> &str {
        &self.descriptor.date_created
    }

    pub fn date_modified(&self) -> &str {
        &self.descriptor.date_modified
    }

    pub fn date_published(&self) -> Option<&str> {
        self.descriptor.date_published.as_deref()
    }

    pub fn published(&self) -> bool {
        self.descriptor.published.unwrap_or(false)
    }

    pub fn encryption(&self) -> Option<&Value> {
        self.encryption.as_ref()
    }

    pub fn attestation(&self) -> Option<&Value> {
        self.attestation.as_ref()
    }

    pub fn data(&self) -> &DataAccessor {
        &self.data
    }

    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Flat JSON view of a record. Absent optional fields are left out.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordJson<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    attestation: Option<&'a Value>,
    author: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context_id: Option<&'a str>,
    data_cid: &'a str,
    data_format: &'a str,
    data_size: u64,
    date_created: &'a str,
    date_modified: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_published: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encryption: Option<&'a Value>,
    interface: &'a str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    protocol: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    protocol_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    published: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipient: Option<&'a str>,
    record_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    target: &'a str,
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let d = &self.descriptor;
        RecordJson {
            attestation: self.attestation.as_ref(),
            author: &self.author,
            context_id: self.context_id.as_deref(),
            data_cid: &d.data_cid,
            data_format: &d.data_format,
            data_size: d.data_size,
            date_created: &d.date_created,
            date_modified: &d.date_modified,
            date_published: d.date_published.as_deref(),
            encryption: self.encryption.as_ref(),
            interface: &d.interface,
            method: &d.method,
            parent_id: d.parent_id.as_deref(),
            protocol: d.protocol.as_deref(),
            protocol_path: d.protocol_path.as_deref(),
            published: d.published,
            recipient: d.recipient.as_deref(),
            record_id: &self.id,
            schema: d.schema.as_deref(),
            target: &self.target,
        }
        .serialize(serializer)
    }
}

fn required_str(message: &Map<String, Value>, key: &'static str) -> Result<String> {
    optional_str(message, key)?.ok_or_else(|| {
        DecodeError::Shape {
            context: "record",
            reason: format!("missing '{key}'"),
        }
        .into()
    })
}

fn optional_str(message: &Map<String, Value>, key: &'static str) -> Result<Option<String>> {
    match message.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(DecodeError::Shape {
            context: "record",
            reason: format!("'{key}' should be a string, got {other}"),
        }
        .into()),
    }
}

fn present(message: &Map<String, Value>, key: &str) -> Option<Value> {
    message.get(key).filter(|value| !value.is_null()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AccessorState;
    use async_trait::async_trait;
    use dwn_core::{Error, base64url, stream_from_bytes};
    use serde_json::json;

    struct NoReader;

    #[async_trait]
    impl RecordReader for NoReader {
        async fn read_data(&self, _record: &RecordRef) -> Result<RecordData> {
            Err(DecodeError::Shape {
                context: "test",
                reason: "no node attached".to_owned(),
            }
            .into())
        }
    }

    fn reply_record(extra: Value) -> Map<String, Value> {
        let mut message = json!({
            "recordId": "bafyreiabc",
            "contextId": "bafyreiabc",
            "descriptor": {
                "interface": "Records",
                "method": "Write",
                "dataCid": "bafkreidata",
                "dataFormat": "application/json",
                "dataSize": 17,
                "dateCreated": "2024-01-01T00:00:00.000000Z",
                "messageTimestamp": "2024-01-02T00:00:00.000000Z",
                "schema": "https://schema.org/Thing"
            }
        });
        if let (Some(message), Value::Object(extra)) = (message.as_object_mut(), extra) {
            message.extend(extra);
        }
        match message {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn from_reply_prefers_encoded_data() {
        let message = reply_record(json!({
            "encodedData": base64url::encode(br#"{"hello":"world"}"#)
        }));
        let record = Record::from_reply(
            Arc::new(NoReader),
            "did:ex:alice",
            "did:ex:alice",
            ReplyRecord {
                message,
                data: Some(stream_from_bytes(Bytes::from_static(b"ignored"))),
            },
        )
        .unwrap();

        assert_eq!(record.id(), "bafyreiabc");
        assert_eq!(record.date_modified(), "2024-01-02T00:00:00.000000Z");
        assert_eq!(record.schema(), Some("https://schema.org/Thing"));
        assert!(!record.published());
        for _ in 0..3 {
            assert_eq!(
                *record.data().data_json().await.unwrap(),
                json!({ "hello": "world" })
            );
        }
    }

    #[tokio::test]
    async fn from_reply_uses_stream_once() {
        let record = Record::from_reply(
            Arc::new(NoReader),
            "did:ex:alice",
            "did:ex:bob",
            ReplyRecord {
                message: reply_record(json!({})),
                data: Some(stream_from_bytes(Bytes::from_static(b"\"hi\""))),
            },
        )
        .unwrap();

        assert_eq!(*record.data().data_json().await.unwrap(), json!("hi"));
        assert!(matches!(
            record.data().data_json().await,
            Err(Error::StreamExhausted)
        ));
    }

    #[test]
    fn from_reply_requires_identity_and_descriptor() {
        let mut message = reply_record(json!({}));
        message.remove("recordId");
        let err = Record::from_reply(
            Arc::new(NoReader),
            "a",
            "t",
            ReplyRecord {
                message,
                data: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::Shape { .. })));

        let mut message = reply_record(json!({}));
        message.remove("descriptor");
        assert!(
            Record::from_reply(
                Arc::new(NoReader),
                "a",
                "t",
                ReplyRecord {
                    message,
                    data: None
                }
            )
            .is_err()
        );
    }

    #[test]
    fn to_json_omits_absent_fields_and_renames_id() {
        let record = Record::from_reply(
            Arc::new(NoReader),
            "did:ex:alice",
            "did:ex:bob",
            ReplyRecord {
                message: reply_record(json!({ "attestation": null })),
                data: None,
            },
        )
        .unwrap();
        assert_eq!(record.data().state(), AccessorState::Unread);

        let value = record.to_json().unwrap();
        assert_eq!(
            value,
            json!({
                "author": "did:ex:alice",
                "contextId": "bafyreiabc",
                "dataCid": "bafkreidata",
                "dataFormat": "application/json",
                "dataSize": 17,
                "dateCreated": "2024-01-01T00:00:00.000000Z",
                "dateModified": "2024-01-02T00:00:00.000000Z",
                "interface": "Records",
                "method": "Write",
                "recordId": "bafyreiabc",
                "schema": "https://schema.org/Thing",
                "target": "did:ex:bob"
            })
        );
        assert!(value.get("id").is_none());
    }
}
