use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use dwn_core::{
    DataStream, DwnReply, ReplyRecord, Result, Status, TransportError, base64url,
    stream_from_bytes,
};
use futures::TryStreamExt;
use serde_json::{Map, Value};

use crate::transport::MessageHandler;

#[derive(Debug, Clone)]
struct StoredRecord {
    message: Map<String, Value>,
    data: Bytes,
}

/// Minimal in-memory node for tests and local development.
///
/// Understands `RecordsWrite`, `RecordsRead`, `RecordsQuery` and
/// `RecordsDelete`. Messages are stored as given: there is no signature,
/// schema or protocol validation.
#[derive(Debug, Default)]
pub struct MemoryNode {
    records: DashMap<(String, String), StoredRecord>,
    /// Payloads up to this many bytes are returned inline as `encodedData`
    /// instead of as a stream.
    inline_data_limit: usize,
}

impl MemoryNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inline_data_limit(limit: usize) -> Self {
        Self {
            inline_data_limit: limit,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    async fn write(
        &self,
        target: &str,
        mut message: Map<String, Value>,
        data: Option<DataStream>,
    ) -> Result<DwnReply> {
        let Some(record_id) = str_field(&message, "recordId") else {
            return Ok(bad_request("RecordsWrite without recordId"));
        };
        let record_id = record_id.to_owned();

        let inline = match message.remove("encodedData") {
            Some(Value::String(text)) => Some(Bytes::from(base64url::decode(&text, "encodedData")?)),
            _ => None,
        };
        let data = match (inline, data) {
            (Some(bytes), _) => bytes,
            (None, Some(stream)) => {
                let chunks: Vec<Bytes> = stream.try_collect().await.map_err(TransportError::Body)?;
                Bytes::from(chunks.concat())
            }
            (None, None) => Bytes::new(),
        };

        let declared = message
            .get("descriptor")
            .and_then(|d| d.get("dataSize"))
            .and_then(Value::as_u64);
        if declared.is_some_and(|size| size != data.len() as u64) {
            return Ok(bad_request("dataSize does not match the supplied data"));
        }

        tracing::debug!(%target, %record_id, size = data.len(), "memory node: storing record");
        self.records
            .insert((target.to_owned(), record_id), StoredRecord { message, data });
        Ok(DwnReply::new(Status::new(202, "Accepted")))
    }

    fn read(&self, target: &str, descriptor: &Value) -> DwnReply {
        let Some(record_id) = descriptor
            .get("filter")
            .and_then(|f| f.get("recordId"))
            .and_then(Value::as_str)
        else {
            return bad_request("RecordsRead without filter.recordId");
        };
        let Some(stored) = self
            .records
            .get(&(target.to_owned(), record_id.to_owned()))
            .map(|r| r.value().clone())
        else {
            return DwnReply::new(Status::new(404, "Not Found"));
        };

        let mut reply = DwnReply::new(Status::new(200, "OK"));
        reply.record = Some(if self.is_inline(&stored.data) {
            ReplyRecord {
                message: self.with_encoded_data(stored.message, &stored.data),
                data: None,
            }
        } else {
            ReplyRecord {
                message: stored.message,
                data: Some(stream_from_bytes(stored.data)),
            }
        });
        reply
    }

    fn query(&self, target: &str, descriptor: &Value) -> DwnReply {
        let filter = descriptor
            .get("filter")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let mut matches: Vec<StoredRecord> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == target)
            .filter(|entry| matches_filter(&entry.value().message, &filter))
            .map(|entry| entry.value().clone())
            .collect();
        matches.sort_by(|a, b| {
            let created = |r: &StoredRecord| {
                r.message
                    .get("descriptor")
                    .and_then(|d| d.get("dateCreated"))
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            };
            created(a)
                .cmp(&created(b))
                .then_with(|| str_field(&a.message, "recordId").cmp(&str_field(&b.message, "recordId")))
        });

        let entries = matches
            .into_iter()
            .map(|stored| {
                let message = if self.is_inline(&stored.data) {
                    self.with_encoded_data(stored.message, &stored.data)
                } else {
                    stored.message
                };
                Value::Object(message)
            })
            .collect();

        let mut reply = DwnReply::new(Status::new(200, "OK"));
        reply.entries = Some(entries);
        reply
    }

    fn delete(&self, target: &str, descriptor: &Value) -> DwnReply {
        let Some(record_id) = descriptor.get("recordId").and_then(Value::as_str) else {
            return bad_request("RecordsDelete without recordId");
        };
        match self.records.remove(&(target.to_owned(), record_id.to_owned())) {
            Some(_) => DwnReply::new(Status::new(202, "Accepted")),
            None => DwnReply::new(Status::new(404, "Not Found")),
        }
    }

    fn is_inline(&self, data: &Bytes) -> bool {
        !data.is_empty() && data.len() <= self.inline_data_limit
    }

    fn with_encoded_data(&self, mut message: Map<String, Value>, data: &Bytes) -> Map<String, Value> {
        message.insert("encodedData".to_owned(), Value::String(base64url::encode(data)));
        message
    }
}

#[async_trait]
impl MessageHandler for MemoryNode {
    async fn process_message(
        &self,
        target: &str,
        message: Map<String, Value>,
        data: Option<DataStream>,
    ) -> Result<DwnReply> {
        let descriptor = message.get("descriptor").cloned().unwrap_or(Value::Null);
        let interface = descriptor.get("interface").and_then(Value::as_str);
        let method = descriptor.get("method").and_then(Value::as_str);

        Ok(match (interface, method) {
            (Some("Records"), Some("Write")) => return self.write(target, message, data).await,
            (Some("Records"), Some("Read")) => self.read(target, &descriptor),
            (Some("Records"), Some("Query")) => self.query(target, &descriptor),
            (Some("Records"), Some("Delete")) => self.delete(target, &descriptor),
            (interface, method) => {
                tracing::debug!(?interface, ?method, "memory node: unsupported message");
                bad_request("unsupported interface or method")
            }
        })
    }
}

fn str_field<'a>(message: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    message.get(key).and_then(Value::as_str)
}

/// A filter matches when every key equals the same key of the record's
/// descriptor, or of the record itself for `recordId` and `contextId`.
fn matches_filter(message: &Map<String, Value>, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(key, expected)| {
        let actual = match key.as_str() {
            "recordId" | "contextId" => message.get(key),
            _ => message.get("descriptor").and_then(|d| d.get(key)),
        };
        actual == Some(expected)
    })
}

fn bad_request(detail: &str) -> DwnReply {
    DwnReply::new(Status::new(400, format!("Bad Request: {detail}")))
}
