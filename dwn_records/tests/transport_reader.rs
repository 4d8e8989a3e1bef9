use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dwn_core::{DwnRequest, Error, Result, Status, Transport, stream_from_bytes};
use dwn_records::{
    AccessorState, ReadMessageBuilder, Record, RecordOptions, RecordRef, RecordsWriteDescriptor,
    TransportRecordReader,
};
use dwn_transport_memory::{MemoryNode, MemoryTransport};
use serde_json::{Map, Value, json};

const ALICE: &str = "did:ex:alice";
const ENDPOINT: &str = "memory://local";

type Node = MemoryTransport<Arc<MemoryNode>>;

/// Builds unsigned `RecordsRead` messages and counts them.
#[derive(Clone, Default)]
struct CountingBuilder {
    calls: Arc<AtomicUsize>,
}

impl CountingBuilder {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadMessageBuilder for CountingBuilder {
    async fn records_read(&self, record: &RecordRef) -> Result<Map<String, Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(object(json!({
            "descriptor": {
                "interface": "Records",
                "method": "Read",
                "filter": { "recordId": record.record_id }
            }
        })))
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn descriptor(data: &[u8], format: &str) -> Value {
    json!({
        "interface": "Records",
        "method": "Write",
        "dataCid": "bafkreihello",
        "dataFormat": format,
        "dataSize": data.len(),
        "dateCreated": "2024-05-01T10:00:00.000000Z",
        "dateModified": "2024-05-01T10:00:00.000000Z"
    })
}

async fn store(transport: &Arc<Node>, record_id: &str, data: &'static [u8], format: &str) -> anyhow::Result<Status> {
    let message = object(json!({
        "recordId": record_id,
        "descriptor": descriptor(data, format)
    }));
    let request = DwnRequest::new(ALICE, ALICE, message).with_data(stream_from_bytes(Bytes::from_static(data)));
    Ok(transport.send(ENDPOINT, request).await?.status)
}

fn pending_record(
    transport: Arc<Node>,
    builder: CountingBuilder,
    record_id: &str,
    data: &[u8],
    format: &str,
) -> anyhow::Result<Record> {
    let reader = Arc::new(TransportRecordReader::new(transport, ENDPOINT, builder));
    let descriptor: RecordsWriteDescriptor = serde_json::from_value(descriptor(data, format))?;
    Ok(Record::new(
        reader,
        RecordOptions {
            record_id: record_id.into(),
            author: ALICE.into(),
            target: ALICE.into(),
            context_id: None,
            descriptor,
            encryption: None,
            attestation: None,
            encoded_data: None,
            data: None,
        },
    ))
}

#[tokio::test]
async fn write_returns_accepted_and_a_usable_record() -> anyhow::Result<()> {
    let transport = Arc::new(MemoryTransport::new(Arc::new(MemoryNode::new())));
    let builder = CountingBuilder::default();

    let status = store(&transport, "bafyreihello", b"Hello, world!", "text/plain").await?;
    assert_eq!(status, Status::new(202, "Accepted"));

    let record = pending_record(transport, builder.clone(), "bafyreihello", b"Hello, world!", "text/plain")?;
    assert_eq!(record.id(), "bafyreihello");
    assert_eq!(record.data_format(), "text/plain");
    assert_eq!(record.data().state(), AccessorState::Unread);
    assert_eq!(builder.calls(), 0);

    assert_eq!(record.data().data_text().await?, "Hello, world!");
    assert_eq!(builder.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_reads_of_a_pending_record_fetch_once() -> anyhow::Result<()> {
    let transport = Arc::new(MemoryTransport::new(Arc::new(MemoryNode::new())));
    let builder = CountingBuilder::default();
    store(&transport, "r1", br#"{"n":1}"#, "application/json").await?;

    let record = pending_record(transport, builder.clone(), "r1", br#"{"n":1}"#, "application/json")?;
    let (a, b, c) = tokio::join!(
        record.data().data_json(),
        record.data().data_json(),
        record.data().data_bytes(),
    );
    assert_eq!(*a?, json!({ "n": 1 }));
    assert_eq!(*b?, json!({ "n": 1 }));
    assert_eq!(c?, Bytes::from_static(br#"{"n":1}"#));
    assert_eq!(builder.calls(), 1);

    // The node answered with a stream, so the payload is gone now.
    assert_eq!(record.data().state(), AccessorState::Exhausted);
    assert!(matches!(record.data().data_bytes().await, Err(Error::StreamExhausted)));
    Ok(())
}

#[tokio::test]
async fn inline_reads_are_repeatable() -> anyhow::Result<()> {
    let transport = Arc::new(MemoryTransport::new(Arc::new(MemoryNode::with_inline_data_limit(1024))));
    let builder = CountingBuilder::default();
    store(&transport, "r1", b"small", "text/plain").await?;

    let record = pending_record(transport, builder.clone(), "r1", b"small", "text/plain")?;
    assert_eq!(record.data().data_text().await?, "small");
    assert_eq!(record.data().data_text().await?, "small");
    assert_eq!(record.data().state(), AccessorState::Cached);
    assert_eq!(builder.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn missing_record_is_rejected_and_retryable_later() -> anyhow::Result<()> {
    let transport = Arc::new(MemoryTransport::new(Arc::new(MemoryNode::with_inline_data_limit(1024))));
    let builder = CountingBuilder::default();

    let record = pending_record(transport.clone(), builder.clone(), "late", b"later", "text/plain")?;
    match record.data().data_text().await {
        Err(Error::Rejected(status)) => assert_eq!(status.code, 404),
        other => panic!("expected a rejection, got {other:?}"),
    }
    assert_eq!(record.data().state(), AccessorState::Unread);

    store(&transport, "late", b"later", "text/plain").await?;
    assert_eq!(record.data().data_text().await?, "later");
    assert_eq!(builder.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn query_entries_become_records() -> anyhow::Result<()> {
    let node = Arc::new(MemoryNode::with_inline_data_limit(1024));
    let transport = Arc::new(MemoryTransport::new(node));
    let builder = CountingBuilder::default();
    store(&transport, "r1", b"first", "text/plain").await?;

    let query = object(json!({
        "descriptor": { "interface": "Records", "method": "Query", "filter": {} }
    }));
    let reply = transport.send(ENDPOINT, DwnRequest::new(ALICE, ALICE, query)).await?;
    let entries = reply.entries.unwrap_or_default();
    assert_eq!(entries.len(), 1);

    let reader = Arc::new(TransportRecordReader::new(transport, ENDPOINT, builder.clone()));
    let entry = dwn_core::ReplyRecord {
        message: object(entries[0].clone()),
        data: None,
    };
    let record = Record::from_reply(reader, ALICE, ALICE, entry)?;
    assert_eq!(record.data().data_text().await?, "first");
    assert_eq!(builder.calls(), 0);
    assert_eq!(record.to_json()?["recordId"], "r1");
    Ok(())
}
