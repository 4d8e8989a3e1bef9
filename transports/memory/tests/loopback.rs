use std::sync::Arc;

use bytes::Bytes;
use dwn_core::{DwnRequest, Status, Transport, base64url, stream_from_bytes};
use dwn_transport_memory::{MemoryNode, MemoryTransport};
use futures::TryStreamExt;
use serde_json::{Map, Value, json};

const ALICE: &str = "did:ex:alice";
const ENDPOINT: &str = "memory://local";

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn write_message(record_id: &str, created: &str, schema: &str, data: &[u8]) -> Map<String, Value> {
    object(json!({
        "recordId": record_id,
        "contextId": record_id,
        "descriptor": {
            "interface": "Records",
            "method": "Write",
            "schema": schema,
            "dataCid": format!("cid-{record_id}"),
            "dataFormat": "text/plain",
            "dataSize": data.len(),
            "dateCreated": created,
            "dateModified": created
        }
    }))
}

fn read_message(record_id: &str) -> Map<String, Value> {
    object(json!({
        "descriptor": {
            "interface": "Records",
            "method": "Read",
            "filter": { "recordId": record_id }
        }
    }))
}

async fn write(transport: &impl Transport, record_id: &str, created: &str, schema: &str, data: &'static [u8]) -> Status {
    let request = DwnRequest::new(ALICE, ALICE, write_message(record_id, created, schema, data))
        .with_data(stream_from_bytes(Bytes::from_static(data)));
    transport.send(ENDPOINT, request).await.unwrap().status
}

#[tokio::test]
async fn write_then_read_streams_the_payload() {
    let transport = MemoryTransport::new(MemoryNode::new());
    let status = write(&transport, "r1", "2024-05-01T10:00:00Z", "note", b"Hello, world!").await;
    assert_eq!(status, Status::new(202, "Accepted"));
    assert_eq!(transport.handler().len(), 1);

    let reply = transport
        .send(ENDPOINT, DwnRequest::new(ALICE, ALICE, read_message("r1")))
        .await
        .unwrap();
    assert_eq!(reply.status.code, 200);
    let record = reply.record.unwrap();
    assert_eq!(record.message["recordId"], "r1");
    assert!(record.message.get("encodedData").is_none());
    assert!(record.message.get("author").is_none());

    let chunks: Vec<Bytes> = record.data.unwrap().try_collect().await.unwrap();
    assert_eq!(chunks.concat(), b"Hello, world!");
}

#[tokio::test]
async fn small_payloads_come_back_inline() {
    let transport = MemoryTransport::new(MemoryNode::with_inline_data_limit(64));
    write(&transport, "r1", "2024-05-01T10:00:00Z", "note", b"tiny").await;

    let reply = transport
        .send(ENDPOINT, DwnRequest::new(ALICE, ALICE, read_message("r1")))
        .await
        .unwrap();
    let record = reply.record.unwrap();
    assert!(record.data.is_none());
    let encoded = record.message["encodedData"].as_str().unwrap();
    assert_eq!(base64url::decode(encoded, "test").unwrap(), b"tiny");
}

#[tokio::test]
async fn records_are_scoped_to_their_target() {
    let transport = MemoryTransport::new(MemoryNode::new());
    write(&transport, "r1", "2024-05-01T10:00:00Z", "note", b"hello").await;

    let reply = transport
        .send(ENDPOINT, DwnRequest::new("did:ex:bob", ALICE, read_message("r1")))
        .await
        .unwrap();
    assert_eq!(reply.status, Status::new(404, "Not Found"));
    assert!(reply.record.is_none());
}

#[tokio::test]
async fn query_filters_and_orders_entries() {
    let transport = MemoryTransport::new(MemoryNode::new());
    write(&transport, "r3", "2024-05-03T10:00:00Z", "note", b"three").await;
    write(&transport, "r1", "2024-05-01T10:00:00Z", "note", b"one").await;
    write(&transport, "r2", "2024-05-02T10:00:00Z", "photo", b"two").await;

    let query = object(json!({
        "descriptor": {
            "interface": "Records",
            "method": "Query",
            "filter": { "schema": "note" }
        }
    }));
    let reply = transport
        .send(ENDPOINT, DwnRequest::new(ALICE, ALICE, query))
        .await
        .unwrap();
    assert_eq!(reply.status.code, 200);
    let ids: Vec<&str> = reply
        .entries
        .as_deref()
        .unwrap()
        .iter()
        .filter_map(|entry| entry["recordId"].as_str())
        .collect();
    assert_eq!(ids, ["r1", "r3"]);
}

#[tokio::test]
async fn delete_removes_the_record() {
    let transport = MemoryTransport::new(Arc::new(MemoryNode::new()));
    write(&transport, "r1", "2024-05-01T10:00:00Z", "note", b"bye").await;

    let delete = object(json!({
        "descriptor": { "interface": "Records", "method": "Delete", "recordId": "r1" }
    }));
    let reply = transport
        .send(ENDPOINT, DwnRequest::new(ALICE, ALICE, delete.clone()))
        .await
        .unwrap();
    assert_eq!(reply.status.code, 202);
    assert!(transport.handler().is_empty());

    let reply = transport
        .send(ENDPOINT, DwnRequest::new(ALICE, ALICE, delete))
        .await
        .unwrap();
    assert_eq!(reply.status.code, 404);
}

#[tokio::test]
async fn unknown_methods_are_bad_requests() {
    let transport = MemoryTransport::new(MemoryNode::new());
    let message = object(json!({
        "descriptor": { "interface": "Protocols", "method": "Configure" }
    }));
    let reply = transport
        .send(ENDPOINT, DwnRequest::new(ALICE, ALICE, message))
        .await
        .unwrap();
    assert_eq!(reply.status.code, 400);
    assert!(reply.status.detail.starts_with("Bad Request"));
}
