use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{DecodeError, Result};
use crate::message::{DwnReply, DwnRequest};

/// A channel that carries DWN messages to a node and brings replies back.
///
/// Callers hold a transport without knowing how it reaches the node: an
/// in-process loopback and the HTTP tunnel both satisfy this contract.
/// Only [`Transport::send`] performs I/O; encoding and decoding are pure and
/// fail only on malformed input.
#[async_trait]
pub trait Transport: Send + Sync {
    fn encode_message(&self, message: &Value) -> Result<String> {
        serde_json::to_string(message).map_err(|source| {
            DecodeError::Json {
                context: "message",
                source,
            }
            .into()
        })
    }

    fn decode_message(&self, text: &str) -> Result<Value> {
        serde_json::from_str(text).map_err(|source| {
            DecodeError::Json {
                context: "message",
                source,
            }
            .into()
        })
    }

    async fn send(&self, endpoint: &str, request: DwnRequest) -> Result<DwnReply>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn encode_message(&self, message: &Value) -> Result<String> {
        (**self).encode_message(message)
    }

    fn decode_message(&self, text: &str) -> Result<Value> {
        (**self).decode_message(text)
    }

    async fn send(&self, endpoint: &str, request: DwnRequest) -> Result<DwnReply> {
        (**self).send(endpoint, request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    fn encode_message(&self, message: &Value) -> Result<String> {
        (**self).encode_message(message)
    }

    fn decode_message(&self, text: &str) -> Result<Value> {
        (**self).decode_message(text)
    }

    async fn send(&self, endpoint: &str, request: DwnRequest) -> Result<DwnReply> {
        (**self).send(endpoint, request).await
    }
}
