use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dwn_core::{
    DataStream, DecodeError, DwnReply, DwnRequest, Result, Transport, WireReply,
    rpc::{self, PROCESS_MESSAGE_METHOD},
};
use serde_json::{Map, Value};

/// Something that processes DWN messages in the same process.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn process_message(
        &self,
        target: &str,
        message: Map<String, Value>,
        data: Option<DataStream>,
    ) -> Result<DwnReply>;
}

#[async_trait]
impl<H: MessageHandler + ?Sized> MessageHandler for Arc<H> {
    async fn process_message(
        &self,
        target: &str,
        message: Map<String, Value>,
        data: Option<DataStream>,
    ) -> Result<DwnReply> {
        (**self).process_message(target, message, data).await
    }
}

/// Loopback [`Transport`] handing messages to a [`MessageHandler`].
///
/// Both the request envelope and the JSON part of the reply are encoded to
/// text and decoded again, so messages that would not survive the wire do
/// not survive here either. Payload streams are passed through untouched.
pub struct MemoryTransport<H> {
    handler: H,
    next_id: AtomicI64,
}

impl<H: MessageHandler> MemoryTransport<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            next_id: AtomicI64::new(1),
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

#[async_trait]
impl<H: MessageHandler> Transport for MemoryTransport<H> {
    async fn send(&self, endpoint: &str, request: DwnRequest) -> Result<DwnReply> {
        let DwnRequest {
            target,
            author,
            mut message,
            data,
        } = request;
        message.insert("author".to_owned(), Value::String(author));
        message.insert("target".to_owned(), Value::String(target.clone()));

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = rpc::build_request(id, PROCESS_MESSAGE_METHOD, Some(Value::Object(message)));
        let decoded = rpc::decode_request(&rpc::encode(&envelope)?)?;
        let Some(Value::Object(mut params)) = decoded.params else {
            return Err(DecodeError::Shape {
                context: "JSON-RPC request",
                reason: "params is not an object".to_owned(),
            }
            .into());
        };
        params.remove("author");
        params.remove("target");

        tracing::debug!(%endpoint, id, "dispatching DWN message in process");
        let reply = self.handler.process_message(&target, params, data).await?;

        let (wire, data) = WireReply::from_reply(reply);
        let text = rpc::encode(&wire)?;
        let wire: WireReply = serde_json::from_str(&text).map_err(|source| DecodeError::Json {
            context: "reply",
            source,
        })?;
        Ok(wire.into_reply(data)?)
    }
}
