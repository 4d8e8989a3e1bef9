//! Core types and traits shared by all DWN client crates.
//!
//! ## Wire types
//!
//! - JSON-RPC envelopes and the error code taxonomy (`rpc`)
//! - The JSON part of a node reply (`message::WireReply`)
//!
//! ## Client abstractions
//!
//! - Logical requests and replies (`DwnRequest`, `DwnReply`), where a
//!   payload travels as a one-shot `DataStream`
//! - The `Transport` trait that HTTP and in-process transports implement
//! - The error taxonomy (`Error`): transport, decode, protocol and
//!   exhausted-stream failures

pub mod base64url;
pub mod error;
pub mod message;
pub mod rpc;
pub mod transport;

pub use error::{DecodeError, Error, Result, TransportError};
pub use message::{
    DataStream, DwnReply, DwnRequest, ReplyRecord, Status, WireReply, stream_from_bytes,
};
pub use rpc::{JsonRpcError, JsonRpcErrorCode, JsonRpcId, JsonRpcRequest, JsonRpcResponse};
pub use transport::Transport;
