//! HTTP transport for DWN messages.
//!
//! A message is POSTed to the node with its JSON-RPC envelope in the
//! `dwn-request` header and the record payload, if any, as the raw request
//! body. Replies come back either as a header plus a live body stream or as
//! a JSON body.

mod config;
mod demux;
mod transport;

pub use config::HttpTransportConfig;
pub use demux::{DWN_RESPONSE_HEADER, LEGACY_RESPONSE_HEADER};
pub use transport::HttpTransport;

pub const DWN_REQUEST_HEADER: &str = "dwn-request";
