//! In-process transport for DWN clients.
//!
//! [`MemoryTransport`] hands messages to a [`MessageHandler`] in the same
//! process instead of a remote node. [`MemoryNode`] is a small handler that
//! keeps records in memory, enough to exercise a client end to end.

mod node;
mod transport;

pub use node::MemoryNode;
pub use transport::{MemoryTransport, MessageHandler};
