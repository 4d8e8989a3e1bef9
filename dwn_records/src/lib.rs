//! Records returned by a DWN and access to their payloads.
//!
//! A [`Record`] is built once from a node reply. Its payload is reached
//! through a [`DataAccessor`], which reads inline bytes any number of times,
//! drains a streamed payload exactly once, and fetches a missing payload
//! from the owning node through a [`RecordReader`].

mod data;
mod descriptor;
mod reader;
mod record;

pub use data::{AccessorState, DataAccessor, RecordData};
pub use descriptor::RecordsWriteDescriptor;
pub use reader::{ReadMessageBuilder, RecordReader, RecordRef, TransportRecordReader};
pub use record::{Record, RecordOptions};
