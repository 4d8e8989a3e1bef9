//! Payload access for a record.
//!
//! A record's payload is either bytes the node returned inline, a stream
//! that can be drained exactly once, or nothing at all, in which case it is
//! fetched from the owning node on first use. Reads go through a
//! single-flight guard: whoever arrives while a read is in progress awaits
//! that same read instead of starting another one.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use bytes::{Bytes, BytesMut};
use dwn_core::{DataStream, DecodeError, Error, Result, TransportError};
use futures::StreamExt;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::reader::{RecordReader, RecordRef};

/// Payload as delivered by a node.
pub enum RecordData {
    /// Fully available; can be read any number of times.
    Encoded(Bytes),
    /// Readable once, front to back.
    Stream(DataStream),
}

impl RecordData {
    pub fn is_repeatable(&self) -> bool {
        matches!(self, RecordData::Encoded(_))
    }
}

impl fmt::Debug for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordData::Encoded(bytes) => f.debug_tuple("Encoded").field(&bytes.len()).finish(),
            RecordData::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Observable phase of a [`DataAccessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorState {
    Unread,
    Materializing,
    Cached,
    Exhausted,
}

enum Source {
    Data(RecordData),
    Pending {
        reader: Arc<dyn RecordReader>,
        record: RecordRef,
    },
}

type Materialized = std::result::Result<Bytes, Arc<Error>>;
type InFlight = Shared<BoxFuture<'static, Materialized>>;

enum State {
    Unread(Source),
    Materializing(InFlight),
    Cached(Bytes),
    Exhausted,
}

pub struct DataAccessor {
    state: Arc<Mutex<State>>,
    json: OnceLock<Arc<Value>>,
}

impl DataAccessor {
    pub fn new(data: RecordData) -> Self {
        Self::from_source(Source::Data(data))
    }

    /// Payload that has to be fetched from `reader` on first use.
    pub fn pending(reader: Arc<dyn RecordReader>, record: RecordRef) -> Self {
        Self::from_source(Source::Pending { reader, record })
    }

    fn from_source(source: Source) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::Unread(source))),
            json: OnceLock::new(),
        }
    }

    pub fn state(&self) -> AccessorState {
        match &*lock(&self.state) {
            State::Unread(_) => AccessorState::Unread,
            State::Materializing(_) => AccessorState::Materializing,
            State::Cached(_) => AccessorState::Cached,
            State::Exhausted => AccessorState::Exhausted,
        }
    }

    /// Reads the whole payload.
    ///
    /// Inline bytes can be read any number of times. A stream-backed
    /// payload is drained by the first read; every read after that fails
    /// with [`Error::StreamExhausted`].
    pub async fn data_bytes(&self) -> Result<Bytes> {
        let in_flight = {
            let mut state = lock(&self.state);
            match std::mem::replace(&mut *state, State::Exhausted) {
                State::Cached(bytes) => {
                    *state = State::Cached(bytes.clone());
                    return Ok(bytes);
                }
                State::Exhausted => return Err(Error::StreamExhausted),
                State::Materializing(in_flight) => {
                    tracing::debug!("record data: joining in-flight read");
                    *state = State::Materializing(in_flight.clone());
                    in_flight
                }
                State::Unread(Source::Data(RecordData::Encoded(bytes))) => {
                    *state = State::Cached(bytes.clone());
                    return Ok(bytes);
                }
                State::Unread(source) => {
                    let in_flight = materialize(Arc::downgrade(&self.state), source)
                        .boxed()
                        .shared();
                    *state = State::Materializing(in_flight.clone());
                    in_flight
                }
            }
        };
        in_flight.await.map_err(Error::from_shared)
    }

    /// Reads the payload and parses it as JSON.
    ///
    /// For repeatable payloads the parsed value is kept, so every call
    /// returns the same `Arc` without parsing again.
    pub async fn data_json(&self) -> Result<Arc<Value>> {
        let bytes = self.data_bytes().await?;
        if let Some(value) = self.json.get() {
            return Ok(value.clone());
        }
        let value: Value = serde_json::from_slice(&bytes).map_err(|source| DecodeError::Json {
            context: "record data",
            source,
        })?;
        Ok(self.json.get_or_init(|| Arc::new(value)).clone())
    }

    pub async fn data_json_as<T: DeserializeOwned>(&self) -> Result<T> {
        let bytes = self.data_bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| {
            DecodeError::Json {
                context: "record data",
                source,
            }
            .into()
        })
    }

    pub async fn data_text(&self) -> Result<String> {
        let bytes = self.data_bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|source| {
            DecodeError::Utf8 {
                context: "record data",
                source,
            }
            .into()
        })
    }
}

impl fmt::Debug for DataAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataAccessor")
            .field("state", &self.state())
            .finish()
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn settle(state: &Weak<Mutex<State>>, next: State) {
    if let Some(state) = state.upgrade() {
        *lock(&state) = next;
    }
}

async fn materialize(state: Weak<Mutex<State>>, source: Source) -> Materialized {
    let data = match source {
        Source::Data(data) => data,
        Source::Pending { reader, record } => match reader.read_data(&record).await {
            Ok(data) => data,
            Err(err) => {
                // Nothing was consumed, so a later read may try again.
                tracing::debug!(record_id = %record.record_id, "record data fetch failed: {err}");
                settle(&state, State::Unread(Source::Pending { reader, record }));
                return Err(Arc::new(err));
            }
        },
    };

    let (result, next) = match data {
        RecordData::Encoded(bytes) => (Ok(bytes.clone()), State::Cached(bytes)),
        RecordData::Stream(stream) => (drain(stream).await, State::Exhausted),
    };
    tracing::debug!(ok = result.is_ok(), "record data materialized");
    settle(&state, next);
    result.map_err(Arc::new)
}

async fn drain(mut stream: DataStream) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(TransportError::Body)?;
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
