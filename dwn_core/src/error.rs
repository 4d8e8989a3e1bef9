use std::sync::Arc;

use crate::message::Status;
use crate::rpc::JsonRpcError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A well-formed envelope whose `error` member was set.
    #[error(transparent)]
    Protocol(#[from] JsonRpcError),

    /// The node processed the message and answered with a failure status.
    #[error("node rejected the message: {0}")]
    Rejected(Status),

    /// The record's data was a stream that has already been read once.
    #[error("record data stream has already been consumed")]
    StreamExhausted,

    /// Failure of an in-flight data read that this call attached to.
    #[error("shared record data read failed: {0}")]
    Shared(Arc<Error>),
}

impl Error {
    /// Connection-level failures may succeed when tried again; everything
    /// else is deterministic for the same input.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(TransportError::Connection { .. }) => true,
            Error::Shared(inner) => inner.is_retryable(),
            _ => false,
        }
    }

    /// Turns the failure of a shared read into this caller's own error.
    ///
    /// Every caller gets the original variant whenever it can be copied, so
    /// protocol errors and rejections can be matched on by all of them.
    /// Failures wrapping an I/O or parser error that cannot be copied stay
    /// behind [`Error::Shared`] unless this caller holds the last reference.
    pub fn from_shared(error: Arc<Error>) -> Self {
        match Arc::try_unwrap(error) {
            Ok(error) => error,
            Err(shared) => shared.try_clone().unwrap_or(Error::Shared(shared)),
        }
    }

    /// The JSON-RPC error behind this failure, if any, also when it is
    /// wrapped in [`Error::Shared`].
    pub fn as_protocol(&self) -> Option<&JsonRpcError> {
        match self {
            Error::Protocol(error) => Some(error),
            Error::Shared(inner) => inner.as_protocol(),
            _ => None,
        }
    }

    fn try_clone(&self) -> Option<Error> {
        Some(match self {
            Error::Transport(error) => Error::Transport(error.try_clone()?),
            Error::Decode(error) => Error::Decode(error.try_clone()?),
            Error::Protocol(error) => Error::Protocol(error.clone()),
            Error::Rejected(status) => Error::Rejected(status.clone()),
            Error::StreamExhausted => Error::StreamExhausted,
            Error::Shared(inner) => return inner.try_clone(),
        })
    }
}

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    #[error("got HTTP {status} from {endpoint} with content '{body}'")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("failed to reach {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to read payload stream: {0}")]
    Body(#[from] std::io::Error),

    #[error("could not build request: {0}")]
    Request(String),
}

impl TransportError {
    fn try_clone(&self) -> Option<TransportError> {
        match self {
            TransportError::Status {
                endpoint,
                status,
                body,
            } => Some(TransportError::Status {
                endpoint: endpoint.clone(),
                status: *status,
                body: body.clone(),
            }),
            TransportError::Request(reason) => Some(TransportError::Request(reason.clone())),
            TransportError::Connection { .. } | TransportError::Body(_) => None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("malformed JSON in {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed base64url in {context}: {source}")]
    Base64 {
        context: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("{context} is not valid UTF-8: {source}")]
    Utf8 {
        context: &'static str,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("header {context} is not visible ASCII")]
    Header { context: &'static str },

    #[error("unexpected shape of {context}: {reason}")]
    Shape {
        context: &'static str,
        reason: String,
    },
}

impl DecodeError {
    fn try_clone(&self) -> Option<DecodeError> {
        match self {
            DecodeError::Base64 { context, source } => Some(DecodeError::Base64 {
                context: *context,
                source: source.clone(),
            }),
            DecodeError::Utf8 { context, source } => Some(DecodeError::Utf8 {
                context: *context,
                source: source.clone(),
            }),
            DecodeError::Header { context } => Some(DecodeError::Header { context: *context }),
            DecodeError::Shape { context, reason } => Some(DecodeError::Shape {
                context: *context,
                reason: reason.clone(),
            }),
            DecodeError::Json { .. } => None,
        }
    }
}
