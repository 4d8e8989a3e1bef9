use serde::{Deserialize, Serialize};

use crate::DWN_REQUEST_HEADER;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpTransportConfig {
    /// Request header carrying the JSON-RPC envelope
    pub request_header: String,
    /// Limit for establishing the connection. Reply bodies are streamed, so
    /// no overall deadline is applied.
    pub connect_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            request_header: DWN_REQUEST_HEADER.to_owned(),
            connect_timeout_secs: None,
            user_agent: None,
        }
    }
}
