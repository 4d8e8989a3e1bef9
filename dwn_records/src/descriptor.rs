use serde::{Deserialize, Serialize};

/// Descriptor of a `RecordsWrite` message, mirrored field for field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WireDescriptor")]
pub struct RecordsWriteDescriptor {
    pub interface: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub data_cid: String,
    pub data_format: String,
    pub data_size: u64,
    pub date_created: String,
    pub date_modified: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

/// Accepts both timestamp spellings. Newer nodes send `messageTimestamp`
/// and some send it next to `dateModified`, which then wins.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDescriptor {
    interface: String,
    method: String,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    protocol_path: Option<String>,
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    recipient: Option<String>,
    #[serde(default)]
    parent_id: Option<String>,
    data_cid: String,
    data_format: String,
    data_size: u64,
    date_created: String,
    #[serde(default)]
    date_modified: Option<String>,
    #[serde(default)]
    message_timestamp: Option<String>,
    #[serde(default)]
    date_published: Option<String>,
    #[serde(default)]
    published: Option<bool>,
}

impl TryFrom<WireDescriptor> for RecordsWriteDescriptor {
    type Error = &'static str;

    fn try_from(wire: WireDescriptor) -> Result<Self, Self::Error> {
        let date_modified = wire
            .date_modified
            .or(wire.message_timestamp)
            .ok_or("missing field `dateModified` or `messageTimestamp`")?;
        Ok(Self {
            interface: wire.interface,
            method: wire.method,
            protocol: wire.protocol,
            protocol_path: wire.protocol_path,
            schema: wire.schema,
            recipient: wire.recipient,
            parent_id: wire.parent_id,
            data_cid: wire.data_cid,
            data_format: wire.data_format,
            data_size: wire.data_size,
            date_created: wire.date_created,
            date_modified,
            date_published: wire.date_published,
            published: wire.published,
        })
    }
}
