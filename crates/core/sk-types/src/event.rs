//! Decoded output events pushed to the downstream sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded unit, stamped with its resolved type and source metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkEvent {
    /// Source bucket
    pub bucket: String,

    /// Source object key
    pub key: String,

    /// Logical type label resolved from the bucket's pattern rules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    /// The decoded payload: a JSON string for plain lines, a JSON value
    /// for the JSON formats
    pub data: Value,

    /// When this event was decoded
    pub ingested_at: DateTime<Utc>,
}

impl SinkEvent {
    /// Create an event for a decoded unit of the given source object.
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        event_type: Option<String>,
        data: Value,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            event_type,
            data,
            ingested_at: Utc::now(),
        }
    }
}
