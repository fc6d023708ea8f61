//! Store-event notification payloads and envelope unwrapping.
//!
//! A queue message body is either a store-event document directly, or (in
//! wrapped mode) a pub/sub envelope whose `Message` field contains the
//! serialized store-event document. The store-event document lists zero or
//! more per-object entries; keys arrive URL-encoded with `+` for spaces.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use sk_error::{QueueError, Result};

/// A store-event notification document.
///
/// Test events and other non-notification traffic parse with an empty
/// `records` list and yield zero object references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEventNotification {
    /// Per-object entries; absent for test events
    #[serde(rename = "Records")]
    pub records: Option<Vec<EventEntry>>,

    /// Event marker set on test events (e.g. `s3:TestEvent`)
    #[serde(rename = "Event")]
    pub event: Option<String>,
}

/// One per-object entry in a store-event notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEntry {
    /// Event name, e.g. `ObjectCreated:Put`
    #[serde(rename = "eventName")]
    pub event_name: Option<String>,

    /// The bucket/object description
    pub s3: S3Entity,
}

/// The `s3` element of an event entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

/// Bucket description within an event entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketEntity {
    pub name: String,
}

/// Object description within an event entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectEntity {
    /// URL-encoded object key
    pub key: String,

    /// Object size in bytes; omitted by some notification configurations
    pub size: Option<u64>,
}

/// A pub/sub envelope wrapping a store-event document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubEnvelope {
    #[serde(rename = "Type")]
    pub kind: Option<String>,

    /// The serialized store-event document
    #[serde(rename = "Message")]
    pub message: String,
}

/// A (bucket, key, size) reference extracted from one event entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
    pub size: Option<u64>,
}

impl StoreEventNotification {
    /// Parse a store-event document from a raw message body.
    pub fn parse(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|e| QueueError::MalformedBody(e.to_string()).into())
    }

    /// Extract the created-object references, in the order the notification
    /// listed them.
    ///
    /// Entries carrying a non-creation event name (object removal, restore)
    /// are skipped; entries without an event name are taken as created
    /// objects. Keys are URL-decoded.
    pub fn created_objects(&self) -> Vec<ObjectRef> {
        self.records
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|entry| {
                entry
                    .event_name
                    .as_deref()
                    .map(|name| name.starts_with("ObjectCreated"))
                    .unwrap_or(true)
            })
            .map(|entry| ObjectRef {
                bucket: entry.s3.bucket.name.clone(),
                key: decode_object_key(&entry.s3.object.key),
                size: entry.s3.object.size,
            })
            .collect()
    }
}

/// Unwrap a pub/sub envelope, returning the inner store-event payload.
pub fn unwrap_envelope(body: &str) -> Result<String> {
    let envelope: PubSubEnvelope = serde_json::from_str(body)
        .map_err(|e| QueueError::MalformedBody(format!("envelope: {e}")))?;
    Ok(envelope.message)
}

/// URL-decode an object key as encoded by store-event notifications
/// (`+` encodes a space, then percent escapes).
pub fn decode_object_key(key: &str) -> String {
    let plus_decoded = key.replace('+', " ");
    percent_decode_str(&plus_decoded)
        .decode_utf8_lossy()
        .into_owned()
}
