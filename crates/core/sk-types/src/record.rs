//! The unit of work derived from one queue notification entry.

use std::path::{Path, PathBuf};

/// One unit of work: a (bucket, key, size) tuple derived from a notification,
/// plus the queue bookkeeping needed to delete or retain the message.
///
/// A record is owned exclusively by the worker loop processing it. The
/// fetcher sets `local_path` on a successful download; cleanup clears it.
#[derive(Debug, Clone)]
pub struct Record {
    /// Source bucket name
    pub bucket: String,

    /// Object key, URL-decoded from the notification
    pub key: String,

    /// Object size in bytes as declared by the notification, when present
    pub size: Option<u64>,

    /// Path of the downloaded scratch file, set once fetched
    pub local_path: Option<PathBuf>,

    /// Receipt handle of the queue message this record came from
    pub receipt_handle: String,

    /// Queue message id, carried for log context
    pub message_id: String,
}

impl Record {
    /// Create a record for one notification entry.
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        size: Option<u64>,
        receipt_handle: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            size,
            local_path: None,
            receipt_handle: receipt_handle.into(),
            message_id: message_id.into(),
        }
    }

    /// Mark the record as fetched to the given scratch path.
    pub fn set_local_path(&mut self, path: impl Into<PathBuf>) {
        self.local_path = Some(path.into());
    }

    /// Clear the scratch path after local cleanup, returning it.
    pub fn take_local_path(&mut self) -> Option<PathBuf> {
        self.local_path.take()
    }

    /// The scratch path, if the record has been fetched.
    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }
}
