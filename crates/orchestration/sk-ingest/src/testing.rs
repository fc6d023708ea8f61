//! In-memory test doubles for the queue, store, and record handler seams.

use crate::poller::RecordHandler;
use crate::source::{NotificationQueue, QueueMessage};
use crate::store::{BlobStore, FetchedObject};
use async_trait::async_trait;
use sk_error::{Result, StoreError};
use sk_types::Record;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Queue double: hands out prepared messages once, records deletes and
/// visibility changes.
#[derive(Default)]
pub(crate) struct MockQueue {
    messages: Mutex<VecDeque<QueueMessage>>,
    deleted: Mutex<Vec<String>>,
    visibility_changes: Mutex<Vec<(String, i32)>>,
    empty_delay: Option<Duration>,
}

impl MockQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(self, message_id: &str, receipt_handle: &str, body: &str) -> Self {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(QueueMessage {
                message_id: message_id.to_string(),
                receipt_handle: receipt_handle.to_string(),
                body: body.to_string(),
            });
        self
    }

    /// Sleep this long on an empty receive, standing in for the long poll.
    pub fn with_empty_delay(mut self, delay: Duration) -> Self {
        self.empty_delay = Some(delay);
        self
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn visibility_changes(&self) -> Vec<(String, i32)> {
        self.visibility_changes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl NotificationQueue for MockQueue {
    async fn receive(&self) -> Result<Vec<QueueMessage>> {
        let drained: Vec<QueueMessage> = {
            let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
            messages.drain(..).collect()
        };

        if drained.is_empty() {
            if let Some(delay) = self.empty_delay {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(drained)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.deleted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(receipt_handle.to_string());
        Ok(())
    }

    async fn change_visibility(&self, receipt_handle: &str, seconds: i32) -> Result<()> {
        self.visibility_changes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((receipt_handle.to_string(), seconds));
        Ok(())
    }
}

struct StoredObject {
    bytes: Vec<u8>,
    content_encoding: Option<String>,
}

/// Blob-store double serving in-memory objects.
#[derive(Default)]
pub(crate) struct MockBlobStore {
    objects: HashMap<(String, String), StoredObject>,
    deleted: Mutex<Vec<String>>,
    fetch_delay: Option<Duration>,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, bucket: &str, key: &str, bytes: &[u8]) -> Self {
        self.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bytes: bytes.to_vec(),
                content_encoding: None,
            },
        );
        self
    }

    /// Store the given bytes gzip-compressed, marked with the gzip encoding.
    pub fn with_gzip_object(mut self, bucket: &str, key: &str, plain: &[u8]) -> Self {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(plain).unwrap();
        let compressed = encoder.finish().unwrap();

        self.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bytes: compressed,
                content_encoding: Some("gzip".to_string()),
            },
        );
        self
    }

    /// Store bytes verbatim with an explicit content encoding.
    pub fn with_raw_object(
        mut self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_encoding: Option<&str>,
    ) -> Self {
        self.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bytes: bytes.to_vec(),
                content_encoding: content_encoding.map(str::to_string),
            },
        );
        self
    }

    /// Stall every fetch, standing in for a blocked network download.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<FetchedObject> {
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        let stored = self
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| StoreError::NotFound(format!("{bucket}/{key}")))?;

        Ok(FetchedObject {
            content_length: Some(stored.bytes.len() as u64),
            content_encoding: stored.content_encoding.clone(),
            body: Box::pin(std::io::Cursor::new(stored.bytes.clone())),
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.deleted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(format!("{bucket}/{key}"));
        Ok(())
    }
}

/// Handler double: records every handed record, failing configured keys.
#[derive(Default)]
pub(crate) struct CollectingHandler {
    records: Mutex<Vec<Record>>,
    fail_keys: HashSet<String>,
}

impl CollectingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, key: &str) -> Self {
        self.fail_keys.insert(key.to_string());
        self
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl RecordHandler for CollectingHandler {
    async fn handle(&self, record: Record) -> bool {
        let succeed = !self.fail_keys.contains(&record.key);
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
        succeed
    }
}
