//! Notification polling: envelope unwrapping, record extraction, and the
//! delete/retain decision for each queue message.

use crate::source::{NotificationQueue, QueueMessage};
use crate::stats::IngestStats;
use async_trait::async_trait;
use sk_error::Result;
use sk_types::{unwrap_envelope, ObjectRef, Record, StoreEventNotification};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Processes one record; the return value reports success toward the
/// message's delete decision.
#[async_trait]
pub trait RecordHandler: Send + Sync {
    async fn handle(&self, record: Record) -> bool;
}

/// Long-polls the notification queue and yields records to a handler.
///
/// Message fate: a message whose records all succeed (or that yields none)
/// is deleted, unless skip-delete mode leaves it for external management.
/// A message with any failed record is left untouched; the queue redelivers
/// it to some consumer once its visibility window lapses. Malformed bodies
/// are discarded outright so poison traffic cannot redeliver forever.
pub struct NotificationPoller<Q> {
    queue: Arc<Q>,
    wrapped_envelope: bool,
    skip_delete: bool,
    stats: Arc<IngestStats>,
}

impl<Q: NotificationQueue> NotificationPoller<Q> {
    /// Create a poller over the given queue.
    pub fn new(
        queue: Arc<Q>,
        wrapped_envelope: bool,
        skip_delete: bool,
        stats: Arc<IngestStats>,
    ) -> Self {
        Self {
            queue,
            wrapped_envelope,
            skip_delete,
            stats,
        }
    }

    /// Poll until the shutdown token fires.
    ///
    /// The token interrupts only the blocking receive: messages already
    /// received are always handled to completion before the loop re-checks
    /// it, so an in-flight record never gets dropped mid-processing.
    pub async fn run<H: RecordHandler>(&self, handler: &H, shutdown: CancellationToken) {
        info!("Notification poller started");
        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.queue.receive() => received,
            };

            match received {
                Ok(messages) => {
                    for message in messages {
                        self.handle_message(message, handler).await;
                    }
                }
                Err(e) => {
                    // Transient queue errors ride the next poll cycle; the
                    // long poll's own wait is the only backoff.
                    warn!(error = %e, "Receive failed; retrying with next poll");
                }
            }
        }
        info!("Notification poller stopped");
    }

    /// One receive-and-drain cycle.
    pub async fn poll_once<H: RecordHandler>(&self, handler: &H) -> Result<()> {
        let messages = self.queue.receive().await?;
        for message in messages {
            self.handle_message(message, handler).await;
        }
        Ok(())
    }

    async fn handle_message<H: RecordHandler>(&self, message: QueueMessage, handler: &H) {
        self.stats.record_message_received();

        let objects = match self.parse_objects(&message.body) {
            Ok(objects) => objects,
            Err(e) => {
                // Poison policy: discard instead of retrying indefinitely.
                warn!(
                    message_id = %message.message_id,
                    error = %e,
                    "Discarding malformed notification"
                );
                self.stats.record_message_poisoned();
                self.delete_message(&message).await;
                return;
            }
        };

        let mut all_completed = true;
        for object in objects {
            let record = Record::new(
                object.bucket,
                object.key,
                object.size,
                message.receipt_handle.clone(),
                message.message_id.clone(),
            );
            // Records stay independent: the remaining entries of this
            // message still run after an earlier one fails.
            if !handler.handle(record).await {
                all_completed = false;
            }
        }

        if !all_completed {
            debug!(
                message_id = %message.message_id,
                "Message retained; eligible for redelivery after the visibility timeout"
            );
            return;
        }

        if self.skip_delete {
            debug!(
                message_id = %message.message_id,
                "Skip-delete mode; leaving processed message on the queue"
            );
        } else {
            self.delete_message(&message).await;
        }
    }

    fn parse_objects(&self, body: &str) -> Result<Vec<ObjectRef>> {
        let notification = if self.wrapped_envelope {
            let inner = unwrap_envelope(body)?;
            StoreEventNotification::parse(&inner)?
        } else {
            StoreEventNotification::parse(body)?
        };
        Ok(notification.created_objects())
    }

    async fn delete_message(&self, message: &QueueMessage) {
        match self.queue.delete(&message.receipt_handle).await {
            Ok(()) => self.stats.record_message_deleted(),
            Err(e) => {
                // Non-fatal: the message redelivers later, which the
                // at-least-once contract accepts.
                warn!(
                    message_id = %message.message_id,
                    error = %e,
                    "Failed to delete message; it will redeliver"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CollectingHandler, MockQueue};
    use std::time::Duration;

    fn notification(key: &str, size: u64) -> String {
        format!(
            r#"{{"Records":[{{"eventName":"ObjectCreated:Put","s3":{{"bucket":{{"name":"logs"}},"object":{{"key":"{key}","size":{size}}}}}}}]}}"#
        )
    }

    fn poller(queue: Arc<MockQueue>, wrapped: bool, skip_delete: bool) -> NotificationPoller<MockQueue> {
        NotificationPoller::new(queue, wrapped, skip_delete, Arc::new(IngestStats::new()))
    }

    #[tokio::test]
    async fn test_successful_message_is_deleted() {
        let queue = Arc::new(MockQueue::new().with_message(
            "msg-1",
            "rh-1",
            &notification("elb/file.log", 128),
        ));
        let handler = CollectingHandler::new();

        poller(queue.clone(), false, false)
            .poll_once(&handler)
            .await
            .unwrap();

        let records = handler.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].bucket, "logs");
        assert_eq!(records[0].key, "elb/file.log");
        assert_eq!(records[0].size, Some(128));
        assert_eq!(queue.deleted(), vec!["rh-1".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_record_retains_message() {
        let queue = Arc::new(MockQueue::new().with_message(
            "msg-1",
            "rh-1",
            &notification("elb/file.log", 128),
        ));
        let handler = CollectingHandler::new().failing_on("elb/file.log");

        poller(queue.clone(), false, false)
            .poll_once(&handler)
            .await
            .unwrap();

        assert_eq!(handler.records().len(), 1);
        assert!(queue.deleted().is_empty());
        assert!(queue.visibility_changes().is_empty());
    }

    #[tokio::test]
    async fn test_remaining_records_run_after_a_failure() {
        let body = r#"{"Records":[
            {"eventName":"ObjectCreated:Put","s3":{"bucket":{"name":"logs"},"object":{"key":"a.log","size":1}}},
            {"eventName":"ObjectCreated:Put","s3":{"bucket":{"name":"logs"},"object":{"key":"b.log","size":2}}}
        ]}"#;
        let queue = Arc::new(MockQueue::new().with_message("msg-1", "rh-1", body));
        let handler = CollectingHandler::new().failing_on("a.log");

        poller(queue.clone(), false, false)
            .poll_once(&handler)
            .await
            .unwrap();

        let keys: Vec<_> = handler.records().iter().map(|r| r.key.clone()).collect();
        assert_eq!(keys, vec!["a.log", "b.log"]);
        assert!(queue.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_discarded_without_handler_invocation() {
        let queue = Arc::new(MockQueue::new().with_message("msg-1", "rh-1", "{not json"));
        let handler = CollectingHandler::new();

        poller(queue.clone(), false, false)
            .poll_once(&handler)
            .await
            .unwrap();

        assert!(handler.records().is_empty());
        assert_eq!(queue.deleted(), vec!["rh-1".to_string()]);
    }

    #[tokio::test]
    async fn test_zero_record_message_is_consumed() {
        let queue = Arc::new(MockQueue::new().with_message(
            "msg-1",
            "rh-1",
            r#"{"Service":"Amazon S3","Event":"s3:TestEvent"}"#,
        ));
        let handler = CollectingHandler::new();

        poller(queue.clone(), false, false)
            .poll_once(&handler)
            .await
            .unwrap();

        assert!(handler.records().is_empty());
        assert_eq!(queue.deleted(), vec!["rh-1".to_string()]);
    }

    #[tokio::test]
    async fn test_wrapped_envelope_yields_same_records() {
        let inner = notification("elb/file.log", 64);
        let envelope = serde_json::json!({
            "Type": "Notification",
            "Message": inner,
        })
        .to_string();
        let queue = Arc::new(MockQueue::new().with_message("msg-1", "rh-1", &envelope));
        let handler = CollectingHandler::new();

        poller(queue.clone(), true, false)
            .poll_once(&handler)
            .await
            .unwrap();

        let records = handler.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "elb/file.log");
        assert_eq!(queue.deleted(), vec!["rh-1".to_string()]);
    }

    #[tokio::test]
    async fn test_skip_delete_leaves_processed_message() {
        let queue = Arc::new(MockQueue::new().with_message(
            "msg-1",
            "rh-1",
            &notification("elb/file.log", 128),
        ));
        let handler = CollectingHandler::new();

        poller(queue.clone(), false, true)
            .poll_once(&handler)
            .await
            .unwrap();

        assert_eq!(handler.records().len(), 1);
        assert!(queue.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let queue = Arc::new(MockQueue::new().with_empty_delay(Duration::from_millis(5)));
        let handler = Arc::new(CollectingHandler::new());
        let token = CancellationToken::new();

        let poller = poller(queue, false, false);
        let run_token = token.clone();
        let task = tokio::spawn(async move {
            poller.run(handler.as_ref(), run_token).await;
        });

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("poller did not stop on cancellation")
            .unwrap();
    }
}
