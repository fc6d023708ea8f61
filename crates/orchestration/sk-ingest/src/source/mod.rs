//! Notification-queue sources.
//!
//! This module provides the [`NotificationQueue`] trait and the production
//! [`SqsQueue`] implementation. The queue service arbitrates which consumer
//! receives which message; a received message stays hidden from other
//! consumers for its visibility window.

mod sqs;

pub use sqs::{SqsQueue, SqsQueueConfig};

use async_trait::async_trait;
use sk_error::Result;

/// An opaque message received from the notification queue.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Queue-assigned message id, carried for log context
    pub message_id: String,

    /// Receipt handle used for delete/visibility operations
    pub receipt_handle: String,

    /// Raw message body
    pub body: String,
}

/// The notification queue as consumed by the poller.
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Long-poll receive. Returns an empty batch when the wait time elapses
    /// without traffic.
    async fn receive(&self) -> Result<Vec<QueueMessage>>;

    /// Delete a message so it is never redelivered.
    async fn delete(&self, receipt_handle: &str) -> Result<()>;

    /// Change the remaining visibility window of a message.
    async fn change_visibility(&self, receipt_handle: &str, seconds: i32) -> Result<()>;
}
