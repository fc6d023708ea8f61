//! SQS notification-queue implementation.

use super::{NotificationQueue, QueueMessage};
use async_trait::async_trait;
use aws_sdk_sqs::Client;
use serde::{Deserialize, Serialize};
use sk_error::{QueueError, Result};
use tracing::debug;

/// Configuration for the SQS source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqsQueueConfig {
    /// Queue URL
    pub queue_url: String,

    /// Long-polling wait time in seconds (1-20)
    pub wait_time_seconds: i32,

    /// Visibility timeout requested on receive, in seconds
    pub visibility_timeout: i32,

    /// Maximum number of messages per receive (1-10)
    pub max_batch_size: i32,
}

impl SqsQueueConfig {
    /// Create a new SQS queue configuration.
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            wait_time_seconds: 20,
            visibility_timeout: 300,
            max_batch_size: 10,
        }
    }

    /// Set the long-polling wait time, clamped to 1-20 seconds.
    pub fn with_wait_time(mut self, seconds: i32) -> Self {
        self.wait_time_seconds = seconds.clamp(1, 20);
        self
    }

    /// Set the visibility timeout.
    pub fn with_visibility_timeout(mut self, seconds: i32) -> Self {
        self.visibility_timeout = seconds;
        self
    }

    /// Set the receive batch size, clamped to 1-10.
    pub fn with_max_batch_size(mut self, size: i32) -> Self {
        self.max_batch_size = size.clamp(1, 10);
        self
    }
}

/// Notification queue backed by AWS SQS.
pub struct SqsQueue {
    client: Client,
    config: SqsQueueConfig,
}

impl SqsQueue {
    /// Create a queue over an existing client.
    pub fn new(client: Client, config: SqsQueueConfig) -> Self {
        Self { client, config }
    }

    /// Resolve a queue by name (optionally scoped to the owning account)
    /// and build a queue source for it.
    pub async fn from_queue_name(
        client: Client,
        queue_name: &str,
        owner_account_id: Option<&str>,
        config: SqsQueueConfig,
    ) -> Result<Self> {
        let mut request = client.get_queue_url().queue_name(queue_name);
        if let Some(owner) = owner_account_id {
            request = request.queue_owner_aws_account_id(owner);
        }

        let response = request
            .send()
            .await
            .map_err(|e| QueueError::ResolveUrl(format!("'{queue_name}': {e}")))?;

        let queue_url = response
            .queue_url
            .ok_or_else(|| QueueError::ResolveUrl(format!("'{queue_name}': no URL returned")))?;

        debug!(queue = queue_name, url = %queue_url, "Resolved queue URL");

        Ok(Self::new(
            client,
            SqsQueueConfig {
                queue_url,
                ..config
            },
        ))
    }

    /// The resolved queue URL.
    pub fn queue_url(&self) -> &str {
        &self.config.queue_url
    }
}

#[async_trait]
impl NotificationQueue for SqsQueue {
    async fn receive(&self) -> Result<Vec<QueueMessage>> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.config.queue_url)
            .max_number_of_messages(self.config.max_batch_size)
            .wait_time_seconds(self.config.wait_time_seconds)
            .visibility_timeout(self.config.visibility_timeout)
            .send()
            .await
            .map_err(|e| QueueError::Receive(e.to_string()))?;

        let messages: Vec<QueueMessage> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg| {
                // A message without a receipt handle cannot be deleted or
                // retained deliberately; skip it and let it redeliver.
                let receipt_handle = msg.receipt_handle?;
                Some(QueueMessage {
                    message_id: msg.message_id.unwrap_or_default(),
                    receipt_handle,
                    body: msg.body.unwrap_or_default(),
                })
            })
            .collect();

        debug!(count = messages.len(), "Received messages from queue");
        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.config.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete(e.to_string()))?;
        Ok(())
    }

    async fn change_visibility(&self, receipt_handle: &str, seconds: i32) -> Result<()> {
        self.client
            .change_message_visibility()
            .queue_url(&self.config.queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(seconds)
            .send()
            .await
            .map_err(|e| QueueError::Visibility(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqs_queue_config_defaults() {
        let config = SqsQueueConfig::new("https://sqs.us-east-1.amazonaws.com/123/objects");

        assert_eq!(config.wait_time_seconds, 20);
        assert_eq!(config.visibility_timeout, 300);
        assert_eq!(config.max_batch_size, 10);
    }

    #[test]
    fn test_sqs_queue_config_clamps() {
        let config = SqsQueueConfig::new("url")
            .with_wait_time(100)
            .with_max_batch_size(50);

        assert_eq!(config.wait_time_seconds, 20);
        assert_eq!(config.max_batch_size, 10);

        let config = SqsQueueConfig::new("url")
            .with_wait_time(0)
            .with_max_batch_size(0);

        assert_eq!(config.wait_time_seconds, 1);
        assert_eq!(config.max_batch_size, 1);
    }

    #[test]
    fn test_sqs_queue_config_builder() {
        let config = SqsQueueConfig::new("url")
            .with_wait_time(10)
            .with_visibility_timeout(600)
            .with_max_batch_size(5);

        assert_eq!(config.wait_time_seconds, 10);
        assert_eq!(config.visibility_timeout, 600);
        assert_eq!(config.max_batch_size, 5);
    }
}
