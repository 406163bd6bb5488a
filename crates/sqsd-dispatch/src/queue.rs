//! Thin facade over the SQS API: receive, batch delete, batch
//! visibility change.
//!
//! Worker loops talk to the [`QueueClient`] trait so they can run against
//! an in-memory queue in tests; [`SqsQueue`] is the production
//! implementation over the AWS SDK.

use async_trait::async_trait;
use sqsd_core::Message;
use tracing::{debug, warn};

use crate::error::{DispatchError, Result};

/// Maximum visibility timeout SQS accepts: 12 hours.
const MAX_VISIBILITY_TIMEOUT_SECS: u32 = 43_200;

/// Entry in a batch delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteEntry {
    /// Queue-assigned message id, used as the batch entry id.
    pub id: String,
    /// Receipt handle from the receive cycle being acknowledged.
    pub receipt: String,
}

/// Entry in a batch visibility-change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityEntry {
    /// Queue-assigned message id, used as the batch entry id.
    pub id: String,
    /// Receipt handle from the receive cycle being deferred.
    pub receipt: String,
    /// New visibility timeout in seconds.
    pub visibility_timeout_secs: u32,
}

/// Narrow queue contract consumed by worker loops.
///
/// Batch operations treat per-entry failures reported by the service as
/// log-only; a returned error means the call itself failed. Either way the
/// affected messages fall back to queue redelivery.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Long-polls for up to `max` messages, waiting at most `wait_secs`.
    /// May return an empty batch.
    async fn receive(&self, max: i32, wait_secs: i32) -> Result<Vec<Message>>;

    /// Deletes a batch of messages.
    async fn delete_batch(&self, entries: Vec<DeleteEntry>) -> Result<()>;

    /// Changes the visibility timeout for a batch of messages.
    async fn change_visibility_batch(&self, entries: Vec<VisibilityEntry>) -> Result<()>;
}

/// [`QueueClient`] backed by the AWS SQS SDK.
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsQueue {
    /// Creates a queue facade over an SDK client and queue URL.
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self { client, queue_url: queue_url.into() }
    }
}

#[async_trait]
impl QueueClient for SqsQueue {
    async fn receive(&self, max: i32, wait_secs: i32) -> Result<Vec<Message>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max)
            .wait_time_seconds(wait_secs)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|e| DispatchError::queue(format!("receive failed: {e}")))?;

        let raw = output.messages.unwrap_or_default();
        let total = raw.len();
        let messages: Vec<Message> = raw.into_iter().filter_map(Message::from_sqs).collect();

        if messages.len() < total {
            warn!(
                skipped = total - messages.len(),
                "dropped messages missing an id or receipt handle"
            );
        }

        Ok(messages)
    }

    async fn delete_batch(&self, entries: Vec<DeleteEntry>) -> Result<()> {
        let mut request = self.client.delete_message_batch().queue_url(&self.queue_url);

        for entry in entries {
            let batch_entry = aws_sdk_sqs::types::DeleteMessageBatchRequestEntry::builder()
                .id(entry.id)
                .receipt_handle(entry.receipt)
                .build()
                .map_err(|e| DispatchError::queue(format!("invalid delete entry: {e}")))?;
            request = request.entries(batch_entry);
        }

        let output = request
            .send()
            .await
            .map_err(|e| DispatchError::queue(format!("delete batch failed: {e}")))?;

        // Partial failures are not fatal; the entries fall back to queue
        // redelivery once their visibility timeout expires.
        for failed in output.failed() {
            warn!(
                entry_id = %failed.id,
                code = %failed.code,
                detail = failed.message.as_deref().unwrap_or(""),
                "delete rejected for batch entry"
            );
        }

        debug!(deleted = output.successful().len(), "delete batch submitted");
        Ok(())
    }

    async fn change_visibility_batch(&self, entries: Vec<VisibilityEntry>) -> Result<()> {
        let mut request = self.client.change_message_visibility_batch().queue_url(&self.queue_url);

        for entry in entries {
            let batch_entry =
                aws_sdk_sqs::types::ChangeMessageVisibilityBatchRequestEntry::builder()
                    .id(entry.id)
                    .receipt_handle(entry.receipt)
                    .visibility_timeout(clamp_visibility_timeout(entry.visibility_timeout_secs))
                    .build()
                    .map_err(|e| DispatchError::queue(format!("invalid visibility entry: {e}")))?;
            request = request.entries(batch_entry);
        }

        let output = request
            .send()
            .await
            .map_err(|e| DispatchError::queue(format!("visibility change batch failed: {e}")))?;

        for failed in output.failed() {
            warn!(
                entry_id = %failed.id,
                code = %failed.code,
                detail = failed.message.as_deref().unwrap_or(""),
                "visibility change rejected for batch entry"
            );
        }

        debug!(changed = output.successful().len(), "visibility change batch submitted");
        Ok(())
    }
}

/// Caps a requested visibility timeout to the SQS maximum.
fn clamp_visibility_timeout(secs: u32) -> i32 {
    secs.min(MAX_VISIBILITY_TIMEOUT_SECS) as i32
}
