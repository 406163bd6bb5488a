//! Queue message model and dispatch outcome classification.

use std::collections::HashMap;

/// A message received from the queue.
///
/// The `receipt` is the opaque token required to delete the message or
/// change its visibility; it is valid only for the receive cycle that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Queue-assigned identifier, stable for this receipt.
    pub id: String,
    /// Opaque acknowledgement token for this delivery of the message.
    pub receipt: String,
    /// Payload posted to the downstream service. May be empty.
    pub body: String,
    /// Message attributes, forwarded to the downstream service as headers.
    pub attributes: HashMap<String, String>,
}

impl Message {
    /// Converts an SDK message into the domain model.
    ///
    /// Returns `None` when the SDK omits the message id or receipt handle;
    /// such a message could never be acknowledged, so the caller drops it.
    /// A missing body becomes the empty string (an empty payload is legal).
    pub fn from_sqs(msg: aws_sdk_sqs::types::Message) -> Option<Self> {
        let id = msg.message_id?;
        let receipt = msg.receipt_handle?;
        let body = msg.body.unwrap_or_default();

        let attributes = msg
            .message_attributes
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(name, value)| value.string_value.map(|v| (name, v)))
            .collect();

        Some(Self { id, receipt, body, attributes })
    }
}

/// Classification of one delivery attempt.
///
/// Exactly one outcome is produced per message per receive cycle, so the
/// partition into delete and visibility-change batches is total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Delivered; the message should be deleted from the queue.
    Ack,
    /// Downstream signalled backpressure; extend the message's visibility.
    Defer {
        /// Seconds to keep the message invisible before redelivery.
        delay_secs: u32,
    },
    /// Delivery failed; leave the message for queue redelivery.
    Fail {
        /// Failure reason, for logging only.
        reason: String,
    },
}

impl DispatchOutcome {
    /// Creates a failure outcome from a reason.
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail { reason: reason.into() }
    }

    /// Whether this outcome schedules a delete.
    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }
}
