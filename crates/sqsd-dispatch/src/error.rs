//! Error types for queue and wiring operations.
//!
//! Delivery failures are not errors here: the dispatcher folds transport
//! problems and unexpected statuses into the `Fail` dispatch outcome so the
//! worker loop stays total. Errors in this module cover the queue transport
//! and invalid configuration.

use thiserror::Error;

/// Result type alias for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Error conditions raised by the queue adapter and configuration.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// A queue operation failed at the transport level.
    #[error("queue error: {message}")]
    Queue {
        /// Description of the failed queue operation.
        message: String,
    },

    /// Invalid worker, dispatcher, or client configuration.
    #[error("invalid configuration: {message}")]
    Configuration {
        /// Description of the rejected setting.
        message: String,
    },
}

impl DispatchError {
    /// Creates a queue transport error.
    pub fn queue(message: impl Into<String>) -> Self {
        Self::Queue { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_format() {
        let error = DispatchError::queue("receive failed");
        assert_eq!(error.to_string(), "queue error: receive failed");

        let error = DispatchError::configuration("queue_url must not be empty");
        assert_eq!(error.to_string(), "invalid configuration: queue_url must not be empty");
    }
}
