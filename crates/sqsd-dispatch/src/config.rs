//! Validated configuration for the queue loop, dispatcher, and HTTP client.

use std::{fmt, time::Duration};

use crate::error::{DispatchError, Result};

/// Receive-loop settings for one queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// URL of the queue to consume.
    pub queue_url: String,
    /// Receive batch size, 1 through 10 (the SQS limit).
    pub max_messages: i32,
    /// Long-poll wait in seconds, 0 through 20. Zero disables long polling.
    pub wait_time_secs: i32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_url: String::new(),
            max_messages: crate::DEFAULT_MAX_MESSAGES,
            wait_time_secs: crate::DEFAULT_WAIT_TIME_SECS,
        }
    }
}

impl QueueConfig {
    /// Validates the queue settings.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Configuration` when the queue URL is empty or
    /// a bound falls outside the SQS-accepted range.
    pub fn validate(&self) -> Result<()> {
        if self.queue_url.trim().is_empty() {
            return Err(DispatchError::configuration("queue_url must not be empty"));
        }
        if !(1..=10).contains(&self.max_messages) {
            return Err(DispatchError::configuration(format!(
                "max_messages must be between 1 and 10, got {}",
                self.max_messages
            )));
        }
        if !(0..=20).contains(&self.wait_time_secs) {
            return Err(DispatchError::configuration(format!(
                "wait_time_secs must be between 0 and 20, got {}",
                self.wait_time_secs
            )));
        }
        Ok(())
    }
}

/// HMAC signing settings. Both parts are required together.
#[derive(Clone)]
pub struct HmacConfig {
    /// Header name carrying the signature.
    pub header: String,
    /// Signing secret.
    pub secret: Vec<u8>,
}

impl fmt::Debug for HmacConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The secret never appears in logs.
        f.debug_struct("HmacConfig").field("header", &self.header).finish_non_exhaustive()
    }
}

/// Static authentication header attached to every delivery request.
#[derive(Clone)]
pub struct AuthHeader {
    /// Header name, typically `Authorization`.
    pub name: String,
    /// Header value.
    pub value: String,
}

impl fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHeader").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Delivery endpoint settings for the HTTP dispatcher.
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Endpoint every message body is POSTed to.
    pub http_url: String,
    /// Optional `Content-Type` header for delivery requests.
    pub content_type: Option<String>,
    /// Optional HMAC signing of the request body.
    pub hmac: Option<HmacConfig>,
    /// Optional static authentication header.
    pub auth: Option<AuthHeader>,
}

impl DispatcherConfig {
    /// Validates the dispatcher settings.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Configuration` when the delivery URL is empty
    /// or HMAC signing is configured with an empty header or secret.
    pub fn validate(&self) -> Result<()> {
        if self.http_url.trim().is_empty() {
            return Err(DispatchError::configuration("http_url must not be empty"));
        }
        if let Some(hmac) = &self.hmac {
            if hmac.header.trim().is_empty() {
                return Err(DispatchError::configuration("hmac header must not be empty"));
            }
            if hmac.secret.is_empty() {
                return Err(DispatchError::configuration("hmac secret must not be empty"));
            }
        }
        Ok(())
    }
}

/// Settings for the shared HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-request timeout, the only hard bound on delivery tail latency.
    pub timeout: Duration,
    /// Idle connections kept per host; sized to the worker count so workers
    /// do not queue behind each other.
    pub pool_size: usize,
    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(crate::DEFAULT_HTTP_TIMEOUT_SECS),
            pool_size: crate::DEFAULT_WORKER_COUNT,
            verify_tls: true,
        }
    }
}

impl ClientConfig {
    /// Builds the pooled HTTP client shared by every worker.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Configuration` if the client cannot be built
    /// with the provided settings.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(self.pool_size)
            .danger_accept_invalid_certs(!self.verify_tls)
            .build()
            .map_err(|e| {
                DispatchError::configuration(format!("failed to build HTTP client: {e}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_queue_config() -> QueueConfig {
        QueueConfig { queue_url: "https://sqs.test/q".to_string(), ..Default::default() }
    }

    #[test]
    fn default_queue_bounds_are_valid() {
        assert!(valid_queue_config().validate().is_ok());
    }

    #[test]
    fn empty_queue_url_rejected() {
        let config = QueueConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn batch_size_bounds_enforced() {
        let config = QueueConfig { max_messages: 0, ..valid_queue_config() };
        assert!(config.validate().is_err());

        let config = QueueConfig { max_messages: 11, ..valid_queue_config() };
        assert!(config.validate().is_err());

        let config = QueueConfig { max_messages: 1, ..valid_queue_config() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn wait_time_bounds_enforced() {
        let config = QueueConfig { wait_time_secs: -1, ..valid_queue_config() };
        assert!(config.validate().is_err());

        let config = QueueConfig { wait_time_secs: 21, ..valid_queue_config() };
        assert!(config.validate().is_err());

        // Zero is legal: it switches the loop to short polling.
        let config = QueueConfig { wait_time_secs: 0, ..valid_queue_config() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_http_url_rejected() {
        let config = DispatcherConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn hmac_requires_header_and_secret() {
        let config = DispatcherConfig {
            http_url: "http://localhost/worker".to_string(),
            hmac: Some(HmacConfig { header: String::new(), secret: b"secret".to_vec() }),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DispatcherConfig {
            http_url: "http://localhost/worker".to_string(),
            hmac: Some(HmacConfig { header: "X-Sig".to_string(), secret: Vec::new() }),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DispatcherConfig {
            http_url: "http://localhost/worker".to_string(),
            hmac: Some(HmacConfig { header: "X-Sig".to_string(), secret: b"secret".to_vec() }),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn client_builds_with_defaults() {
        assert!(ClientConfig::default().build_client().is_ok());
    }

    #[test]
    fn secrets_hidden_from_debug_output() {
        let hmac = HmacConfig { header: "X-Sig".to_string(), secret: b"hunter2".to_vec() };
        assert!(!format!("{hmac:?}").contains("hunter2"));

        let auth = AuthHeader { name: "Authorization".to_string(), value: "Bearer tok".to_string() };
        assert!(!format!("{auth:?}").contains("Bearer"));
    }
}
