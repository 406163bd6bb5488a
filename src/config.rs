//! Daemon configuration loaded from defaults, `config.toml`, and
//! environment variables.

use std::time::Duration;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use sqsd_dispatch::config::{
    AuthHeader, ClientConfig, DispatcherConfig, HmacConfig, QueueConfig,
};

use crate::health::ProbeConfig;

const CONFIG_FILE: &str = "config.toml";

/// Complete daemon configuration.
///
/// Configuration is loaded in priority order: environment variables
/// (highest), `config.toml`, then built-in defaults. Every field is
/// documented with the environment variable that overrides it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Queue
    /// AWS region of the queue. Environment variable: `QUEUE_REGION`.
    #[serde(default, alias = "QUEUE_REGION")]
    pub queue_region: String,
    /// URL of the queue to consume. Environment variable: `QUEUE_URL`.
    #[serde(default, alias = "QUEUE_URL")]
    pub queue_url: String,
    /// Receive batch size, 1 through 10. Environment variable:
    /// `QUEUE_MAX_MSGS`.
    #[serde(default = "default_queue_max_msgs", alias = "QUEUE_MAX_MSGS")]
    pub queue_max_msgs: i32,
    /// Long-poll wait in seconds, 0 through 20. Zero disables long
    /// polling. Environment variable: `QUEUE_WAIT_TIME`.
    #[serde(default = "default_queue_wait_time", alias = "QUEUE_WAIT_TIME")]
    pub queue_wait_time: i32,
    /// SQS endpoint override, for local stacks. Environment variable:
    /// `AWS_ENDPOINT`.
    #[serde(default, alias = "AWS_ENDPOINT")]
    pub aws_endpoint: String,

    // HTTP delivery
    /// Worker count and HTTP connection pool size. Environment variable:
    /// `HTTP_MAX_CONNS`.
    #[serde(default = "default_http_max_conns", alias = "HTTP_MAX_CONNS")]
    pub http_max_conns: usize,
    /// Endpoint every message body is POSTed to. Environment variable:
    /// `HTTP_URL`.
    #[serde(default, alias = "HTTP_URL")]
    pub http_url: String,
    /// Optional `Content-Type` header for delivery requests. Environment
    /// variable: `HTTP_CONTENT_TYPE`.
    #[serde(default, alias = "HTTP_CONTENT_TYPE")]
    pub http_content_type: String,
    /// Per-request timeout in seconds. Environment variable:
    /// `HTTP_TIMEOUT`.
    #[serde(default = "default_http_timeout", alias = "HTTP_TIMEOUT")]
    pub http_timeout: u64,
    /// Whether to verify TLS certificates. Environment variable:
    /// `SSL_VERIFY`.
    #[serde(default = "default_ssl_verify", alias = "SSL_VERIFY")]
    pub ssl_verify: bool,

    // Signing and authentication
    /// Header carrying the HMAC signature; must be set together with the
    /// secret. Environment variable: `HTTP_HMAC_HEADER`.
    #[serde(default, alias = "HTTP_HMAC_HEADER")]
    pub http_hmac_header: String,
    /// HMAC signing secret. Environment variable: `HMAC_SECRET_KEY`.
    #[serde(default, alias = "HMAC_SECRET_KEY")]
    pub hmac_secret_key: String,
    /// Name of the static authentication header. Environment variable:
    /// `HTTP_AUTH_HEADER_NAME`.
    #[serde(default = "default_auth_header_name", alias = "HTTP_AUTH_HEADER_NAME")]
    pub http_auth_header_name: String,
    /// Value of the static authentication header; empty disables it.
    /// Environment variable: `HTTP_AUTH_HEADER`.
    #[serde(default, alias = "HTTP_AUTH_HEADER")]
    pub http_auth_header: String,

    // Pre-start health probe
    /// Path appended to `HTTP_URL` for the pre-start probe; empty disables
    /// probing. Environment variable: `HTTP_HEALTH_PATH`.
    #[serde(default, alias = "HTTP_HEALTH_PATH")]
    pub http_health_path: String,
    /// Seconds to wait before the first probe. Environment variable:
    /// `HTTP_HEALTH_WAIT`.
    #[serde(default = "default_health_wait", alias = "HTTP_HEALTH_WAIT")]
    pub http_health_wait: u64,
    /// Seconds between probes. Environment variable:
    /// `HTTP_HEALTH_INTERVAL`.
    #[serde(default = "default_health_interval", alias = "HTTP_HEALTH_INTERVAL")]
    pub http_health_interval: u64,
    /// Consecutive 2xx responses required before starting. Environment
    /// variable: `HTTP_HEALTH_SUCCESS_COUNT`.
    #[serde(default = "default_health_success_count", alias = "HTTP_HEALTH_SUCCESS_COUNT")]
    pub http_health_success_count: u32,

    // Logging
    /// Default tracing filter when `RUST_LOG` is unset. Environment
    /// variable: `LOG_LEVEL`.
    #[serde(default = "default_log_level", alias = "LOG_LEVEL")]
    pub log_level: String,
}

impl Config {
    /// Loads configuration from defaults, `config.toml`, and environment
    /// overrides, then validates it.
    ///
    /// # Errors
    ///
    /// Returns an error when extraction fails or a required setting is
    /// missing or out of range; the caller aborts startup.
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(""));

        let config: Self = figment.extract().context("failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Converts to the dispatch crate's queue settings.
    pub fn to_queue_config(&self) -> QueueConfig {
        QueueConfig {
            queue_url: self.queue_url.clone(),
            max_messages: self.queue_max_msgs,
            wait_time_secs: self.queue_wait_time,
        }
    }

    /// Converts to the dispatch crate's endpoint settings.
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        let hmac = (!self.http_hmac_header.is_empty()).then(|| HmacConfig {
            header: self.http_hmac_header.clone(),
            secret: self.hmac_secret_key.clone().into_bytes(),
        });

        let auth = (!self.http_auth_header.is_empty()).then(|| AuthHeader {
            name: if self.http_auth_header_name.is_empty() {
                default_auth_header_name()
            } else {
                self.http_auth_header_name.clone()
            },
            value: self.http_auth_header.clone(),
        });

        DispatcherConfig {
            http_url: self.http_url.clone(),
            content_type: (!self.http_content_type.is_empty())
                .then(|| self.http_content_type.clone()),
            hmac,
            auth,
        }
    }

    /// Converts to the shared HTTP client settings.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.http_timeout),
            pool_size: self.http_max_conns,
            verify_tls: self.ssl_verify,
        }
    }

    /// Pre-start probe settings, or `None` when probing is disabled.
    pub fn probe_config(&self) -> Option<ProbeConfig> {
        if self.http_health_path.is_empty() {
            return None;
        }

        Some(ProbeConfig {
            url: format!("{}{}", self.http_url, self.http_health_path),
            initial_wait: Duration::from_secs(self.http_health_wait),
            interval: Duration::from_secs(self.http_health_interval),
            required_successes: self.http_health_success_count.max(1),
        })
    }

    /// Validates required fields and numeric ranges.
    fn validate(&self) -> Result<()> {
        if self.queue_region.is_empty() {
            anyhow::bail!("QUEUE_REGION must not be empty");
        }

        if self.queue_url.is_empty() {
            anyhow::bail!("QUEUE_URL must not be empty");
        }

        if self.http_url.is_empty() {
            anyhow::bail!("HTTP_URL must not be empty");
        }

        if !(1..=10).contains(&self.queue_max_msgs) {
            anyhow::bail!("QUEUE_MAX_MSGS must be between 1 and 10");
        }

        if !(0..=20).contains(&self.queue_wait_time) {
            anyhow::bail!("QUEUE_WAIT_TIME must be between 0 and 20");
        }

        if self.http_max_conns == 0 {
            anyhow::bail!("HTTP_MAX_CONNS must be greater than 0");
        }

        if self.http_timeout == 0 {
            anyhow::bail!("HTTP_TIMEOUT must be greater than 0");
        }

        if self.http_hmac_header.is_empty() != self.hmac_secret_key.is_empty() {
            anyhow::bail!("HTTP_HMAC_HEADER and HMAC_SECRET_KEY must be set together");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_region: String::new(),
            queue_url: String::new(),
            queue_max_msgs: default_queue_max_msgs(),
            queue_wait_time: default_queue_wait_time(),
            aws_endpoint: String::new(),
            http_max_conns: default_http_max_conns(),
            http_url: String::new(),
            http_content_type: String::new(),
            http_timeout: default_http_timeout(),
            ssl_verify: default_ssl_verify(),
            http_hmac_header: String::new(),
            hmac_secret_key: String::new(),
            http_auth_header_name: default_auth_header_name(),
            http_auth_header: String::new(),
            http_health_path: String::new(),
            http_health_wait: default_health_wait(),
            http_health_interval: default_health_interval(),
            http_health_success_count: default_health_success_count(),
            log_level: default_log_level(),
        }
    }
}

fn default_queue_max_msgs() -> i32 {
    sqsd_dispatch::DEFAULT_MAX_MESSAGES
}

fn default_queue_wait_time() -> i32 {
    sqsd_dispatch::DEFAULT_WAIT_TIME_SECS
}

fn default_http_max_conns() -> usize {
    sqsd_dispatch::DEFAULT_WORKER_COUNT
}

fn default_http_timeout() -> u64 {
    sqsd_dispatch::DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_ssl_verify() -> bool {
    true
}

fn default_auth_header_name() -> String {
    "Authorization".to_string()
}

fn default_health_wait() -> u64 {
    5
}

fn default_health_interval() -> u64 {
    5
}

fn default_health_success_count() -> u32 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    //! Configuration tests using `figment::Jail` so environment variables
    //! are isolated per test.

    use figment::Jail;

    use super::*;

    fn set_required_env(jail: &mut Jail) {
        jail.set_env("QUEUE_REGION", "us-east-1");
        jail.set_env("QUEUE_URL", "https://sqs.us-east-1.amazonaws.com/123/q");
        jail.set_env("HTTP_URL", "http://localhost:8080/worker");
    }

    #[test]
    fn defaults_require_queue_and_http_settings() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_with_required_env() {
        Jail::expect_with(|jail| {
            set_required_env(jail);

            let config = Config::load().expect("config should load");

            assert_eq!(config.queue_region, "us-east-1");
            assert_eq!(config.queue_max_msgs, 10);
            assert_eq!(config.queue_wait_time, 10);
            assert_eq!(config.http_max_conns, 25);
            assert_eq!(config.http_timeout, 15);
            assert!(config.ssl_verify);
            assert!(config.probe_config().is_none());

            Ok(())
        });
    }

    #[test]
    fn env_values_override_defaults() {
        Jail::expect_with(|jail| {
            set_required_env(jail);
            jail.set_env("QUEUE_MAX_MSGS", "5");
            jail.set_env("QUEUE_WAIT_TIME", "20");
            jail.set_env("HTTP_MAX_CONNS", "4");
            jail.set_env("HTTP_TIMEOUT", "30");
            jail.set_env("SSL_VERIFY", "false");
            jail.set_env("HTTP_CONTENT_TYPE", "application/json");

            let config = Config::load().expect("config should load");

            assert_eq!(config.queue_max_msgs, 5);
            assert_eq!(config.queue_wait_time, 20);
            assert_eq!(config.http_max_conns, 4);
            assert_eq!(config.http_timeout, 30);
            assert!(!config.ssl_verify);

            let dispatcher = config.to_dispatcher_config();
            assert_eq!(dispatcher.content_type.as_deref(), Some("application/json"));

            Ok(())
        });
    }

    #[test]
    fn batch_size_out_of_range_rejected() {
        Jail::expect_with(|jail| {
            set_required_env(jail);
            jail.set_env("QUEUE_MAX_MSGS", "11");

            assert!(Config::load().is_err());
            Ok(())
        });
    }

    #[test]
    fn wait_time_out_of_range_rejected() {
        Jail::expect_with(|jail| {
            set_required_env(jail);
            jail.set_env("QUEUE_WAIT_TIME", "21");

            assert!(Config::load().is_err());
            Ok(())
        });
    }

    #[test]
    fn hmac_settings_must_come_together() {
        Jail::expect_with(|jail| {
            set_required_env(jail);
            jail.set_env("HTTP_HMAC_HEADER", "X-Sig");

            assert!(Config::load().is_err());
            Ok(())
        });

        Jail::expect_with(|jail| {
            set_required_env(jail);
            jail.set_env("HTTP_HMAC_HEADER", "X-Sig");
            jail.set_env("HMAC_SECRET_KEY", "foobar");

            let config = Config::load().expect("config should load");
            let dispatcher = config.to_dispatcher_config();

            let hmac = dispatcher.hmac.expect("hmac should be configured");
            assert_eq!(hmac.header, "X-Sig");
            assert_eq!(hmac.secret, b"foobar");

            Ok(())
        });
    }

    #[test]
    fn auth_header_name_defaults_to_authorization() {
        Jail::expect_with(|jail| {
            set_required_env(jail);
            jail.set_env("HTTP_AUTH_HEADER", "Bearer token");

            let config = Config::load().expect("config should load");
            let auth =
                config.to_dispatcher_config().auth.expect("auth header should be configured");

            assert_eq!(auth.name, "Authorization");
            assert_eq!(auth.value, "Bearer token");

            Ok(())
        });
    }

    #[test]
    fn health_probe_enabled_by_path() {
        Jail::expect_with(|jail| {
            set_required_env(jail);
            jail.set_env("HTTP_HEALTH_PATH", "/health");
            jail.set_env("HTTP_HEALTH_WAIT", "1");
            jail.set_env("HTTP_HEALTH_INTERVAL", "2");
            jail.set_env("HTTP_HEALTH_SUCCESS_COUNT", "3");

            let config = Config::load().expect("config should load");
            let probe = config.probe_config().expect("probe should be configured");

            assert_eq!(probe.url, "http://localhost:8080/worker/health");
            assert_eq!(probe.initial_wait, Duration::from_secs(1));
            assert_eq!(probe.interval, Duration::from_secs(2));
            assert_eq!(probe.required_successes, 3);

            Ok(())
        });
    }

    #[test]
    fn config_file_overridden_by_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                queue_region = "eu-west-1"
                queue_url = "https://sqs.eu-west-1.amazonaws.com/123/q"
                http_url = "http://localhost:8080/worker"
                http_max_conns = 8
                "#,
            )?;
            jail.set_env("HTTP_MAX_CONNS", "16");

            let config = Config::load().expect("config should load");

            assert_eq!(config.queue_region, "eu-west-1");
            assert_eq!(config.http_max_conns, 16);

            Ok(())
        });
    }
}
