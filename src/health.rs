//! Pre-start health probing of the delivery endpoint.
//!
//! When configured, the daemon refuses to start its workers until the
//! downstream service has answered a run of consecutive 2xx responses, so
//! a deploying service is not hammered with deliveries it would only fail.

use std::time::Duration;

use tracing::{debug, info};

/// Settings for the pre-start probe.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Full URL probed with GET requests.
    pub url: String,
    /// Delay before the first probe.
    pub initial_wait: Duration,
    /// Delay between probes.
    pub interval: Duration,
    /// Consecutive 2xx responses required; a failure resets the streak.
    pub required_successes: u32,
}

/// Blocks until the endpoint has answered the required number of
/// consecutive 2xx responses. Never gives up; startup is gated on it.
pub async fn wait_until_healthy(client: &reqwest::Client, config: &ProbeConfig) {
    info!(
        url = %config.url,
        wait_secs = config.initial_wait.as_secs(),
        "waiting before health check"
    );
    tokio::time::sleep(config.initial_wait).await;

    let mut successes = 0u32;

    loop {
        match client.get(&config.url).send().await {
            Ok(response) if response.status().is_success() => {
                successes += 1;
                debug!(
                    successes,
                    required = config.required_successes,
                    "health check succeeded"
                );
                if successes >= config.required_successes {
                    break;
                }
            }
            Ok(response) => {
                debug!(
                    status = response.status().as_u16(),
                    "health check returned non-success status"
                );
                successes = 0;
            }
            Err(e) => {
                debug!(error = %e, "health check request failed");
                successes = 0;
            }
        }

        tokio::time::sleep(config.interval).await;
    }

    info!(url = %config.url, "health check passed, starting message processing");
}

#[cfg(test)]
mod tests {
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;

    fn probe(url: String, required: u32) -> ProbeConfig {
        ProbeConfig {
            url,
            initial_wait: Duration::ZERO,
            interval: Duration::from_millis(10),
            required_successes: required,
        }
    }

    #[tokio::test]
    async fn returns_once_endpoint_is_healthy() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .and(matchers::path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let config = probe(format!("{}/health", server.uri()), 1);

        tokio::time::timeout(Duration::from_secs(5), wait_until_healthy(&client, &config))
            .await
            .expect("probe should complete against a healthy endpoint");
    }

    #[tokio::test]
    async fn retries_until_endpoint_recovers() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(matchers::method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let config = probe(server.uri(), 1);

        tokio::time::timeout(Duration::from_secs(5), wait_until_healthy(&client, &config))
            .await
            .expect("probe should complete once the endpoint recovers");
    }

    #[tokio::test]
    async fn requires_consecutive_successes() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(3..)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let config = probe(server.uri(), 3);

        tokio::time::timeout(Duration::from_secs(5), wait_until_healthy(&client, &config))
            .await
            .expect("probe should complete after three successes");

        server.verify().await;
    }
}
