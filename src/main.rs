//! sqsd: an SQS-to-HTTP worker daemon.
//!
//! Long-polls an SQS queue and POSTs each message body to a configured
//! endpoint. Messages the endpoint accepts (2xx) are deleted; messages it
//! rate-limits (429 with a `Retry-After`) have their visibility extended;
//! everything else is left for the queue to redeliver.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqsd_dispatch::{queue::SqsQueue, Dispatcher, Supervisor};
use tracing::info;

mod config;
mod health;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // A configuration error aborts the process with a non-zero exit code
    // before any worker starts.
    let config = Config::load()?;

    init_tracing(&config.log_level);

    info!(
        queue_region = %config.queue_region,
        queue_url = %config.queue_url,
        http_url = %config.http_url,
        worker_count = config.http_max_conns,
        "configuration loaded"
    );

    let http_client = config
        .to_client_config()
        .build_client()
        .context("failed to build HTTP client")?;

    if let Some(probe) = config.probe_config() {
        health::wait_until_healthy(&http_client, &probe).await;
    }

    let sqs_client = build_sqs_client(&config).await;
    let queue = Arc::new(SqsQueue::new(sqs_client, config.queue_url.clone()));
    let dispatcher = Dispatcher::new(http_client, config.to_dispatcher_config())
        .context("failed to build dispatcher")?;

    let supervisor = Supervisor::new(queue, dispatcher, config.to_queue_config());
    supervisor.start(config.http_max_conns);

    shutdown_signal().await;
    info!("shutdown signal received, draining workers");

    supervisor.shutdown();
    supervisor.wait().await;

    info!("shutdown complete");
    Ok(())
}

/// Initializes tracing from `RUST_LOG`, falling back to the configured
/// level.
fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = fmt::layer().with_target(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Builds the SQS client for the configured region, honoring the endpoint
/// override used with local stacks.
async fn build_sqs_client(config: &Config) -> aws_sdk_sqs::Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.queue_region.clone()));

    if !config.aws_endpoint.is_empty() {
        loader = loader.endpoint_url(&config.aws_endpoint);
    }

    let sdk_config = loader.load().await;
    aws_sdk_sqs::Client::new(&sdk_config)
}

/// Waits for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received SIGINT");
        },
        _ = terminate => {
            info!("received SIGTERM");
        },
    }
}
