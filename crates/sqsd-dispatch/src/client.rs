//! HTTP dispatcher: one signed POST per queue message, classified into a
//! dispatch outcome.
//!
//! The dispatcher never touches queue state. It reports an outcome and the
//! worker loop decides which acknowledgement batch the message joins.

use std::time::Instant;

use chrono::{DateTime, Utc};
use sqsd_core::{DispatchOutcome, Message};
use tracing::{debug, warn};

use crate::{
    config::{AuthHeader, DispatcherConfig},
    error::Result,
    signing::RequestSigner,
};

/// Header carrying the queue message id on every delivery request.
const MSGID_HEADER: &str = "X-Aws-Sqsd-Msgid";

/// Prefix for per-attribute headers.
const ATTR_HEADER_PREFIX: &str = "X-Aws-Sqsd-Attr-";

/// Success window for downstream responses: 200 OK through 226 IM Used,
/// inclusive on both ends.
const SUCCESS_RANGE: std::ops::RangeInclusive<u16> = 200..=226;

/// Builds and sends one POST per message and classifies the response.
#[derive(Debug)]
pub struct Dispatcher {
    client: reqwest::Client,
    url: String,
    content_type: Option<String>,
    auth: Option<AuthHeader>,
    signer: Option<RequestSigner>,
}

impl Dispatcher {
    /// Creates a dispatcher from a shared HTTP client and validated
    /// endpoint settings. The HMAC signing prefix is precomputed here.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Configuration` when the settings fail
    /// validation.
    pub fn new(client: reqwest::Client, config: DispatcherConfig) -> Result<Self> {
        config.validate()?;

        let signer = config
            .hmac
            .as_ref()
            .map(|hmac| RequestSigner::new(&hmac.header, hmac.secret.clone(), &config.http_url));

        Ok(Self {
            client,
            url: config.http_url,
            content_type: config.content_type.filter(|ct| !ct.is_empty()),
            auth: config.auth,
            signer,
        })
    }

    /// POSTs the message body to the configured endpoint and classifies the
    /// response.
    ///
    /// Transport errors and timeouts classify as `Fail`; they are never
    /// propagated, so the worker loop stays total. The response body is
    /// drained before the outcome is returned so the pooled connection is
    /// released.
    pub async fn dispatch(&self, message: &Message) -> DispatchOutcome {
        let start = Instant::now();

        let mut request = self
            .client
            .post(&self.url)
            .header(MSGID_HEADER, &message.id)
            .body(message.body.clone());

        for (name, value) in &message.attributes {
            request = request.header(format!("{ATTR_HEADER_PREFIX}{name}"), value);
        }

        if let Some(signer) = &self.signer {
            request = request.header(signer.header(), signer.sign(message.body.as_bytes()));
        }

        if let Some(auth) = &self.auth {
            request = request.header(&auth.name, &auth.value);
        }

        if let Some(content_type) = &self.content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    msg_id = %message.id,
                    url = %self.url,
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "delivery request failed"
                );
                let reason = if e.is_timeout() {
                    format!("request timed out: {e}")
                } else {
                    format!("request failed: {e}")
                };
                return DispatchOutcome::fail(reason);
            }
        };

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        // Drain the body so the connection returns to the pool.
        let _ = response.bytes().await;

        let outcome = classify_response(status, retry_after.as_deref(), Utc::now());

        match &outcome {
            DispatchOutcome::Ack => debug!(
                msg_id = %message.id,
                url = %self.url,
                status,
                duration_ms = start.elapsed().as_millis() as u64,
                "message delivered"
            ),
            DispatchOutcome::Defer { delay_secs } => debug!(
                msg_id = %message.id,
                url = %self.url,
                status,
                delay_secs,
                duration_ms = start.elapsed().as_millis() as u64,
                "delivery deferred"
            ),
            DispatchOutcome::Fail { reason } => warn!(
                msg_id = %message.id,
                url = %self.url,
                status,
                duration_ms = start.elapsed().as_millis() as u64,
                reason = %reason,
                "delivery not accepted"
            ),
        }

        outcome
    }
}

/// Classifies a downstream response status and `Retry-After` header.
///
/// A 429 defers only when the header parses; an unparseable value is a
/// failure, never a guessed delay.
fn classify_response(status: u16, retry_after: Option<&str>, now: DateTime<Utc>) -> DispatchOutcome {
    if SUCCESS_RANGE.contains(&status) {
        return DispatchOutcome::Ack;
    }

    if status == 429 {
        return match retry_after {
            Some(value) => match parse_retry_after(value, now) {
                Some(delay_secs) => DispatchOutcome::Defer { delay_secs },
                None => DispatchOutcome::fail(format!("bad Retry-After value: {value:?}")),
            },
            None => DispatchOutcome::fail("429 response without a Retry-After header"),
        };
    }

    DispatchOutcome::fail(format!("unexpected status {status}"))
}

/// Parses a `Retry-After` value as non-negative integer seconds, falling
/// back to an RFC-1123 HTTP date relative to `now`. A past date clamps to
/// zero. Returns `None` when neither form parses.
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u32> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u32>() {
        return Some(seconds);
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc).signed_duration_since(now).num_seconds().max(0);
    Some(u32::try_from(delta).unwrap_or(u32::MAX))
}
