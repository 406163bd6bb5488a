//! Dispatch engine bridging an SQS queue to an HTTP endpoint.
//!
//! A pool of identical workers each runs a receive → dispatch → acknowledge
//! loop: long-poll the queue for a batch, POST every message body to the
//! configured endpoint, then delete the accepted messages and extend the
//! visibility of the rate-limited ones in two batch calls.
//!
//! ```text
//!                 ┌───────────────────────────────┐
//!                 │              SQS              │
//!                 └───────────────────────────────┘
//!                    │ receive        ▲ delete /
//!                    │ (long poll)    │ change visibility
//!           ┌────────┴────────────────┴─────────┐
//!           │            Supervisor             │
//!           │  ┌──────────┐      ┌──────────┐   │
//!           │  │ Worker 1 │ ...  │ Worker N │   │
//!           │  └──────────┘      └──────────┘   │
//!           └────────┬──────────────────────────┘
//!                    │ signed POST per message
//!                    ▼
//!           ┌───────────────────┐
//!           │ HTTP endpoint     │  2xx → delete
//!           │                   │  429 + Retry-After → defer
//!           └───────────────────┘  anything else → redeliver
//! ```
//!
//! The downstream response is the only control signal: a 2xx acknowledges
//! the message, a 429 with a parseable `Retry-After` defers it by extending
//! its visibility timeout, and everything else leaves it for the queue's
//! own redelivery.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod queue;
pub mod signing;
pub mod supervisor;
pub mod worker;

pub use client::Dispatcher;
pub use config::{AuthHeader, ClientConfig, DispatcherConfig, HmacConfig, QueueConfig};
pub use error::{DispatchError, Result};
pub use queue::{DeleteEntry, QueueClient, SqsQueue, VisibilityEntry};
pub use supervisor::Supervisor;
pub use worker::Worker;

/// Default worker count, matching the HTTP connection pool size.
pub const DEFAULT_WORKER_COUNT: usize = 25;

/// Default receive batch size (the SQS maximum).
pub const DEFAULT_MAX_MESSAGES: i32 = 10;

/// Default long-poll wait in seconds.
pub const DEFAULT_WAIT_TIME_SECS: i32 = 10;

/// Default per-request HTTP timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
