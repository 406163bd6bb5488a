//! Core domain types for the sqsd worker daemon.
//!
//! Holds the queue message model, the dispatch outcome classification, and
//! the clock abstraction used to keep worker timing testable. Everything
//! here is free of I/O so the dispatch crate can be exercised against
//! in-memory fakes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod models;
pub mod time;

pub use models::{DispatchOutcome, Message};
pub use time::{Clock, RealClock};
