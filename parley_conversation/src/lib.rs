#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Per-user dialogue on top of a stateless completion backend.
//!
//! Each inbound event looks up (or creates) the sender's conversation,
//! sends the recorded history plus the new query to the backend, and on
//! success appends the query and reply as one contiguous pair. Nothing is
//! recorded when the backend fails, times out, or the request is dropped.

mod error;
mod service;

pub use error::{ConversationError, Result};
pub use service::{ConversationService, InboundEvent, TurnOutcome};
