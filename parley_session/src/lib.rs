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

//! In-memory, per-user conversation sessions.
//!
//! The `SessionStore` hands out one shared `ConversationHandle` per user id,
//! created lazily on first access. Map lookups and inserts share a single
//! short critical section; appends are serialized per user by a lock on the
//! individual conversation, so slow callers for one user never hold up
//! another.

mod error;
mod eviction;
mod store;

pub use error::{Result, SessionError};
pub use eviction::{EvictionPolicy, spawn_sweeper};
pub use store::{ConversationHandle, SessionStore};
