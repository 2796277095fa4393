//! Session management for the agent gateway.
//!
//! Each session is a single design-project conversation: a row in an
//! embedded SQLite database, an append-only turn history, usage counters,
//! and per-transport checkpoints for resuming a streamed agent loop.

pub mod store;

pub use store::{Session, SessionStore, Turn};
