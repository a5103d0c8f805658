//! # sage-store
//!
//! `SQLite` persistence core for the Sage study assistant.
//!
//! Responsible for:
//!
//! - **Chats**: ownership, sharing, titles, pinning
//! - **Messages**: append-only storage with soft delete and branched-thread
//!   reconstruction ordered on `(created_at, sequence)`
//! - **Branches**: alternate explorations forked off the main thread, with the
//!   single-active-branch invariant enforced per chat
//! - **Streaming sessions**: chunk-by-chunk accumulation of one assistant turn
//! - **Resumable streams**: durable generation checkpoints that survive
//!   process restarts and pause/resume cycles
//! - **`SQLite` backend**: `rusqlite` facade with repository pattern and
//!   version-tracked migrations

#![deny(unsafe_code)]

pub mod errors;
pub mod sqlite;
pub mod store;

pub use errors::{Result, StoreError};
pub use store::ChatStore;
