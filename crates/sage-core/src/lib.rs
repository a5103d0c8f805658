//! # sage-core
//!
//! Foundation types for the Sage study assistant backend.
//!
//! This crate provides the shared vocabulary the persistence crates depend on:
//!
//! - **Branded IDs**: `ChatId`, `MessageId`, `BranchId`, etc. as newtypes for type safety
//! - **Thread references**: `ThreadRef` tagged union selecting main thread vs. a branch
//! - **Message roles**: `MessageRole` enum for user/assistant/system authorship
//! - **Logging**: `tracing` subscriber bootstrap

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod thread;

pub use ids::{BranchId, ChatId, MessageId, ResumableStreamId, StreamingSessionId, UserId};
pub use logging::init_subscriber;
pub use thread::{MessageRole, ThreadRef};
