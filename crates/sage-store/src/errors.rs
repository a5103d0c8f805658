//! Error types for the chat store subsystem.
//!
//! [`StoreError`] is the primary error type returned by all store operations.
//! The domain variants mirror the contract exposed to RPC handlers:
//! `Unauthorized` for ownership failures, the `*NotFound` family for missing
//! entities, and `InvalidArgument` for cross-entity reference violations.
//! Infrastructure variants wrap their sources.

use thiserror::Error;

/// Errors that can occur during chat store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Caller is authenticated but does not own the target entity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Requested chat was not found.
    #[error("chat not found: {0}")]
    ChatNotFound(String),

    /// Requested message was not found.
    #[error("message not found: {0}")]
    MessageNotFound(String),

    /// Requested branch was not found.
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    /// Requested streaming session was not found.
    #[error("streaming session not found: {0}")]
    SessionNotFound(String),

    /// Requested resumable stream was not found.
    #[error("resumable stream not found: {0}")]
    StreamNotFound(String),

    /// A reference between entities is invalid (wrong chat, branch of a branch, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal error (e.g. poisoned lock).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for chat store results.
pub type Result<T> = std::result::Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
