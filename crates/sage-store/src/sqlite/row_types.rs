//! Database row types for mapping between `SQLite` rows and Rust structs.
//!
//! These represent the raw database row shape. All timestamps are RFC 3339
//! strings as stored; message ordering is always on the `(created_at,
//! sequence)` pair, never on `created_at` alone.

use serde::{Deserialize, Serialize};

/// Raw chat row from the `chats` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatRow {
    /// Chat ID.
    pub id: String,
    /// Owning user ID.
    pub owner_id: String,
    /// Chat title.
    pub title: Option<String>,
    /// Model ID used for generation.
    pub model: String,
    /// System prompt.
    pub system_prompt: Option<String>,
    /// Whether the chat is shared read-only.
    pub is_shared: bool,
    /// Opaque share token (set while shared).
    pub share_token: Option<String>,
    /// Pinned flag.
    pub is_pinned: bool,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

/// Raw message row from the `messages` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageRow {
    /// Message ID.
    pub id: String,
    /// Chat ID.
    pub chat_id: String,
    /// Author role (`user`, `assistant`, `system`).
    pub role: String,
    /// Message content. Grows by appending during streaming.
    pub content: String,
    /// Parent message ID.
    pub parent_id: Option<String>,
    /// Branch ID. `None` means the main thread.
    pub branch_id: Option<String>,
    /// Soft-delete flag — deactivated messages are never physically removed.
    pub is_active: bool,
    /// Whether downstream processing for this message has finished.
    pub is_processing_complete: bool,
    /// Creation timestamp (primary ordering key).
    pub created_at: String,
    /// Per-chat insertion counter (ordering tiebreaker).
    pub sequence: i64,
}

/// Raw branch row from the `branches` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BranchRow {
    /// Branch ID.
    pub id: String,
    /// Chat ID.
    pub chat_id: String,
    /// Main-thread message this branch forks from.
    pub from_message_id: String,
    /// Branch name.
    pub name: String,
    /// Whether this branch is the one the chat currently displays.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: String,
}

/// Raw streaming session row from the `streaming_sessions` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamingSessionRow {
    /// Session ID.
    pub id: String,
    /// Chat ID.
    pub chat_id: String,
    /// Message receiving the streamed content.
    pub message_id: String,
    /// Owning user ID.
    pub owner_id: String,
    /// Whether the session is still accepting chunks.
    pub is_active: bool,
    /// Most recently appended chunk.
    pub last_chunk: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
}

/// Raw resumable stream row from the `resumable_streams` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResumableStreamRow {
    /// Stream ID.
    pub id: String,
    /// Chat ID.
    pub chat_id: String,
    /// Message the generation targets.
    pub message_id: String,
    /// Owning user ID.
    pub owner_id: String,
    /// Model ID the job was started with.
    pub model: String,
    /// Full prompt/message list snapshot as JSON.
    pub prompt_snapshot: String,
    /// Opaque checkpoint token from the generation collaborator.
    pub checkpoint: Option<String>,
    /// Progress percentage (0-100).
    pub progress: i64,
    /// Tokens emitted so far.
    pub total_tokens: i64,
    /// Whether the job is still live (paused jobs remain active).
    pub is_active: bool,
    /// Whether the job is paused.
    pub is_paused: bool,
    /// Creation timestamp.
    pub created_at: String,
    /// Last pause timestamp.
    pub last_paused_at: Option<String>,
    /// Last resume timestamp.
    pub last_resumed_at: Option<String>,
    /// Completion timestamp (terminal).
    pub completed_at: Option<String>,
}
