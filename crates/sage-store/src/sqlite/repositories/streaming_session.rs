//! Streaming session repository — CRUD for the `streaming_sessions` table.
//!
//! A streaming session is the short-lived record of one assistant turn's
//! incremental generation. Sessions go `Created -> Active -> Completed`;
//! there is no way back out of completed.

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::errors::Result;
use crate::sqlite::row_types::StreamingSessionRow;

/// Streaming session repository — stateless, every method takes `&Connection`.
pub struct StreamingSessionRepo;

impl StreamingSessionRepo {
    /// Create a new active session for a message.
    pub fn create(
        conn: &Connection,
        chat_id: &str,
        message_id: &str,
        owner_id: &str,
    ) -> Result<StreamingSessionRow> {
        let id = format!("ss_{}", Uuid::now_v7());
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO streaming_sessions (id, chat_id, message_id, owner_id, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            params![id, chat_id, message_id, owner_id, now],
        )?;
        Ok(StreamingSessionRow {
            id,
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
            owner_id: owner_id.to_string(),
            is_active: true,
            last_chunk: None,
            created_at: now,
        })
    }

    /// Get session by ID.
    pub fn get_by_id(conn: &Connection, session_id: &str) -> Result<Option<StreamingSessionRow>> {
        let row = conn
            .query_row(
                "SELECT id, chat_id, message_id, owner_id, is_active, last_chunk, created_at
                 FROM streaming_sessions WHERE id = ?1",
                params![session_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Most recent active session for `(chat, owner)`.
    pub fn get_active_for(
        conn: &Connection,
        chat_id: &str,
        owner_id: &str,
    ) -> Result<Option<StreamingSessionRow>> {
        let row = conn
            .query_row(
                "SELECT id, chat_id, message_id, owner_id, is_active, last_chunk, created_at
                 FROM streaming_sessions
                 WHERE chat_id = ?1 AND owner_id = ?2 AND is_active = 1
                 ORDER BY created_at DESC LIMIT 1",
                params![chat_id, owner_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Record the most recently appended chunk.
    pub fn set_last_chunk(conn: &Connection, session_id: &str, chunk: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE streaming_sessions SET last_chunk = ?1 WHERE id = ?2",
            params![chunk, session_id],
        )?;
        Ok(changed > 0)
    }

    /// Mark a session completed: inactive, with its final chunk recorded.
    pub fn complete(conn: &Connection, session_id: &str, final_chunk: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE streaming_sessions SET is_active = 0, last_chunk = ?1 WHERE id = ?2",
            params![final_chunk, session_id],
        )?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StreamingSessionRow> {
        Ok(StreamingSessionRow {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            message_id: row.get(2)?,
            owner_id: row.get(3)?,
            is_active: row.get(4)?,
            last_chunk: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
