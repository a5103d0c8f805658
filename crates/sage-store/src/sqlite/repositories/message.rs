//! Message repository — append-only storage for the `messages` table.
//!
//! Messages are never physically removed, only deactivated. Ordering within
//! a chat or branch is always on the `(created_at, sequence)` pair; the
//! per-chat `sequence` counter breaks wall-clock ties deterministically.

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::errors::Result;
use crate::sqlite::row_types::MessageRow;

/// Options for inserting a new message.
pub struct CreateMessageOptions<'a> {
    /// Chat this message belongs to.
    pub chat_id: &'a str,
    /// Author role string (`user`, `assistant`, `system`).
    pub role: &'a str,
    /// Initial content.
    pub content: &'a str,
    /// Optional parent message.
    pub parent_id: Option<&'a str>,
    /// Branch the message belongs to. `None` means the main thread.
    pub branch_id: Option<&'a str>,
}

const SELECT_COLS: &str = "id, chat_id, role, content, parent_id, branch_id, is_active,
                           is_processing_complete, created_at, sequence";

/// Message repository — stateless, every method takes `&Connection`.
pub struct MessageRepo;

impl MessageRepo {
    /// Insert a new active message, stamping `(created_at, sequence)`.
    ///
    /// The sequence counter is read-and-incremented here; callers must run
    /// inside a transaction so concurrent inserts cannot claim the same slot.
    pub fn create(conn: &Connection, opts: &CreateMessageOptions<'_>) -> Result<MessageRow> {
        let id = format!("msg_{}", Uuid::now_v7());
        let now = chrono::Utc::now().to_rfc3339();
        let sequence: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM messages WHERE chat_id = ?1",
            params![opts.chat_id],
            |row| row.get(0),
        )?;

        let _ = conn.execute(
            "INSERT INTO messages (id, chat_id, role, content, parent_id, branch_id,
             is_active, is_processing_complete, created_at, sequence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, 0, ?7, ?8)",
            params![
                id,
                opts.chat_id,
                opts.role,
                opts.content,
                opts.parent_id,
                opts.branch_id,
                now,
                sequence
            ],
        )?;

        Ok(MessageRow {
            id,
            chat_id: opts.chat_id.to_string(),
            role: opts.role.to_string(),
            content: opts.content.to_string(),
            parent_id: opts.parent_id.map(String::from),
            branch_id: opts.branch_id.map(String::from),
            is_active: true,
            is_processing_complete: false,
            created_at: now,
            sequence,
        })
    }

    /// Get message by ID.
    pub fn get_by_id(conn: &Connection, message_id: &str) -> Result<Option<MessageRow>> {
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLS} FROM messages WHERE id = ?1"),
                params![message_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Replace message content (edits).
    pub fn update_content(conn: &Connection, message_id: &str, content: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE messages SET content = ?1 WHERE id = ?2",
            params![content, message_id],
        )?;
        Ok(changed > 0)
    }

    /// Append a chunk to message content in place (streaming accumulation).
    pub fn append_content(conn: &Connection, message_id: &str, chunk: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE messages SET content = content || ?1 WHERE id = ?2",
            params![chunk, message_id],
        )?;
        Ok(changed > 0)
    }

    /// Soft-delete: set `is_active = 0`. The row is never removed.
    pub fn soft_delete(conn: &Connection, message_id: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE messages SET is_active = 0 WHERE id = ?1",
            params![message_id],
        )?;
        Ok(changed > 0)
    }

    /// Mark downstream processing for a message as finished.
    pub fn set_processing_complete(conn: &Connection, message_id: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE messages SET is_processing_complete = 1 WHERE id = ?1",
            params![message_id],
        )?;
        Ok(changed > 0)
    }

    /// True if any active child of `parent_id` has finished processing.
    pub fn has_complete_child(conn: &Connection, parent_id: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM messages
             WHERE parent_id = ?1 AND is_active = 1 AND is_processing_complete = 1)",
            params![parent_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// All active main-thread messages for a chat, ascending.
    pub fn get_main_thread(conn: &Connection, chat_id: &str) -> Result<Vec<MessageRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLS} FROM messages
             WHERE chat_id = ?1 AND branch_id IS NULL AND is_active = 1
             ORDER BY created_at ASC, sequence ASC"
        ))?;
        let rows = stmt
            .query_map(params![chat_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Active main-thread messages up to and including the fork point's
    /// `(created_at, sequence)` key, ascending.
    pub fn get_main_thread_until(
        conn: &Connection,
        chat_id: &str,
        created_at: &str,
        sequence: i64,
    ) -> Result<Vec<MessageRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLS} FROM messages
             WHERE chat_id = ?1 AND branch_id IS NULL AND is_active = 1
               AND (created_at, sequence) <= (?2, ?3)
             ORDER BY created_at ASC, sequence ASC"
        ))?;
        let rows = stmt
            .query_map(params![chat_id, created_at, sequence], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// All active messages belonging to a branch, ascending.
    pub fn get_branch_messages(
        conn: &Connection,
        chat_id: &str,
        branch_id: &str,
    ) -> Result<Vec<MessageRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLS} FROM messages
             WHERE chat_id = ?1 AND branch_id = ?2 AND is_active = 1
             ORDER BY created_at ASC, sequence ASC"
        ))?;
        let rows = stmt
            .query_map(params![chat_id, branch_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Most recent active message in a chat (any thread).
    pub fn get_last(conn: &Connection, chat_id: &str) -> Result<Option<MessageRow>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLS} FROM messages
                     WHERE chat_id = ?1 AND is_active = 1
                     ORDER BY created_at DESC, sequence DESC LIMIT 1"
                ),
                params![chat_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
        Ok(MessageRow {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            role: row.get(2)?,
            content: row.get(3)?,
            parent_id: row.get(4)?,
            branch_id: row.get(5)?,
            is_active: row.get(6)?,
            is_processing_complete: row.get(7)?,
            created_at: row.get(8)?,
            sequence: row.get(9)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
