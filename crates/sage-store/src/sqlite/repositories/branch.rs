//! Branch repository — CRUD for the `branches` table.
//!
//! Branches are alternate explorations forked off a main-thread message.
//! At most one branch per chat is active; "no active branch" means the chat
//! is on its main thread. Activation changes go through
//! [`ActivationRepo`](crate::sqlite::repositories::activation::ActivationRepo).

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::errors::Result;
use crate::sqlite::row_types::BranchRow;

/// Options for creating a new branch.
pub struct CreateBranchOptions<'a> {
    /// Chat this branch belongs to.
    pub chat_id: &'a str,
    /// Main-thread message the branch forks from.
    pub from_message_id: &'a str,
    /// Branch name.
    pub name: &'a str,
    /// Whether the branch is created active.
    pub is_active: bool,
}

/// Branch repository — stateless, every method takes `&Connection`.
pub struct BranchRepo;

impl BranchRepo {
    /// Create a new branch.
    pub fn create(conn: &Connection, opts: &CreateBranchOptions<'_>) -> Result<BranchRow> {
        let id = format!("br_{}", Uuid::now_v7());
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO branches (id, chat_id, from_message_id, name, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                opts.chat_id,
                opts.from_message_id,
                opts.name,
                opts.is_active,
                now
            ],
        )?;
        Ok(BranchRow {
            id,
            chat_id: opts.chat_id.to_string(),
            from_message_id: opts.from_message_id.to_string(),
            name: opts.name.to_string(),
            is_active: opts.is_active,
            created_at: now,
        })
    }

    /// Get branch by ID.
    pub fn get_by_id(conn: &Connection, branch_id: &str) -> Result<Option<BranchRow>> {
        let row = conn
            .query_row(
                "SELECT id, chat_id, from_message_id, name, is_active, created_at
                 FROM branches WHERE id = ?1",
                params![branch_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All branches for a chat, newest first.
    pub fn list_by_chat(conn: &Connection, chat_id: &str) -> Result<Vec<BranchRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, from_message_id, name, is_active, created_at
             FROM branches WHERE chat_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map(params![chat_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The single active branch for a chat, if any.
    pub fn get_active(conn: &Connection, chat_id: &str) -> Result<Option<BranchRow>> {
        let row = conn
            .query_row(
                "SELECT id, chat_id, from_message_id, name, is_active, created_at
                 FROM branches WHERE chat_id = ?1 AND is_active = 1",
                params![chat_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Existence check without loading rows.
    pub fn has_any(conn: &Connection, chat_id: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM branches WHERE chat_id = ?1)",
            params![chat_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BranchRow> {
        Ok(BranchRow {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            from_message_id: row.get(2)?,
            name: row.get(3)?,
            is_active: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
