//! Chat repository — CRUD for the `chats` table.
//!
//! Chats are the ownership root: every message, branch, and stream hangs off
//! a chat and is reachable only through its owner (or a share token).

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::errors::Result;
use crate::sqlite::row_types::ChatRow;

/// Options for creating a new chat.
pub struct CreateChatOptions<'a> {
    /// Owning user.
    pub owner_id: &'a str,
    /// Model ID used for generation.
    pub model: &'a str,
    /// Optional title.
    pub title: Option<&'a str>,
    /// Optional system prompt.
    pub system_prompt: Option<&'a str>,
}

/// Chat repository — stateless, every method takes `&Connection`.
pub struct ChatRepo;

impl ChatRepo {
    /// Create a new chat.
    pub fn create(conn: &Connection, opts: &CreateChatOptions<'_>) -> Result<ChatRow> {
        let id = format!("chat_{}", Uuid::now_v7());
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO chats (id, owner_id, title, model, system_prompt, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                opts.owner_id,
                opts.title,
                opts.model,
                opts.system_prompt,
                now,
                now
            ],
        )?;
        Ok(ChatRow {
            id,
            owner_id: opts.owner_id.to_string(),
            title: opts.title.map(String::from),
            model: opts.model.to_string(),
            system_prompt: opts.system_prompt.map(String::from),
            is_shared: false,
            share_token: None,
            is_pinned: false,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get chat by ID.
    pub fn get_by_id(conn: &Connection, chat_id: &str) -> Result<Option<ChatRow>> {
        let row = conn
            .query_row(
                "SELECT id, owner_id, title, model, system_prompt, is_shared, share_token,
                        is_pinned, created_at, updated_at
                 FROM chats WHERE id = ?1",
                params![chat_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// List chats for an owner, pinned first, then most recently updated.
    pub fn list_by_owner(conn: &Connection, owner_id: &str) -> Result<Vec<ChatRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, title, model, system_prompt, is_shared, share_token,
                    is_pinned, created_at, updated_at
             FROM chats WHERE owner_id = ?1
             ORDER BY is_pinned DESC, updated_at DESC",
        )?;
        let rows = stmt
            .query_map(params![owner_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Update the chat title.
    pub fn update_title(conn: &Connection, chat_id: &str, title: Option<&str>) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE chats SET title = ?1, updated_at = ?2 WHERE id = ?3",
            params![title, now, chat_id],
        )?;
        Ok(changed > 0)
    }

    /// Enable sharing with the given token, or disable it (clearing the token).
    pub fn set_shared(conn: &Connection, chat_id: &str, token: Option<&str>) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE chats SET is_shared = ?1, share_token = ?2, updated_at = ?3 WHERE id = ?4",
            params![token.is_some(), token, now, chat_id],
        )?;
        Ok(changed > 0)
    }

    /// Set or clear the pinned flag.
    pub fn set_pinned(conn: &Connection, chat_id: &str, pinned: bool) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE chats SET is_pinned = ?1, updated_at = ?2 WHERE id = ?3",
            params![pinned, now, chat_id],
        )?;
        Ok(changed > 0)
    }

    /// Bump `updated_at` to now.
    pub fn touch(conn: &Connection, chat_id: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE chats SET updated_at = ?1 WHERE id = ?2",
            params![now, chat_id],
        )?;
        Ok(changed > 0)
    }

    /// Delete a chat. Cascades to messages, branches, and streams.
    pub fn delete(conn: &Connection, chat_id: &str) -> Result<bool> {
        let changed = conn.execute("DELETE FROM chats WHERE id = ?1", params![chat_id])?;
        Ok(changed > 0)
    }

    /// Check if chat exists.
    pub fn exists(conn: &Connection, chat_id: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM chats WHERE id = ?1)",
            params![chat_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatRow> {
        Ok(ChatRow {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            title: row.get(2)?,
            model: row.get(3)?,
            system_prompt: row.get(4)?,
            is_shared: row.get(5)?,
            share_token: row.get(6)?,
            is_pinned: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::sqlite::migrations::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
            .unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn create(conn: &Connection) -> ChatRow {
        ChatRepo::create(
            conn,
            &CreateChatOptions {
                owner_id: "usr_1",
                model: "sage-tutor-1",
                title: Some("Limits and continuity"),
                system_prompt: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn create_chat() {
        let conn = setup();
        let chat = create(&conn);

        assert!(chat.id.starts_with("chat_"));
        assert_eq!(chat.owner_id, "usr_1");
        assert_eq!(chat.title.as_deref(), Some("Limits and continuity"));
        assert!(!chat.is_shared);
        assert!(!chat.is_pinned);
    }

    #[test]
    fn get_by_id() {
        let conn = setup();
        let chat = create(&conn);

        let found = ChatRepo::get_by_id(&conn, &chat.id).unwrap().unwrap();
        assert_eq!(found.id, chat.id);
        assert_eq!(found.model, "sage-tutor-1");
    }

    #[test]
    fn get_by_id_missing() {
        let conn = setup();
        assert!(ChatRepo::get_by_id(&conn, "chat_none").unwrap().is_none());
    }

    #[test]
    fn list_by_owner_pinned_first() {
        let conn = setup();
        let a = create(&conn);
        let b = create(&conn);
        ChatRepo::set_pinned(&conn, &a.id, true).unwrap();

        let chats = ChatRepo::list_by_owner(&conn, "usr_1").unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].id, a.id);
        assert_eq!(chats[1].id, b.id);
    }

    #[test]
    fn list_by_owner_excludes_others() {
        let conn = setup();
        create(&conn);

        let chats = ChatRepo::list_by_owner(&conn, "usr_2").unwrap();
        assert!(chats.is_empty());
    }

    #[test]
    fn update_title() {
        let conn = setup();
        let chat = create(&conn);

        ChatRepo::update_title(&conn, &chat.id, Some("Renamed")).unwrap();
        let found = ChatRepo::get_by_id(&conn, &chat.id).unwrap().unwrap();
        assert_eq!(found.title.as_deref(), Some("Renamed"));
    }

    #[test]
    fn set_shared_roundtrip() {
        let conn = setup();
        let chat = create(&conn);

        ChatRepo::set_shared(&conn, &chat.id, Some("tok_abc")).unwrap();
        let shared = ChatRepo::get_by_id(&conn, &chat.id).unwrap().unwrap();
        assert!(shared.is_shared);
        assert_eq!(shared.share_token.as_deref(), Some("tok_abc"));

        ChatRepo::set_shared(&conn, &chat.id, None).unwrap();
        let unshared = ChatRepo::get_by_id(&conn, &chat.id).unwrap().unwrap();
        assert!(!unshared.is_shared);
        assert!(unshared.share_token.is_none());
    }

    #[test]
    fn delete_chat() {
        let conn = setup();
        let chat = create(&conn);

        assert!(ChatRepo::delete(&conn, &chat.id).unwrap());
        assert!(ChatRepo::get_by_id(&conn, &chat.id).unwrap().is_none());
    }

    #[test]
    fn exists_chat() {
        let conn = setup();
        let chat = create(&conn);

        assert!(ChatRepo::exists(&conn, &chat.id).unwrap());
        assert!(!ChatRepo::exists(&conn, "chat_none").unwrap());
    }
}
