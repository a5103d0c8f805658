//! Exclusive activation — "deactivate all, then activate one" in one place.
//!
//! Both branches and streaming sessions share the rule that at most one row
//! per chat may have `is_active = 1` (for branches this is a hard invariant,
//! for streaming sessions it is supersession of stale streams). The two
//! phases must run inside the caller's transaction; the facade additionally
//! serializes them behind a per-chat lock.

use rusqlite::{Connection, params};

use crate::errors::Result;

/// Entity family participating in exclusive activation, scoped by chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivationScope {
    /// The `branches` table.
    Branches,
    /// The `streaming_sessions` table.
    StreamingSessions,
}

impl ActivationScope {
    fn table(self) -> &'static str {
        match self {
            Self::Branches => "branches",
            Self::StreamingSessions => "streaming_sessions",
        }
    }
}

/// Exclusive-activation helper — stateless, every method takes `&Connection`.
pub struct ActivationRepo;

impl ActivationRepo {
    /// Clear `is_active` on every row of the scope's table for the chat.
    ///
    /// Returns the number of rows deactivated.
    pub fn deactivate_all(
        conn: &Connection,
        scope: ActivationScope,
        chat_id: &str,
    ) -> Result<usize> {
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET is_active = 0 WHERE chat_id = ?1 AND is_active = 1",
                scope.table()
            ),
            params![chat_id],
        )?;
        Ok(changed)
    }

    /// Set `is_active` on exactly one row. Returns `false` if the row is missing.
    ///
    /// Callers must have deactivated the scope first (within the same
    /// transaction) or the partial unique index on `branches` will reject
    /// the write.
    pub fn activate_one(conn: &Connection, scope: ActivationScope, id: &str) -> Result<bool> {
        let changed = conn.execute(
            &format!("UPDATE {} SET is_active = 1 WHERE id = ?1", scope.table()),
            params![id],
        )?;
        Ok(changed > 0)
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

        conn.execute(
            "INSERT INTO chats (id, owner_id, model, created_at, updated_at)
             VALUES ('chat_1', 'usr_1', 'sage-tutor-1', datetime('now'), datetime('now'))",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO messages (id, chat_id, role, content, created_at, sequence)
             VALUES ('msg_1', 'chat_1', 'user', 'hi', datetime('now'), 1)",
            [],
        )
        .unwrap();
        conn
    }

    fn insert_branch(conn: &Connection, id: &str, active: bool) {
        conn.execute(
            "INSERT INTO branches (id, chat_id, from_message_id, name, is_active, created_at)
             VALUES (?1, 'chat_1', 'msg_1', ?1, ?2, datetime('now'))",
            params![id, active],
        )
        .unwrap();
    }

    fn active_branch_count(conn: &Connection) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM branches WHERE chat_id = 'chat_1' AND is_active = 1",
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn deactivate_all_clears_active_rows() {
        let conn = setup();
        insert_branch(&conn, "br_1", true);
        insert_branch(&conn, "br_2", false);

        let changed =
            ActivationRepo::deactivate_all(&conn, ActivationScope::Branches, "chat_1").unwrap();
        assert_eq!(changed, 1);
        assert_eq!(active_branch_count(&conn), 0);
    }

    #[test]
    fn activate_one_sets_single_row() {
        let conn = setup();
        insert_branch(&conn, "br_1", false);
        insert_branch(&conn, "br_2", false);

        assert!(ActivationRepo::activate_one(&conn, ActivationScope::Branches, "br_2").unwrap());
        assert_eq!(active_branch_count(&conn), 1);

        let active: String = conn
            .query_row(
                "SELECT id FROM branches WHERE chat_id = 'chat_1' AND is_active = 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(active, "br_2");
    }

    #[test]
    fn activate_one_missing_row_returns_false() {
        let conn = setup();
        assert!(
            !ActivationRepo::activate_one(&conn, ActivationScope::Branches, "br_none").unwrap()
        );
    }

    #[test]
    fn switch_sequence_keeps_invariant() {
        let conn = setup();
        insert_branch(&conn, "br_1", true);
        insert_branch(&conn, "br_2", false);

        ActivationRepo::deactivate_all(&conn, ActivationScope::Branches, "chat_1").unwrap();
        ActivationRepo::activate_one(&conn, ActivationScope::Branches, "br_2").unwrap();
        assert_eq!(active_branch_count(&conn), 1);
    }

    #[test]
    fn scopes_are_independent() {
        let conn = setup();
        insert_branch(&conn, "br_1", true);
        conn.execute(
            "INSERT INTO streaming_sessions (id, chat_id, message_id, owner_id, created_at)
             VALUES ('ss_1', 'chat_1', 'msg_1', 'usr_1', datetime('now'))",
            [],
        )
        .unwrap();

        ActivationRepo::deactivate_all(&conn, ActivationScope::StreamingSessions, "chat_1")
            .unwrap();

        // Branch activation untouched by the streaming-session scope
        assert_eq!(active_branch_count(&conn), 1);
        let ss_active: bool = conn
            .query_row(
                "SELECT is_active FROM streaming_sessions WHERE id = 'ss_1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(!ss_active);
    }
}
