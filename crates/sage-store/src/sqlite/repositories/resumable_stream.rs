//! Resumable stream repository — CRUD for the `resumable_streams` table.
//!
//! A resumable stream is the durable record of a generation job: model,
//! prompt snapshot, opaque checkpoint, and progress counters. It outlives
//! any single client connection so a different process can resume the job.
//! State machine: `Active <-> Paused -> Completed` (terminal).

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::errors::Result;
use crate::sqlite::row_types::ResumableStreamRow;

/// Options for creating a new resumable stream.
pub struct CreateStreamOptions<'a> {
    /// Chat the job belongs to.
    pub chat_id: &'a str,
    /// Message the generation targets.
    pub message_id: &'a str,
    /// Owning user.
    pub owner_id: &'a str,
    /// Model the job was started with.
    pub model: &'a str,
    /// Full prompt/message list snapshot as JSON.
    pub prompt_snapshot: &'a str,
    /// Optional initial checkpoint.
    pub checkpoint: Option<&'a str>,
}

const SELECT_COLS: &str = "id, chat_id, message_id, owner_id, model, prompt_snapshot, checkpoint,
                           progress, total_tokens, is_active, is_paused, created_at,
                           last_paused_at, last_resumed_at, completed_at";

/// Resumable stream repository — stateless, every method takes `&Connection`.
pub struct ResumableStreamRepo;

impl ResumableStreamRepo {
    /// Create a new active, unpaused stream with zero progress.
    pub fn create(conn: &Connection, opts: &CreateStreamOptions<'_>) -> Result<ResumableStreamRow> {
        let id = format!("rs_{}", Uuid::now_v7());
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO resumable_streams
             (id, chat_id, message_id, owner_id, model, prompt_snapshot, checkpoint,
              progress, total_tokens, is_active, is_paused, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 0, 1, 0, ?8)",
            params![
                id,
                opts.chat_id,
                opts.message_id,
                opts.owner_id,
                opts.model,
                opts.prompt_snapshot,
                opts.checkpoint,
                now
            ],
        )?;
        Ok(ResumableStreamRow {
            id,
            chat_id: opts.chat_id.to_string(),
            message_id: opts.message_id.to_string(),
            owner_id: opts.owner_id.to_string(),
            model: opts.model.to_string(),
            prompt_snapshot: opts.prompt_snapshot.to_string(),
            checkpoint: opts.checkpoint.map(String::from),
            progress: 0,
            total_tokens: 0,
            is_active: true,
            is_paused: false,
            created_at: now,
            last_paused_at: None,
            last_resumed_at: None,
            completed_at: None,
        })
    }

    /// Get stream by ID.
    pub fn get_by_id(conn: &Connection, stream_id: &str) -> Result<Option<ResumableStreamRow>> {
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLS} FROM resumable_streams WHERE id = ?1"),
                params![stream_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Pause a stream. Paused streams stay active — they are not abandoned.
    pub fn pause(conn: &Connection, stream_id: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE resumable_streams SET is_paused = 1, last_paused_at = ?1
             WHERE id = ?2 AND completed_at IS NULL",
            params![now, stream_id],
        )?;
        Ok(changed > 0)
    }

    /// Resume a stream, optionally overriding the stored checkpoint.
    ///
    /// With `checkpoint = None` the stored checkpoint is left untouched, so a
    /// plain pause/resume round-trip restores the exact pre-pause state.
    pub fn resume(conn: &Connection, stream_id: &str, checkpoint: Option<&str>) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = match checkpoint {
            Some(cp) => conn.execute(
                "UPDATE resumable_streams
                 SET is_paused = 0, is_active = 1, last_resumed_at = ?1, checkpoint = ?2
                 WHERE id = ?3 AND completed_at IS NULL",
                params![now, cp, stream_id],
            )?,
            None => conn.execute(
                "UPDATE resumable_streams
                 SET is_paused = 0, is_active = 1, last_resumed_at = ?1
                 WHERE id = ?2 AND completed_at IS NULL",
                params![now, stream_id],
            )?,
        };
        Ok(changed > 0)
    }

    /// Record a progress report from the generation collaborator.
    ///
    /// Progress is monotonic: a stale or retried update can never move it
    /// backward. Checkpoint and token count always take the reported value.
    /// Completed streams ignore updates.
    pub fn update_progress(
        conn: &Connection,
        stream_id: &str,
        progress: i64,
        checkpoint: &str,
        total_tokens: i64,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE resumable_streams
             SET progress = MAX(progress, ?1), checkpoint = ?2, total_tokens = ?3
             WHERE id = ?4 AND completed_at IS NULL",
            params![progress.clamp(0, 100), checkpoint, total_tokens, stream_id],
        )?;
        Ok(changed > 0)
    }

    /// Mark a stream completed: full progress, inactive, unpaused.
    ///
    /// Idempotent — completing an already-completed stream changes nothing
    /// and keeps the original `completed_at`.
    pub fn complete(conn: &Connection, stream_id: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE resumable_streams
             SET progress = 100, is_active = 0, is_paused = 0, completed_at = ?1
             WHERE id = ?2 AND completed_at IS NULL",
            params![now, stream_id],
        )?;
        Ok(changed > 0)
    }

    /// All active streams for `(chat, owner)`, newest first.
    pub fn get_active_by_chat(
        conn: &Connection,
        chat_id: &str,
        owner_id: &str,
    ) -> Result<Vec<ResumableStreamRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLS} FROM resumable_streams
             WHERE chat_id = ?1 AND owner_id = ?2 AND is_active = 1
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt
            .query_map(params![chat_id, owner_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResumableStreamRow> {
        Ok(ResumableStreamRow {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            message_id: row.get(2)?,
            owner_id: row.get(3)?,
            model: row.get(4)?,
            prompt_snapshot: row.get(5)?,
            checkpoint: row.get(6)?,
            progress: row.get(7)?,
            total_tokens: row.get(8)?,
            is_active: row.get(9)?,
            is_paused: row.get(10)?,
            created_at: row.get(11)?,
            last_paused_at: row.get(12)?,
            last_resumed_at: row.get(13)?,
            completed_at: row.get(14)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
