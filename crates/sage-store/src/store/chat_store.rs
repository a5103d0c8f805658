//! Transactional chat store facade.
//!
//! [`ChatStore`] owns the connection pool and exposes the full chat surface:
//! chat lifecycle, conversation branches, thread reconstruction, message
//! writes, short-lived streaming sessions, and resumable generation jobs.
//!
//! # Access control
//!
//! Every operation takes the calling user. Writes on entities the caller does
//! not own fail with [`StoreError::Unauthorized`]; reads degrade instead —
//! a chat the caller cannot see behaves as if it did not exist (`None` or an
//! empty list), so probing for IDs reveals nothing.
//!
//! # Concurrency
//!
//! Single statements are already serialized by `SQLite`. The two sequences
//! that span statements get a per-key mutex on top: branch and session
//! activation (per chat) and streaming chunk appends (per session). The
//! partial unique index on `branches(chat_id) WHERE is_active = 1` backstops
//! the invariant at the storage layer.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, instrument};
use uuid::Uuid;

use sage_core::{
    BranchId, ChatId, MessageId, MessageRole, ResumableStreamId, StreamingSessionId, ThreadRef,
    UserId,
};

use crate::errors::{Result, StoreError};
use crate::sqlite::connection::{self, ConnectionConfig, ConnectionPool, PooledConnection};
use crate::sqlite::migrations::run_migrations;
use crate::sqlite::repositories::activation::{ActivationRepo, ActivationScope};
use crate::sqlite::repositories::branch::{BranchRepo, CreateBranchOptions};
use crate::sqlite::repositories::chat::{ChatRepo, CreateChatOptions};
use crate::sqlite::repositories::message::{CreateMessageOptions, MessageRepo};
use crate::sqlite::repositories::resumable_stream::{CreateStreamOptions, ResumableStreamRepo};
use crate::sqlite::repositories::streaming_session::StreamingSessionRepo;
use crate::sqlite::row_types::{
    BranchRow, ChatRow, MessageRow, ResumableStreamRow, StreamingSessionRow,
};
use crate::store::locks::ScopedLocks;

/// High-level, thread-safe store for chats, branches, messages, and streams.
pub struct ChatStore {
    pool: ConnectionPool,
    chat_locks: ScopedLocks,
    session_locks: ScopedLocks,
}

impl ChatStore {
    /// Wrap an existing pool, running any pending schema migrations.
    pub fn new(pool: ConnectionPool) -> Result<Self> {
        {
            let conn = pool.get()?;
            let _ = run_migrations(&conn)?;
        }
        Ok(Self {
            pool,
            chat_locks: ScopedLocks::new(),
            session_locks: ScopedLocks::new(),
        })
    }

    /// Open an in-memory store (shared across the pool's connections).
    pub fn in_memory() -> Result<Self> {
        Self::new(connection::new_in_memory(&ConnectionConfig::default())?)
    }

    /// Open (or create) a file-backed store.
    pub fn open(path: &str) -> Result<Self> {
        Self::new(connection::new_file(path, &ConnectionConfig::default())?)
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Begin a write transaction with `BEGIN IMMEDIATE`.
    ///
    /// A deferred transaction that reads first and writes later cannot
    /// upgrade its lock once another writer has committed underneath it —
    /// under WAL that upgrade fails with `SQLITE_BUSY` immediately, skipping
    /// the busy handler. Taking the write lock up front makes concurrent
    /// writers queue on the 30 s busy timeout instead.
    fn write_tx(conn: &Connection) -> Result<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            conn,
            TransactionBehavior::Immediate,
        )?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Access checks
    // ─────────────────────────────────────────────────────────────────────────

    fn require_chat(conn: &Connection, chat_id: &str) -> Result<ChatRow> {
        ChatRepo::get_by_id(conn, chat_id)?
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_string()))
    }

    /// The chat, if it exists and the caller may read it (owner or shared).
    fn readable_chat(conn: &Connection, caller: &UserId, chat_id: &str) -> Result<Option<ChatRow>> {
        Ok(ChatRepo::get_by_id(conn, chat_id)?
            .filter(|chat| chat.owner_id == caller.as_str() || chat.is_shared))
    }

    /// The chat, failing loudly unless the caller owns it.
    fn require_owned(conn: &Connection, caller: &UserId, chat_id: &str) -> Result<ChatRow> {
        let chat = Self::require_chat(conn, chat_id)?;
        if chat.owner_id != caller.as_str() {
            return Err(StoreError::Unauthorized(format!(
                "user {caller} does not own chat {chat_id}"
            )));
        }
        Ok(chat)
    }

    /// The chat, failing loudly unless the caller may write messages to it
    /// (owner, or anyone while the chat is shared).
    fn require_writable(conn: &Connection, caller: &UserId, chat_id: &str) -> Result<ChatRow> {
        let chat = Self::require_chat(conn, chat_id)?;
        if chat.owner_id != caller.as_str() && !chat.is_shared {
            return Err(StoreError::Unauthorized(format!(
                "user {caller} cannot write to chat {chat_id}"
            )));
        }
        Ok(chat)
    }

    /// The message together with its chat row, owner-gated.
    fn require_message_owned(
        conn: &Connection,
        caller: &UserId,
        message_id: &str,
    ) -> Result<MessageRow> {
        let msg = MessageRepo::get_by_id(conn, message_id)?
            .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))?;
        let _ = Self::require_owned(conn, caller, &msg.chat_id)?;
        Ok(msg)
    }

    /// The resumable stream, owner-gated.
    fn require_stream_owned(
        conn: &Connection,
        caller: &UserId,
        stream_id: &str,
    ) -> Result<ResumableStreamRow> {
        let stream = ResumableStreamRepo::get_by_id(conn, stream_id)?
            .ok_or_else(|| StoreError::StreamNotFound(stream_id.to_string()))?;
        if stream.owner_id != caller.as_str() {
            return Err(StoreError::Unauthorized(format!(
                "user {caller} does not own stream {stream_id}"
            )));
        }
        Ok(stream)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Chats
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new chat owned by `caller`.
    #[instrument(skip_all, fields(owner = %caller, model = %model))]
    pub fn create_chat(
        &self,
        caller: &UserId,
        model: &str,
        title: Option<&str>,
        system_prompt: Option<&str>,
    ) -> Result<ChatRow> {
        let conn = self.conn()?;
        let chat = ChatRepo::create(
            &conn,
            &CreateChatOptions {
                owner_id: caller.as_str(),
                model,
                title,
                system_prompt,
            },
        )?;
        debug!(chat_id = %chat.id, "chat created");
        Ok(chat)
    }

    /// Get a chat the caller may read, or `None`.
    pub fn get_chat(&self, caller: &UserId, chat_id: &ChatId) -> Result<Option<ChatRow>> {
        let conn = self.conn()?;
        Self::readable_chat(&conn, caller, chat_id)
    }

    /// All chats owned by the caller, pinned first, most recently updated next.
    pub fn list_chats(&self, caller: &UserId) -> Result<Vec<ChatRow>> {
        let conn = self.conn()?;
        ChatRepo::list_by_owner(&conn, caller)
    }

    /// Rename a chat. Owner only.
    pub fn rename_chat(&self, caller: &UserId, chat_id: &ChatId, title: &str) -> Result<()> {
        let conn = self.conn()?;
        let _ = Self::require_owned(&conn, caller, chat_id)?;
        let _ = ChatRepo::update_title(&conn, chat_id, Some(title))?;
        Ok(())
    }

    /// Toggle sharing. Enabling mints a fresh share token and returns it;
    /// disabling clears the token and returns `None`.
    #[instrument(skip_all, fields(chat_id = %chat_id, shared = shared))]
    pub fn set_shared(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        shared: bool,
    ) -> Result<Option<String>> {
        let conn = self.conn()?;
        let _ = Self::require_owned(&conn, caller, chat_id)?;
        if shared {
            let token = format!("sh_{}", Uuid::now_v7().simple());
            let _ = ChatRepo::set_shared(&conn, chat_id, Some(&token))?;
            Ok(Some(token))
        } else {
            let _ = ChatRepo::set_shared(&conn, chat_id, None)?;
            Ok(None)
        }
    }

    /// Pin or unpin a chat in the caller's list. Owner only.
    pub fn set_pinned(&self, caller: &UserId, chat_id: &ChatId, pinned: bool) -> Result<()> {
        let conn = self.conn()?;
        let _ = Self::require_owned(&conn, caller, chat_id)?;
        let _ = ChatRepo::set_pinned(&conn, chat_id, pinned)?;
        Ok(())
    }

    /// Delete a chat and everything under it (messages, branches, sessions,
    /// streams all cascade). Owner only.
    #[instrument(skip_all, fields(chat_id = %chat_id))]
    pub fn delete_chat(&self, caller: &UserId, chat_id: &ChatId) -> Result<()> {
        let conn = self.conn()?;
        let _ = Self::require_owned(&conn, caller, chat_id)?;
        let _ = ChatRepo::delete(&conn, chat_id)?;
        debug!("chat deleted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Branches
    // ─────────────────────────────────────────────────────────────────────────

    /// Fork a new branch from a main-thread message and make it active.
    ///
    /// The fork point must be a main-thread message of this chat; branches of
    /// branches are rejected. Any previously active branch is deactivated in
    /// the same transaction.
    #[instrument(skip_all, fields(chat_id = %chat_id, from = %from_message_id))]
    pub fn create_branch(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        from_message_id: &MessageId,
        name: Option<&str>,
    ) -> Result<BranchRow> {
        let lock = self.chat_locks.acquire(chat_id);
        let _guard = lock.lock();

        let conn = self.conn()?;
        let tx = Self::write_tx(&conn)?;
        let _ = Self::require_owned(&tx, caller, chat_id)?;

        let fork = MessageRepo::get_by_id(&tx, from_message_id)?
            .ok_or_else(|| StoreError::MessageNotFound(from_message_id.to_string()))?;
        if fork.chat_id != chat_id.as_str() {
            return Err(StoreError::InvalidArgument(
                "fork point belongs to another chat".into(),
            ));
        }
        if fork.branch_id.is_some() {
            return Err(StoreError::InvalidArgument(
                "fork point must be a main-thread message".into(),
            ));
        }

        let _ = ActivationRepo::deactivate_all(&tx, ActivationScope::Branches, chat_id)?;
        let branch = BranchRepo::create(
            &tx,
            &CreateBranchOptions {
                chat_id: chat_id.as_str(),
                from_message_id: from_message_id.as_str(),
                name: name.unwrap_or("New branch"),
                is_active: true,
            },
        )?;
        let _ = ChatRepo::touch(&tx, chat_id)?;
        tx.commit()?;

        debug!(branch_id = %branch.id, "branch created and activated");
        Ok(branch)
    }

    /// Make `target` the chat's active branch, or return to the main thread
    /// with `None`. At most one branch per chat ends up active.
    #[instrument(skip_all, fields(chat_id = %chat_id))]
    pub fn switch_active_branch(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        target: Option<&BranchId>,
    ) -> Result<Option<BranchRow>> {
        let lock = self.chat_locks.acquire(chat_id);
        let _guard = lock.lock();

        let conn = self.conn()?;
        let tx = Self::write_tx(&conn)?;
        let _ = Self::require_owned(&tx, caller, chat_id)?;

        let switched = match target {
            Some(branch_id) => {
                let branch = BranchRepo::get_by_id(&tx, branch_id)?
                    .ok_or_else(|| StoreError::BranchNotFound(branch_id.to_string()))?;
                if branch.chat_id != chat_id.as_str() {
                    return Err(StoreError::BranchNotFound(branch_id.to_string()));
                }
                let _ = ActivationRepo::deactivate_all(&tx, ActivationScope::Branches, chat_id)?;
                let _ = ActivationRepo::activate_one(&tx, ActivationScope::Branches, branch_id)?;
                Some(BranchRow {
                    is_active: true,
                    ..branch
                })
            }
            None => {
                let _ = ActivationRepo::deactivate_all(&tx, ActivationScope::Branches, chat_id)?;
                None
            }
        };
        let _ = ChatRepo::touch(&tx, chat_id)?;
        tx.commit()?;
        Ok(switched)
    }

    /// The chat's active branch, or `None` when the main thread is active
    /// (or the caller cannot read the chat).
    pub fn get_active_branch(&self, caller: &UserId, chat_id: &ChatId) -> Result<Option<BranchRow>> {
        let conn = self.conn()?;
        if Self::readable_chat(&conn, caller, chat_id)?.is_none() {
            return Ok(None);
        }
        BranchRepo::get_active(&conn, chat_id)
    }

    /// All branches of a chat, newest first. Empty when unreadable.
    pub fn list_branches(&self, caller: &UserId, chat_id: &ChatId) -> Result<Vec<BranchRow>> {
        let conn = self.conn()?;
        if Self::readable_chat(&conn, caller, chat_id)?.is_none() {
            return Ok(Vec::new());
        }
        BranchRepo::list_by_chat(&conn, chat_id)
    }

    /// Whether the chat has any branches. `false` when unreadable.
    pub fn has_branches(&self, caller: &UserId, chat_id: &ChatId) -> Result<bool> {
        let conn = self.conn()?;
        if Self::readable_chat(&conn, caller, chat_id)?.is_none() {
            return Ok(false);
        }
        BranchRepo::has_any(&conn, chat_id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Messages
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a message to the main thread or a branch.
    ///
    /// The owner may always write; others only while the chat is shared.
    /// A `ThreadRef::Branch` target must name a branch of this chat.
    #[instrument(skip_all, fields(chat_id = %chat_id, role = %role))]
    pub fn add_message(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        role: MessageRole,
        content: &str,
        parent_id: Option<&MessageId>,
        thread: &ThreadRef,
    ) -> Result<MessageRow> {
        let conn = self.conn()?;
        let tx = Self::write_tx(&conn)?;
        let _ = Self::require_writable(&tx, caller, chat_id)?;

        let branch_id: Option<&str> = match thread {
            ThreadRef::Main => None,
            ThreadRef::Branch(branch_id) => {
                let branch = BranchRepo::get_by_id(&tx, branch_id)?
                    .ok_or_else(|| StoreError::BranchNotFound(branch_id.to_string()))?;
                if branch.chat_id != chat_id.as_str() {
                    return Err(StoreError::BranchNotFound(branch_id.to_string()));
                }
                Some(branch_id.as_str())
            }
        };
        if let Some(parent_id) = parent_id {
            let parent = MessageRepo::get_by_id(&tx, parent_id)?
                .ok_or_else(|| StoreError::MessageNotFound(parent_id.to_string()))?;
            if parent.chat_id != chat_id.as_str() {
                return Err(StoreError::InvalidArgument(
                    "parent message belongs to another chat".into(),
                ));
            }
        }

        let msg = MessageRepo::create(
            &tx,
            &CreateMessageOptions {
                chat_id: chat_id.as_str(),
                role: role.as_str(),
                content,
                parent_id: parent_id.map(MessageId::as_str),
                branch_id,
            },
        )?;
        let _ = ChatRepo::touch(&tx, chat_id)?;
        tx.commit()?;
        Ok(msg)
    }

    /// Replace a message's content. Chat owner only.
    pub fn update_message_content(
        &self,
        caller: &UserId,
        message_id: &MessageId,
        content: &str,
    ) -> Result<()> {
        let conn = self.conn()?;
        let tx = Self::write_tx(&conn)?;
        let msg = Self::require_message_owned(&tx, caller, message_id)?;
        let _ = MessageRepo::update_content(&tx, message_id, content)?;
        let _ = ChatRepo::touch(&tx, &msg.chat_id)?;
        tx.commit()?;
        Ok(())
    }

    /// Soft-delete a message: it disappears from every thread view but the
    /// row survives. Chat owner only.
    pub fn delete_message(&self, caller: &UserId, message_id: &MessageId) -> Result<()> {
        let conn = self.conn()?;
        let tx = Self::write_tx(&conn)?;
        let msg = Self::require_message_owned(&tx, caller, message_id)?;
        let _ = MessageRepo::soft_delete(&tx, message_id)?;
        let _ = ChatRepo::touch(&tx, &msg.chat_id)?;
        tx.commit()?;
        Ok(())
    }

    /// Reconstruct a thread view, ascending on `(created_at, sequence)`.
    ///
    /// `ThreadRef::Main` is the main thread alone. `ThreadRef::Branch` is the
    /// main-thread prefix up to and including the fork point, followed by the
    /// branch's own messages. Unreadable chats and dangling branch references
    /// yield an empty list.
    pub fn get_thread(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        thread: &ThreadRef,
    ) -> Result<Vec<MessageRow>> {
        let conn = self.conn()?;
        if Self::readable_chat(&conn, caller, chat_id)?.is_none() {
            return Ok(Vec::new());
        }

        match thread {
            ThreadRef::Main => MessageRepo::get_main_thread(&conn, chat_id),
            ThreadRef::Branch(branch_id) => {
                let Some(branch) = BranchRepo::get_by_id(&conn, branch_id)? else {
                    return Ok(Vec::new());
                };
                if branch.chat_id != chat_id.as_str() {
                    return Ok(Vec::new());
                }
                let Some(fork) = MessageRepo::get_by_id(&conn, &branch.from_message_id)? else {
                    return Ok(Vec::new());
                };
                let mut thread = MessageRepo::get_main_thread_until(
                    &conn,
                    chat_id,
                    &fork.created_at,
                    fork.sequence,
                )?;
                thread.extend(MessageRepo::get_branch_messages(&conn, chat_id, &branch.id)?);
                Ok(thread)
            }
        }
    }

    /// Most recent message in the chat across all threads, or `None`.
    pub fn get_last_message(&self, caller: &UserId, chat_id: &ChatId) -> Result<Option<MessageRow>> {
        let conn = self.conn()?;
        if Self::readable_chat(&conn, caller, chat_id)?.is_none() {
            return Ok(None);
        }
        MessageRepo::get_last(&conn, chat_id)
    }

    /// Whether any reply to `message_id` has finished downstream processing.
    /// `false` for unknown messages or unreadable chats.
    pub fn get_processing_status(&self, caller: &UserId, message_id: &MessageId) -> Result<bool> {
        let conn = self.conn()?;
        let Some(msg) = MessageRepo::get_by_id(&conn, message_id)? else {
            return Ok(false);
        };
        if Self::readable_chat(&conn, caller, &msg.chat_id)?.is_none() {
            return Ok(false);
        }
        MessageRepo::has_complete_child(&conn, message_id)
    }

    /// Mark a message's downstream processing as finished. Chat owner only.
    pub fn signal_processing_complete(
        &self,
        caller: &UserId,
        message_id: &MessageId,
    ) -> Result<()> {
        let conn = self.conn()?;
        let _ = Self::require_message_owned(&conn, caller, message_id)?;
        let _ = MessageRepo::set_processing_complete(&conn, message_id)?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Streaming sessions
    // ─────────────────────────────────────────────────────────────────────────

    /// Open a streaming session targeting a message, superseding any session
    /// already active for the chat. Owner only.
    #[instrument(skip_all, fields(chat_id = %chat_id, message_id = %message_id))]
    pub fn open_streaming_session(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        message_id: &MessageId,
    ) -> Result<StreamingSessionRow> {
        let lock = self.chat_locks.acquire(chat_id);
        let _guard = lock.lock();

        let conn = self.conn()?;
        let tx = Self::write_tx(&conn)?;
        let _ = Self::require_owned(&tx, caller, chat_id)?;
        let msg = MessageRepo::get_by_id(&tx, message_id)?
            .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))?;
        if msg.chat_id != chat_id.as_str() {
            return Err(StoreError::InvalidArgument(
                "target message belongs to another chat".into(),
            ));
        }

        let superseded =
            ActivationRepo::deactivate_all(&tx, ActivationScope::StreamingSessions, chat_id)?;
        let session = StreamingSessionRepo::create(&tx, chat_id, message_id, caller)?;
        tx.commit()?;

        debug!(session_id = %session.id, superseded, "streaming session opened");
        Ok(session)
    }

    /// Append a chunk to a session's target message.
    ///
    /// Chunks for unknown or superseded sessions are silently discarded —
    /// a late chunk from a replaced stream must not corrupt the message of
    /// its successor. Appends for the same session are serialized, so
    /// `content` always equals the chunks in arrival order.
    pub fn append_chunk(
        &self,
        caller: &UserId,
        session_id: &StreamingSessionId,
        chunk: &str,
        is_complete: bool,
    ) -> Result<()> {
        let lock = self.session_locks.acquire(session_id);
        let _guard = lock.lock();

        let conn = self.conn()?;
        let tx = Self::write_tx(&conn)?;
        let Some(session) = StreamingSessionRepo::get_by_id(&tx, session_id)? else {
            debug!(%session_id, "chunk for unknown session dropped");
            return Ok(());
        };
        if session.owner_id != caller.as_str() {
            return Err(StoreError::Unauthorized(format!(
                "user {caller} does not own session {session_id}"
            )));
        }
        if !session.is_active {
            debug!(%session_id, "chunk for superseded session dropped");
            return Ok(());
        }

        let _ = MessageRepo::append_content(&tx, &session.message_id, chunk)?;
        if is_complete {
            let _ = StreamingSessionRepo::complete(&tx, session_id, chunk)?;
            let _ = ChatRepo::touch(&tx, &session.chat_id)?;
        } else {
            let _ = StreamingSessionRepo::set_last_chunk(&tx, session_id, chunk)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Close a session, recording the final chunk without touching message
    /// content (the content already arrived through [`Self::append_chunk`]).
    pub fn complete_streaming_session(
        &self,
        caller: &UserId,
        session_id: &StreamingSessionId,
        final_chunk: &str,
    ) -> Result<StreamingSessionRow> {
        let lock = self.session_locks.acquire(session_id);
        let _guard = lock.lock();

        let conn = self.conn()?;
        let session = StreamingSessionRepo::get_by_id(&conn, session_id)?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        if session.owner_id != caller.as_str() {
            return Err(StoreError::Unauthorized(format!(
                "user {caller} does not own session {session_id}"
            )));
        }
        let _ = StreamingSessionRepo::complete(&conn, session_id, final_chunk)?;
        Ok(StreamingSessionRow {
            is_active: false,
            last_chunk: Some(final_chunk.to_string()),
            ..session
        })
    }

    /// The caller's currently active session for a chat, or `None`.
    pub fn get_active_session(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
    ) -> Result<Option<StreamingSessionRow>> {
        let conn = self.conn()?;
        StreamingSessionRepo::get_active_for(&conn, chat_id, caller)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resumable streams
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a resumable generation job with a full prompt snapshot, so
    /// the job can be reconstructed after a process restart. Owner only.
    #[instrument(skip_all, fields(chat_id = %chat_id, model = %model))]
    pub fn create_resumable_stream(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        message_id: &MessageId,
        model: &str,
        prompt_snapshot: &serde_json::Value,
        checkpoint: Option<&str>,
    ) -> Result<ResumableStreamRow> {
        let conn = self.conn()?;
        let tx = Self::write_tx(&conn)?;
        let _ = Self::require_owned(&tx, caller, chat_id)?;
        let msg = MessageRepo::get_by_id(&tx, message_id)?
            .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))?;
        if msg.chat_id != chat_id.as_str() {
            return Err(StoreError::InvalidArgument(
                "target message belongs to another chat".into(),
            ));
        }

        let snapshot = serde_json::to_string(prompt_snapshot)?;
        let stream = ResumableStreamRepo::create(
            &tx,
            &CreateStreamOptions {
                chat_id: chat_id.as_str(),
                message_id: message_id.as_str(),
                owner_id: caller.as_str(),
                model,
                prompt_snapshot: &snapshot,
                checkpoint,
            },
        )?;
        tx.commit()?;

        debug!(stream_id = %stream.id, "resumable stream registered");
        Ok(stream)
    }

    /// Pause a live stream. No-op once the stream has completed.
    pub fn pause_stream(
        &self,
        caller: &UserId,
        stream_id: &ResumableStreamId,
    ) -> Result<ResumableStreamRow> {
        let conn = self.conn()?;
        let _ = Self::require_stream_owned(&conn, caller, stream_id)?;
        let _ = ResumableStreamRepo::pause(&conn, stream_id)?;
        Self::reread_stream(&conn, stream_id)
    }

    /// Resume a paused stream, optionally restarting from an earlier
    /// checkpoint. No-op once the stream has completed.
    pub fn resume_stream(
        &self,
        caller: &UserId,
        stream_id: &ResumableStreamId,
        from_checkpoint: Option<&str>,
    ) -> Result<ResumableStreamRow> {
        let conn = self.conn()?;
        let _ = Self::require_stream_owned(&conn, caller, stream_id)?;
        let _ = ResumableStreamRepo::resume(&conn, stream_id, from_checkpoint)?;
        Self::reread_stream(&conn, stream_id)
    }

    /// Record a progress report. Progress never moves backward; checkpoint
    /// and token count take the reported values. Ignored after completion.
    pub fn update_stream_progress(
        &self,
        caller: &UserId,
        stream_id: &ResumableStreamId,
        progress: i64,
        checkpoint: &str,
        total_tokens: i64,
    ) -> Result<ResumableStreamRow> {
        let conn = self.conn()?;
        let _ = Self::require_stream_owned(&conn, caller, stream_id)?;
        let _ =
            ResumableStreamRepo::update_progress(&conn, stream_id, progress, checkpoint, total_tokens)?;
        Self::reread_stream(&conn, stream_id)
    }

    /// Complete a stream. Idempotent — a second completion changes nothing
    /// and the original `completed_at` survives.
    pub fn complete_stream(
        &self,
        caller: &UserId,
        stream_id: &ResumableStreamId,
    ) -> Result<ResumableStreamRow> {
        let conn = self.conn()?;
        let _ = Self::require_stream_owned(&conn, caller, stream_id)?;
        let _ = ResumableStreamRepo::complete(&conn, stream_id)?;
        Self::reread_stream(&conn, stream_id)
    }

    /// The caller's live (incomplete) streams for a chat, newest first.
    pub fn get_active_streams(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
    ) -> Result<Vec<ResumableStreamRow>> {
        let conn = self.conn()?;
        ResumableStreamRepo::get_active_by_chat(&conn, chat_id, caller)
    }

    fn reread_stream(conn: &Connection, stream_id: &str) -> Result<ResumableStreamRow> {
        ResumableStreamRepo::get_by_id(conn, stream_id)?
            .ok_or_else(|| StoreError::StreamNotFound(stream_id.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
