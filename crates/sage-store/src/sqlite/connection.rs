//! Connection pooling for the chat database.
//!
//! The store is read-heavy (thread reconstruction, chat lists) with short
//! write bursts during streaming, so every pooled connection comes up in WAL
//! mode: readers never block the single writer, and writers queue on the
//! busy handler. Foreign keys are off by default in `SQLite` and must be
//! switched on per connection, which is why pragma setup lives in an
//! `r2d2` customizer instead of a one-time init.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::errors::{Result, StoreError};

/// Pool of `SQLite` connections sharing one database.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// A connection checked out of the pool.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pool and per-connection pragma settings.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Connections the pool may hold open at once.
    pub pool_size: u32,
    /// How long a writer waits on a locked database before giving up.
    pub busy_timeout_ms: u32,
    /// Page cache per connection, in KiB.
    pub cache_size_kib: i64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            busy_timeout_ms: 30_000,
            cache_size_kib: 4096,
        }
    }
}

impl ConnectionConfig {
    /// The pragma batch applied to each connection as it joins the pool.
    ///
    /// Negative `cache_size` means KiB rather than pages.
    fn pragma_sql(&self) -> String {
        format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = {};
             PRAGMA cache_size = -{};",
            self.busy_timeout_ms, self.cache_size_kib
        )
    }
}

#[derive(Debug)]
struct PragmaCustomizer {
    sql: String,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&self.sql)
    }
}

fn build_pool(manager: SqliteConnectionManager, config: &ConnectionConfig) -> Result<ConnectionPool> {
    let pool = Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(std::time::Duration::from_secs(5))
        .connection_customizer(Box::new(PragmaCustomizer {
            sql: config.pragma_sql(),
        }))
        .build(manager)?;
    Ok(pool)
}

/// Pool over a shared in-memory database. Data lives as long as the pool.
pub fn new_in_memory(config: &ConnectionConfig) -> Result<ConnectionPool> {
    build_pool(SqliteConnectionManager::memory(), config)
}

/// Pool over a database file, created on first open.
pub fn new_file(path: &str, config: &ConnectionConfig) -> Result<ConnectionPool> {
    build_pool(SqliteConnectionManager::file(path), config)
}

/// Read back the pragmas that correctness depends on.
pub fn verify_pragmas(conn: &Connection) -> Result<PragmaState> {
    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .map_err(StoreError::Sqlite)?;
    let foreign_keys: i32 = conn
        .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
        .map_err(StoreError::Sqlite)?;
    let busy_timeout_ms: u32 = conn
        .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
        .map_err(StoreError::Sqlite)?;
    Ok(PragmaState {
        journal_mode,
        foreign_keys_enabled: foreign_keys == 1,
        busy_timeout_ms,
    })
}

/// Snapshot of the correctness-critical pragmas on one connection.
#[derive(Debug)]
pub struct PragmaState {
    /// `wal` for files; in-memory databases report `memory`.
    pub journal_mode: String,
    /// Cascades and reference checks only hold when this is on.
    pub foreign_keys_enabled: bool,
    /// Writer wait budget before `SQLITE_BUSY` surfaces.
    pub busy_timeout_ms: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;

    #[test]
    fn file_pool_runs_wal_with_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pragmas.db");
        let pool = new_file(path.to_str().unwrap(), &ConnectionConfig::default()).unwrap();

        let state = verify_pragmas(&pool.get().unwrap()).unwrap();
        assert_eq!(state.journal_mode, "wal");
        assert!(state.foreign_keys_enabled);
        assert_eq!(state.busy_timeout_ms, 30_000);
    }

    #[test]
    fn memory_pool_reports_memory_journal() {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        let state = verify_pragmas(&pool.get().unwrap()).unwrap();
        // WAL needs a file; the important pragmas still apply
        assert_eq!(state.journal_mode, "memory");
        assert!(state.foreign_keys_enabled);
    }

    #[test]
    fn memory_pool_connections_share_one_database() {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        let writer = pool.get().unwrap();
        writer
            .execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (7);")
            .unwrap();

        let reader = pool.get().unwrap();
        let x: i64 = reader
            .query_row("SELECT x FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(x, 7);
    }

    #[test]
    fn pool_honors_size_and_timeout_overrides() {
        let config = ConnectionConfig {
            pool_size: 2,
            busy_timeout_ms: 1_500,
            ..ConnectionConfig::default()
        };
        let pool = new_in_memory(&config).unwrap();
        assert_eq!(pool.max_size(), 2);

        let state = verify_pragmas(&pool.get().unwrap()).unwrap();
        assert_eq!(state.busy_timeout_ms, 1_500);
    }

    #[test]
    fn every_pooled_connection_gets_the_pragmas() {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        let conns: Vec<_> = (0..4).map(|_| pool.get().unwrap()).collect();
        for conn in &conns {
            assert!(verify_pragmas(conn).unwrap().foreign_keys_enabled);
        }
    }
}
