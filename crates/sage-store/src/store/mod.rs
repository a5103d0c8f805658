//! High-level chat store facade.
//!
//! [`ChatStore`] is the only type callers interact with. It owns the
//! connection pool, runs every multi-statement operation inside a
//! transaction, enforces ownership on all access, and serializes the two
//! operations that race across statements (branch activation and chunk
//! appends) with per-key locks.

mod chat_store;
mod locks;

pub use chat_store::ChatStore;
pub use locks::ScopedLocks;
