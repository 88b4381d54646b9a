//! Pluggable peer storage backend.
//!
//! The [`PeerStore`] trait abstracts over where observed peer handles are
//! persisted, so the cache can sit on SQLite in production and on a plain map
//! in tests.
//!
//! Two built-in backends are provided:
//! * [`SqliteStore`]: embedded SQLite database (default, survives restarts).
//! * [`InMemoryStore`]: ephemeral, nothing touches disk.
//!
//! Both store the handle JSON-encoded under its `(kind, id)` key.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension, params};

use crate::peer::{PeerHandle, PeerKey};

// ─── Trait ────────────────────────────────────────────────────────────────────

/// An abstraction over where and how peer handles are persisted.
///
/// `get` and `put` are independent atomic operations; there are no
/// cross-call transactions.
pub trait PeerStore: Send + Sync {
    /// Fetch the handle stored under `key`, or `None` if there is none.
    fn get(&self, key: PeerKey) -> io::Result<Option<PeerHandle>>;

    /// Insert or overwrite the entry for `handle.key()`.
    fn put(&self, handle: &PeerHandle) -> io::Result<()>;

    /// Number of stored entries.
    fn len(&self) -> io::Result<usize>;

    /// Human-readable name of this backend (for log messages).
    fn name(&self) -> &str;
}

pub(crate) fn encode(handle: &PeerHandle) -> io::Result<String> {
    serde_json::to_string(handle).map_err(io::Error::other)
}

pub(crate) fn decode(raw: &str) -> io::Result<PeerHandle> {
    serde_json::from_str(raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── SqliteStore ──────────────────────────────────────────────────────────────

/// SQLite-backed peer store.
///
/// Creates the `peers` table if it does not exist.
pub struct SqliteStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// The schema is initialised immediately so errors surface at startup
    /// rather than on the first lookup.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(io::Error::other)?;
        Self::init(conn, Some(path))
    }

    /// A private, non-persistent database.
    pub fn open_in_memory() -> io::Result<Self> {
        let conn = Connection::open_in_memory().map_err(io::Error::other)?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> io::Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS peers (
                kind  INTEGER NOT NULL,
                id    INTEGER NOT NULL,
                value TEXT    NOT NULL,
                PRIMARY KEY (kind, id)
            );",
        ).map_err(io::Error::other)?;
        Ok(Self { path, conn: Mutex::new(conn) })
    }

    /// Location of the database file, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl PeerStore for SqliteStore {
    fn get(&self, key: PeerKey) -> io::Result<Option<PeerHandle>> {
        let conn = lock(&self.conn);
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM peers WHERE kind = ?1 AND id = ?2",
                params![key.kind.code(), key.id],
                |row| row.get(0),
            )
            .optional()
            .map_err(io::Error::other)?;
        raw.as_deref().map(decode).transpose()
    }

    fn put(&self, handle: &PeerHandle) -> io::Result<()> {
        let value = encode(handle)?;
        let conn  = lock(&self.conn);
        conn.execute(
            "INSERT OR REPLACE INTO peers (kind, id, value) VALUES (?1, ?2, ?3)",
            params![handle.kind.code(), handle.id, value],
        ).map_err(io::Error::other)?;
        Ok(())
    }

    fn len(&self) -> io::Result<usize> {
        let conn = lock(&self.conn);
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM peers", [], |row| row.get(0))
            .map_err(io::Error::other)?;
        Ok(n as usize)
    }

    fn name(&self) -> &str { "sqlite" }
}

// ─── InMemoryStore ────────────────────────────────────────────────────────────

/// An ephemeral peer store that keeps nothing on disk.
///
/// Useful for testing or for sessions that should always start cold.
#[derive(Default)]
pub struct InMemoryStore {
    data: Mutex<HashMap<PeerKey, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PeerStore for InMemoryStore {
    fn get(&self, key: PeerKey) -> io::Result<Option<PeerHandle>> {
        let data = lock(&self.data);
        data.get(&key).map(|raw| decode(raw)).transpose()
    }

    fn put(&self, handle: &PeerHandle) -> io::Result<()> {
        let value = encode(handle)?;
        lock(&self.data).insert(handle.key(), value);
        Ok(())
    }

    fn len(&self) -> io::Result<usize> {
        Ok(lock(&self.data).len())
    }

    fn name(&self) -> &str { "in-memory" }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
