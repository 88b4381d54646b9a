//! Peer cache: remembers every peer handle the session has observed so that
//! later calls can address peers by numeric id.

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::peer::{ObservedChat, ObservedUser, PeerHandle, PeerKey};
use crate::store::{InMemoryStore, PeerStore, SqliteStore};

// ─── CacheError ───────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum CacheError {
    /// No entry under this key.
    Miss(PeerKey),
    /// The backing store failed.
    Io(io::Error),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Miss(key) => write!(f, "peer {key} not in cache"),
            Self::Io(e)     => write!(f, "peer store error: {e}"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Miss(_) => None,
        }
    }
}

impl From<io::Error> for CacheError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

impl CacheError {
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss(_))
    }
}

// ─── PeerCache ────────────────────────────────────────────────────────────────

/// Persistent `(kind, id)` → [`PeerHandle`] map. Cheap to clone.
///
/// Entries are overwritten on every observation (last observed wins) and are
/// never expired; a stale access hash only shows up as a failed call later.
#[derive(Clone)]
pub struct PeerCache {
    store: Arc<dyn PeerStore>,
}

impl PeerCache {
    pub fn new(store: Arc<dyn PeerStore>) -> Self {
        Self { store }
    }

    /// Cache backed by an SQLite database at `path`.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(Arc::new(SqliteStore::open(path)?)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    pub fn find(&self, key: PeerKey) -> Result<PeerHandle, CacheError> {
        self.store.get(key)?.ok_or(CacheError::Miss(key))
    }

    pub fn add(&self, handle: &PeerHandle) -> Result<(), CacheError> {
        self.store.put(handle)?;
        Ok(())
    }

    /// Persist every addressable peer among `chats` and `users`.
    ///
    /// Best effort: a failed write is logged and skipped. Returns the number
    /// of entries written.
    pub fn store_peers(&self, chats: &[ObservedChat], users: &[ObservedUser]) -> usize {
        let handles = chats.iter().filter_map(PeerHandle::from_chat)
            .chain(users.iter().filter_map(PeerHandle::from_user));

        let mut written = 0;
        for handle in handles {
            match self.store.put(&handle) {
                Ok(()) => written += 1,
                Err(e) => tracing::debug!("[courier-peers] skip caching {}: {e}", handle.key()),
            }
        }
        written
    }

    pub fn len(&self) -> Result<usize, CacheError> {
        Ok(self.store.len()?)
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    pub fn backend_name(&self) -> &str {
        self.store.name()
    }
}

impl fmt::Debug for PeerCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerCache {{ backend: {:?} }}", self.store.name())
    }
}
