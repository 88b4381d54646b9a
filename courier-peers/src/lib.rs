//! # courier-peers
//!
//! Peer identity model and persistent peer cache.
//!
//! Remote calls can only address a user or channel with the access hash the
//! server handed out when that peer was last seen. This crate extracts those
//! handles from observed entities and keeps them in an embedded store so they
//! survive restarts.
//!
//! ```rust,no_run
//! use courier_peers::{PeerCache, PeerKey};
//!
//! # fn f() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = PeerCache::open("peers.sqlite3")?;
//! let alice = cache.find(PeerKey::user(42))?;
//! println!("{}", alice.display_name());
//! # Ok(()) }
//! ```

#![deny(unsafe_code)]

mod cache;
pub mod peer;
pub mod store;

pub use cache::{CacheError, PeerCache};
pub use peer::{
    BasicChat, ChannelForbiddenInfo, ChannelInfo, ObservedChat, ObservedUser, PeerHandle,
    PeerKey, PeerKind, UserInfo,
};
pub use store::{InMemoryStore, PeerStore, SqliteStore};
