//! Peer resolution: `@name`, bare name or numeric id → [`PeerHandle`].
//!
//! Names go to the live directory and the result is cached. Ids are served
//! from the cache only: the access hash needed to address a user or channel
//! can only be learned by having observed the peer before.

use std::sync::Arc;

use courier_peers::{ObservedChat, ObservedUser, PeerCache, PeerHandle, PeerKey, PeerKind};
use tokio_util::sync::CancellationToken;

use crate::client::SessionClient;
use crate::errors::Error;

/// Prefix marking an identifier as a username.
pub const NAME_SIGIL: char = '@';

/// Resolves identifiers against the peer cache and the live directory.
/// Cheap to clone.
#[derive(Clone)]
pub struct Resolver {
    client: Arc<dyn SessionClient>,
    cache:  PeerCache,
    ctx:    CancellationToken,
}

impl Resolver {
    pub fn new(client: Arc<dyn SessionClient>, cache: PeerCache, ctx: CancellationToken) -> Self {
        Self { client, cache, ctx }
    }

    pub fn cache(&self) -> &PeerCache {
        &self.cache
    }

    /// Resolve `identifier`, ignoring leading and trailing whitespace (so
    /// `" 42"` is the id 42, not a name lookup):
    /// - `@name` → directory lookup;
    /// - a 64-bit integer → cache probe in `User`, `Chat`, `Channel` order;
    /// - anything else → directory lookup of the bare name.
    pub async fn resolve(&self, identifier: &str) -> Result<PeerHandle, Error> {
        let identifier = identifier.trim();
        if let Some(name) = identifier.strip_prefix(NAME_SIGIL) {
            return self.resolve_name(name).await;
        }
        match identifier.parse::<i64>() {
            Ok(id) => self.resolve_id(id),
            Err(_) => self.resolve_name(identifier).await,
        }
    }

    /// Cache-only lookup by numeric id. Never touches the network.
    pub fn resolve_id(&self, id: i64) -> Result<PeerHandle, Error> {
        for kind in PeerKind::PROBE_ORDER {
            match self.cache.find(PeerKey::new(kind, id)) {
                Ok(handle) => return Ok(handle),
                Err(e) if e.is_miss() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::NotFound { identifier: id.to_string(), source: None })
    }

    /// Live directory lookup by username, without the `@`.
    pub async fn resolve_name(&self, name: &str) -> Result<PeerHandle, Error> {
        let identifier = format!("{NAME_SIGIL}{name}");
        if name.is_empty() {
            return Err(Error::NotFound { identifier, source: None });
        }

        let resolved = match self.client.resolve_username(&self.ctx, name).await {
            Ok(r)  => r,
            Err(e) => return Err(Error::NotFound { identifier, source: Some(e) }),
        };
        self.store_peers(&resolved.chats, &resolved.users);

        if let Some(handle) = resolved.handle() {
            return Ok(handle);
        }
        // The peer itself may have come without an access hash in this
        // response but been cached from an earlier one.
        match resolved.peer {
            Some(key) => self.cache.find(key).map_err(|e| match e {
                e if e.is_miss() => Error::NotFound { identifier, source: None },
                e => e.into(),
            }),
            None => Err(Error::NotFound { identifier, source: None }),
        }
    }

    /// Record every peer observed in a remote response. Best effort; write
    /// failures are ignored.
    pub fn store_peers(&self, chats: &[ObservedChat], users: &[ObservedUser]) -> usize {
        self.cache.store_peers(chats, users)
    }
}
