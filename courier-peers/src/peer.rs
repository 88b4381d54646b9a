//! Peer identity model: kinds, cache keys, handles and the observed entities
//! they are extracted from.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── PeerKind ─────────────────────────────────────────────────────────────────

/// The three addressable peer families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerKind {
    /// An individual account.
    User,
    /// A basic group.
    Chat,
    /// A broadcast channel or supergroup.
    Channel,
}

impl PeerKind {
    /// Order in which a bare numeric id is probed against the cache.
    pub const PROBE_ORDER: [PeerKind; 3] = [PeerKind::User, PeerKind::Chat, PeerKind::Channel];

    /// Stable numeric code used as the storage key column.
    pub fn code(self) -> i64 {
        match self {
            Self::User    => 0,
            Self::Chat    => 1,
            Self::Channel => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::User),
            1 => Some(Self::Chat),
            2 => Some(Self::Channel),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User    => "user",
            Self::Chat    => "chat",
            Self::Channel => "channel",
        }
    }
}

impl fmt::Display for PeerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── PeerKey ──────────────────────────────────────────────────────────────────

/// Cache key. The numeric id alone is not unique across kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerKey {
    pub kind: PeerKind,
    pub id:   i64,
}

impl PeerKey {
    pub fn new(kind: PeerKind, id: i64) -> Self {
        Self { kind, id }
    }

    pub fn user(id: i64) -> Self { Self::new(PeerKind::User, id) }

    pub fn chat(id: i64) -> Self { Self::new(PeerKind::Chat, id) }

    pub fn channel(id: i64) -> Self { Self::new(PeerKind::Channel, id) }
}

impl fmt::Display for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

// ─── PeerHandle ───────────────────────────────────────────────────────────────

/// Everything needed to address a peer in a remote call.
///
/// Basic chats carry an `access_hash` of `0`; users and channels carry the
/// hash the server handed out when the peer was last observed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerHandle {
    pub kind:        PeerKind,
    pub id:          i64,
    pub access_hash: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username:    Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title:       Option<String>,
}

impl PeerHandle {
    pub fn new(kind: PeerKind, id: i64, access_hash: i64) -> Self {
        Self { kind, id, access_hash, username: None, title: None }
    }

    pub fn user(id: i64, access_hash: i64) -> Self { Self::new(PeerKind::User, id, access_hash) }

    pub fn chat(id: i64) -> Self { Self::new(PeerKind::Chat, id, 0) }

    pub fn channel(id: i64, access_hash: i64) -> Self { Self::new(PeerKind::Channel, id, access_hash) }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username.filter(|u| !u.is_empty());
        self
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title.filter(|t| !t.is_empty());
        self
    }

    pub fn key(&self) -> PeerKey {
        PeerKey::new(self.kind, self.id)
    }

    /// `@username` when known, otherwise the title, otherwise the key.
    pub fn display_name(&self) -> String {
        match (&self.username, &self.title) {
            (Some(u), _)    => format!("@{u}"),
            (None, Some(t)) => t.clone(),
            (None, None)    => self.key().to_string(),
        }
    }

    /// Extract a handle from an observed user.
    ///
    /// Users seen without an access hash (e.g. "min" users in group updates)
    /// are skipped so they never overwrite a usable cache entry.
    pub fn from_user(user: &ObservedUser) -> Option<Self> {
        let ObservedUser::User(u) = user else { return None };
        let hash = u.access_hash?;
        Some(
            Self::user(u.id, hash)
                .with_username(u.username.clone())
                .with_title(Some(u.full_name())),
        )
    }

    /// Extract a handle from an observed chat or channel.
    pub fn from_chat(chat: &ObservedChat) -> Option<Self> {
        match chat {
            ObservedChat::Chat(c) | ObservedChat::Forbidden(c) => {
                Some(Self::chat(c.id).with_title(Some(c.title.clone())))
            }
            ObservedChat::Channel(c) => {
                let hash = c.access_hash?;
                Some(
                    Self::channel(c.id, hash)
                        .with_username(c.username.clone())
                        .with_title(Some(c.title.clone())),
                )
            }
            ObservedChat::ChannelForbidden(c) => {
                Some(Self::channel(c.id, c.access_hash).with_title(Some(c.title.clone())))
            }
            ObservedChat::Empty(_) => None,
        }
    }
}

// ─── Observed entities ────────────────────────────────────────────────────────

/// Account details as carried by a remote response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id:          i64,
    pub access_hash: Option<i64>,
    pub first_name:  Option<String>,
    pub last_name:   Option<String>,
    pub username:    Option<String>,
    pub phone:       Option<String>,
}

impl UserInfo {
    pub fn full_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("");
        let last  = self.last_name.as_deref().unwrap_or("");
        format!("{first} {last}").trim().to_string()
    }
}

/// A user entity observed in a response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservedUser {
    Empty(i64),
    User(UserInfo),
}

impl ObservedUser {
    pub fn id(&self) -> i64 {
        match self {
            Self::Empty(id) => *id,
            Self::User(u)   => u.id,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicChat {
    pub id:    i64,
    pub title: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id:          i64,
    pub access_hash: Option<i64>,
    pub title:       String,
    pub username:    Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelForbiddenInfo {
    pub id:          i64,
    pub access_hash: i64,
    pub title:       String,
}

/// A chat-like entity observed in a response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservedChat {
    Empty(i64),
    Chat(BasicChat),
    Forbidden(BasicChat),
    Channel(ChannelInfo),
    ChannelForbidden(ChannelForbiddenInfo),
}

impl ObservedChat {
    pub fn id(&self) -> i64 {
        match self {
            Self::Empty(id)           => *id,
            Self::Chat(c)             => c.id,
            Self::Forbidden(c)        => c.id,
            Self::Channel(c)          => c.id,
            Self::ChannelForbidden(c) => c.id,
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
