//! The seam to the wire-level session client.
//!
//! The client owns encryption, transport, DC migration and flood-wait
//! retries. This crate only drives it through [`SessionClient`] and answers
//! its login prompts through [`AuthCallbacks`].

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use courier_peers::{ObservedChat, ObservedUser, PeerHandle, PeerKey, UserInfo};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::errors::{InvocationError, SignInError, TermsOfService};

// ─── AuthCallbacks ────────────────────────────────────────────────────────────

/// Prompts the session client issues while logging in.
///
/// Called from the client's own task, in handshake order: phone, then code,
/// then (only with 2FA) password. Implementations may park for as long as
/// `ctx` stays live.
#[async_trait]
pub trait AuthCallbacks: Send + Sync {
    async fn on_phone_requested(&self) -> Result<String, SignInError>;

    async fn on_code_requested(&self, ctx: &CancellationToken) -> Result<String, SignInError>;

    async fn on_password_requested(&self, ctx: &CancellationToken) -> Result<String, SignInError>;

    async fn on_sign_up_requested(&self) -> Result<SignUpInfo, SignInError>;

    async fn on_terms_of_service_requested(&self, tos: &TermsOfService) -> Result<(), SignInError>;
}

/// Profile for a brand-new account.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignUpInfo {
    pub first_name: String,
    pub last_name:  String,
}

// ─── SessionClient ────────────────────────────────────────────────────────────

/// Options handed to the client factory at bootstrap.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub api_id:       i32,
    pub api_hash:     String,
    /// Where the client keeps its serialized session credentials.
    pub session_file: PathBuf,
}

/// A generic method invocation for the thin operation handlers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteCall {
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RemoteCall {
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self { method: method.into(), params }
    }
}

/// Result of a directory lookup by username.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedPeer {
    pub peer:  Option<PeerKey>,
    pub users: Vec<ObservedUser>,
    pub chats: Vec<ObservedChat>,
}

impl ResolvedPeer {
    /// The handle for [`ResolvedPeer::peer`], taken from the returned entities.
    pub fn handle(&self) -> Option<PeerHandle> {
        let key = self.peer?;
        self.users.iter().filter_map(PeerHandle::from_user)
            .chain(self.chats.iter().filter_map(PeerHandle::from_chat))
            .find(|h| h.key() == key)
    }
}

/// The remote session client, treated as a black box.
#[async_trait]
pub trait SessionClient: Send + Sync + 'static {
    /// Open the connection, loading any saved session.
    async fn connect(&self, ctx: &CancellationToken) -> Result<(), InvocationError>;

    /// Log in if the saved session is not already authorized, prompting
    /// through `auth` as needed.
    async fn authorize(
        &self,
        ctx:  &CancellationToken,
        auth: &dyn AuthCallbacks,
    ) -> Result<(), SignInError>;

    /// The logged-in account.
    async fn get_self(&self, ctx: &CancellationToken) -> Result<UserInfo, InvocationError>;

    /// Live directory lookup of a bare username (no `@`).
    async fn resolve_username(
        &self,
        ctx:      &CancellationToken,
        username: &str,
    ) -> Result<ResolvedPeer, InvocationError>;

    /// Generic method invocation.
    async fn invoke(
        &self,
        ctx:  &CancellationToken,
        call: RemoteCall,
    ) -> Result<serde_json::Value, InvocationError>;
}

// ─── Identity ─────────────────────────────────────────────────────────────────

/// The logged-in account, fixed once the session is ready.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id:           i64,
    pub display_name: String,
    pub username:     Option<String>,
    pub phone:        Option<String>,
}

impl From<&UserInfo> for Identity {
    fn from(u: &UserInfo) -> Self {
        Self {
            id:           u.id,
            display_name: u.full_name(),
            username:     u.username.clone(),
            phone:        u.phone.clone(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name)?;
        if let Some(u) = &self.username {
            write!(f, " (@{u})")?;
        }
        Ok(())
    }
}
