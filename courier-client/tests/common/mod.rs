#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use courier_client::peers::{ObservedUser, UserInfo};
use courier_client::{
    AuthCallbacks, AuthOrchestrator, AuthState, AuthTimeouts, CancellationToken, Config,
    InvocationError, PeerKey, RemoteCall, ResolvedPeer, RpcError, SessionClient, SignInError,
};

// ─── Scripted session client ──────────────────────────────────────────────────

pub enum Login {
    /// Saved session is already authorized.
    Cached,
    /// Ask for a code, then a password if one is set.
    Code { expected: String, password: Option<String> },
}

pub struct MockClient {
    pub login:         Login,
    pub me:            UserInfo,
    pub directory:     HashMap<String, ResolvedPeer>,
    pub resolve_calls: Arc<AtomicUsize>,
    pub fail_connect:  bool,
}

impl MockClient {
    pub fn cached() -> Self {
        Self {
            login:         Login::Cached,
            me:            me(),
            directory:     HashMap::new(),
            resolve_calls: Arc::new(AtomicUsize::new(0)),
            fail_connect:  false,
        }
    }

    pub fn with_code(code: &str, password: Option<&str>) -> Self {
        Self {
            login: Login::Code { expected: code.into(), password: password.map(Into::into) },
            ..Self::cached()
        }
    }

    pub fn with_user(mut self, username: &str, user: UserInfo) -> Self {
        self.directory.insert(username.into(), ResolvedPeer {
            peer:  Some(PeerKey::user(user.id)),
            users: vec![ObservedUser::User(user)],
            chats: Vec::new(),
        });
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.resolve_calls.clone()
    }
}

#[async_trait]
impl SessionClient for MockClient {
    async fn connect(&self, _ctx: &CancellationToken) -> Result<(), InvocationError> {
        if self.fail_connect {
            return Err(InvocationError::Other("connection refused".into()));
        }
        Ok(())
    }

    async fn authorize(&self, ctx: &CancellationToken, auth: &dyn AuthCallbacks) -> Result<(), SignInError> {
        let (expected, password) = match &self.login {
            Login::Cached => return Ok(()),
            Login::Code { expected, password } => (expected, password),
        };

        auth.on_phone_requested().await?;
        let code = auth.on_code_requested(ctx).await?;
        if &code != expected {
            return Err(InvocationError::from(RpcError::new(400, "PHONE_CODE_INVALID")).into());
        }
        if let Some(password) = password {
            let given = auth.on_password_requested(ctx).await?;
            if &given != password {
                return Err(SignInError::Other(RpcError::new(400, "PASSWORD_HASH_INVALID").into()));
            }
        }
        Ok(())
    }

    async fn get_self(&self, _ctx: &CancellationToken) -> Result<UserInfo, InvocationError> {
        Ok(self.me.clone())
    }

    async fn resolve_username(&self, _ctx: &CancellationToken, username: &str) -> Result<ResolvedPeer, InvocationError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.directory
            .get(username)
            .cloned()
            .ok_or_else(|| RpcError::new(400, "USERNAME_NOT_OCCUPIED").into())
    }

    async fn invoke(&self, ctx: &CancellationToken, call: RemoteCall) -> Result<serde_json::Value, InvocationError> {
        if ctx.is_cancelled() {
            return Err(InvocationError::Cancelled);
        }
        Ok(serde_json::json!({ "method": call.method, "params": call.params }))
    }
}

// ─── Fixtures ─────────────────────────────────────────────────────────────────

pub fn me() -> UserInfo {
    UserInfo {
        id:          1000,
        access_hash: Some(77),
        first_name:  Some("Dana".into()),
        last_name:   Some("Ops".into()),
        username:    Some("dana".into()),
        phone:       Some("15550100".into()),
    }
}

pub fn alice() -> UserInfo {
    UserInfo {
        id:          42,
        access_hash: Some(4242),
        first_name:  Some("Alice".into()),
        username:    Some("alice".into()),
        ..Default::default()
    }
}

pub fn timeouts() -> AuthTimeouts {
    AuthTimeouts { hand_off: Duration::from_secs(2), settle: Some(Duration::from_secs(5)) }
}

pub fn config(dir: &Path) -> Config {
    Config {
        api_id:        12345,
        api_hash:      "0123456789abcdef".into(),
        phone:         "+15550100".into(),
        session_dir:   Some(dir.to_path_buf()),
        auth_timeouts: timeouts(),
    }
}

pub async fn wait_for_state(auth: &AuthOrchestrator, state: AuthState) {
    let mut rx = auth.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.state == state))
        .await
        .expect("auth state never reached")
        .map(|_| ())
        .expect("auth state channel closed");
}
