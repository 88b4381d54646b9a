//! Session bootstrap: the startup sequence from config to a published
//! session.
//!
//! ```rust,no_run
//! # async fn f<C: courier_client::SessionClient>(
//! #     make_client: impl FnOnce(courier_client::ClientOptions) -> Result<C, courier_client::InvocationError>,
//! # ) -> Result<(), courier_client::Error> {
//! use courier_client::{Bootstrap, Config};
//!
//! let boot = Bootstrap::new(Config::from_env()?);
//! let ctx  = boot.context();          // hand to tool handlers
//! boot.run(make_client).await?;       // parks until ctx.cancellation() fires
//! # let _ = ctx; Ok(()) }
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;

use courier_peers::{ObservedUser, PeerCache, SqliteStore};
use tokio_util::sync::CancellationToken;

use crate::auth::AuthOrchestrator;
use crate::client::{ClientOptions, Identity, SessionClient};
use crate::config::Config;
use crate::errors::{Error, InvocationError};
use crate::gate::{ReadinessGate, Session, SettleGuard};
use crate::resolver::Resolver;

// ─── SessionContext ───────────────────────────────────────────────────────────

/// The process-wide session state shared with tool handlers. Cheap to clone.
#[derive(Clone, Debug)]
pub struct SessionContext {
    auth: Arc<AuthOrchestrator>,
    gate: ReadinessGate,
    ctx:  CancellationToken,
}

impl SessionContext {
    pub fn auth(&self) -> &AuthOrchestrator { &self.auth }

    pub fn gate(&self) -> &ReadinessGate { &self.gate }

    /// Root cancellation token; cancelling it ends the session.
    pub fn cancellation(&self) -> &CancellationToken { &self.ctx }
}

// ─── Bootstrap ────────────────────────────────────────────────────────────────

/// Owns the startup sequence: validate config, open the peer cache, build
/// and connect the session client, log in, publish the session.
pub struct Bootstrap {
    config:  Config,
    context: SessionContext,
}

impl Bootstrap {
    pub fn new(config: Config) -> Self {
        Self::with_cancellation(config, CancellationToken::new())
    }

    pub fn with_cancellation(config: Config, ctx: CancellationToken) -> Self {
        let auth = AuthOrchestrator::with_timeouts(config.phone.clone(), config.auth_timeouts);
        Self {
            config,
            context: SessionContext {
                auth: Arc::new(auth),
                gate: ReadinessGate::new(),
                ctx,
            },
        }
    }

    pub fn config(&self) -> &Config { &self.config }

    pub fn context(&self) -> SessionContext { self.context.clone() }

    /// Cancel the session context; parked login prompts and [`Bootstrap::run`]
    /// return.
    pub fn shutdown(&self) {
        self.context.ctx.cancel();
    }

    /// Run the startup sequence and publish the session.
    ///
    /// On failure the readiness gate settles with the error (accessors return
    /// [`Error::NotInitialized`]) and the auth state becomes `Error` if it was
    /// not already terminal.
    pub async fn start<C, F>(&self, make_client: F) -> Result<Arc<Session>, Error>
    where
        C: SessionClient,
        F: FnOnce(ClientOptions) -> Result<C, InvocationError>,
    {
        let _settle = SettleGuard::new(&self.context.gate);

        match self.try_start(make_client).await {
            Ok(session) => Ok(session),
            Err(e) => {
                let msg = e.to_string();
                tracing::warn!("[courier] Startup failed: {msg}");
                self.context.gate.fail(msg.clone());
                if !self.context.auth.current_state().is_terminal() {
                    self.context.auth.fail(&msg);
                }
                Err(e)
            }
        }
    }

    /// [`Bootstrap::start`], then park until the session context is cancelled.
    pub async fn run<C, F>(&self, make_client: F) -> Result<(), Error>
    where
        C: SessionClient,
        F: FnOnce(ClientOptions) -> Result<C, InvocationError>,
    {
        self.start(make_client).await?;
        self.context.ctx.cancelled().await;
        tracing::info!("[courier] Session context cancelled, shutting down");
        Ok(())
    }

    async fn try_start<C, F>(&self, make_client: F) -> Result<Arc<Session>, Error>
    where
        C: SessionClient,
        F: FnOnce(ClientOptions) -> Result<C, InvocationError>,
    {
        let SessionContext { auth, gate, ctx } = &self.context;

        self.config.validate()?;
        create_session_dir(&self.config.session_dir()?).map_err(Error::Storage)?;

        let store = SqliteStore::open(self.config.peer_db_file()?).map_err(Error::Storage)?;
        let cache = PeerCache::new(Arc::new(store));
        tracing::info!(
            "[courier] Peer cache ready ({}, {} entries)",
            cache.backend_name(),
            cache.len().unwrap_or(0)
        );

        let client: Arc<dyn SessionClient> = Arc::new(make_client(ClientOptions {
            api_id:       self.config.api_id,
            api_hash:     self.config.api_hash.clone(),
            session_file: self.config.session_file()?,
        })?);

        client.connect(ctx).await?;
        auth.authorize(client.as_ref(), ctx).await?;

        let me = client.get_self(ctx).await?;
        cache.store_peers(&[], &[ObservedUser::User(me.clone())]);

        let session = Arc::new(Session {
            resolver: Resolver::new(client.clone(), cache.clone(), ctx.clone()),
            client,
            ctx:      ctx.clone(),
            me:       Identity::from(&me),
            cache,
        });
        // Auth reads Authenticated before any handler can hold the session.
        auth.mark_authenticated();
        gate.publish(session.clone());
        tracing::info!("[courier] Logged in as {}", session.me);
        Ok(session)
    }
}

/// Create the session directory (owner-only on Unix). Existing directories
/// keep their permissions.
fn create_session_dir(dir: &Path) -> io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}
