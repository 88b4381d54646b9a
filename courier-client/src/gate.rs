//! Readiness gate. Hands session resources to tool handlers once bootstrap
//! has finished.
//!
//! Handlers may be invoked before login completes. Every accessor suspends
//! until the gate settles, which happens exactly once: either with a live
//! [`Session`] or with the startup failure, in which case accessors return
//! [`Error::NotInitialized`] instead of waiting forever.

use std::fmt;
use std::sync::Arc;

use courier_peers::PeerCache;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::client::{Identity, SessionClient};
use crate::errors::Error;
use crate::resolver::Resolver;

// ─── Session ──────────────────────────────────────────────────────────────────

/// The live, authenticated session.
pub struct Session {
    pub(crate) client:   Arc<dyn SessionClient>,
    pub(crate) ctx:      CancellationToken,
    pub(crate) me:       Identity,
    pub(crate) resolver: Resolver,
    pub(crate) cache:    PeerCache,
}

impl Session {
    pub fn client(&self) -> Arc<dyn SessionClient> { self.client.clone() }

    pub fn execution_context(&self) -> CancellationToken { self.ctx.clone() }

    pub fn self_identity(&self) -> &Identity { &self.me }

    pub fn resolver(&self) -> &Resolver { &self.resolver }

    pub fn cache(&self) -> &PeerCache { &self.cache }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("me", &self.me)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

// ─── ReadinessGate ────────────────────────────────────────────────────────────

#[derive(Clone)]
enum Readiness {
    Pending,
    Ready(Arc<Session>),
    Failed(String),
}

/// One-shot readiness signal. Cheap to clone; all clones share the signal.
#[derive(Clone)]
pub struct ReadinessGate {
    tx: Arc<watch::Sender<Readiness>>,
}

impl Default for ReadinessGate {
    fn default() -> Self { Self::new() }
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Readiness::Pending);
        Self { tx: Arc::new(tx) }
    }

    /// Settle with a live session. Returns `false` if already settled.
    pub(crate) fn publish(&self, session: Arc<Session>) -> bool {
        self.settle(Readiness::Ready(session))
    }

    /// Settle with a startup failure. Returns `false` if already settled.
    pub(crate) fn fail(&self, reason: impl Into<String>) -> bool {
        self.settle(Readiness::Failed(reason.into()))
    }

    fn settle(&self, outcome: Readiness) -> bool {
        self.tx.send_if_modified(|r| {
            if !matches!(r, Readiness::Pending) {
                return false;
            }
            *r = outcome;
            true
        })
    }

    pub fn is_settled(&self) -> bool {
        !matches!(*self.tx.borrow(), Readiness::Pending)
    }

    /// Non-blocking peek: the session if it is ready right now.
    pub fn try_session(&self) -> Option<Arc<Session>> {
        match &*self.tx.borrow() {
            Readiness::Ready(s) => Some(s.clone()),
            _                   => None,
        }
    }

    /// Wait for the gate to settle and return the session.
    pub async fn session(&self) -> Result<Arc<Session>, Error> {
        let mut rx = self.tx.subscribe();
        let settled = rx
            .wait_for(|r| !matches!(r, Readiness::Pending))
            .await
            .map(|r| Readiness::clone(&r))
            .map_err(|_| Error::NotInitialized("readiness signal dropped".into()))?;
        match settled {
            Readiness::Ready(s)       => Ok(s),
            Readiness::Failed(reason) => Err(Error::NotInitialized(reason)),
            Readiness::Pending        => Err(Error::NotInitialized("still starting".into())),
        }
    }

    pub async fn client(&self) -> Result<Arc<dyn SessionClient>, Error> {
        Ok(self.session().await?.client())
    }

    pub async fn execution_context(&self) -> Result<CancellationToken, Error> {
        Ok(self.session().await?.execution_context())
    }

    pub async fn self_identity(&self) -> Result<Identity, Error> {
        Ok(self.session().await?.me.clone())
    }

    pub async fn resolver(&self) -> Result<Resolver, Error> {
        Ok(self.session().await?.resolver.clone())
    }

    pub async fn cache(&self) -> Result<PeerCache, Error> {
        Ok(self.session().await?.cache.clone())
    }
}

impl fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.tx.borrow() {
            Readiness::Pending   => "pending",
            Readiness::Ready(_)  => "ready",
            Readiness::Failed(_) => "failed",
        };
        write!(f, "ReadinessGate({state})")
    }
}

/// Fails the gate on drop unless it already settled.
pub(crate) struct SettleGuard<'a> {
    gate: &'a ReadinessGate,
}

impl<'a> SettleGuard<'a> {
    pub(crate) fn new(gate: &'a ReadinessGate) -> Self {
        Self { gate }
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if self.gate.fail("bootstrap exited before the session became ready") {
            tracing::warn!("[courier] Bootstrap ended without settling the readiness gate");
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
