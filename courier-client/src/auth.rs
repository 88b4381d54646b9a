//! Tool-driven login.
//!
//! The session client runs its login handshake on its own task and asks for
//! the code and 2FA password through [`AuthCallbacks`]. Those values arrive
//! later, from unrelated tool invocations ([`AuthOrchestrator::submit_code`],
//! [`AuthOrchestrator::submit_password`]).
//!
//! The callback is the party that parks indefinitely; the submitter only
//! waits a bounded time for a parked callback to take its value, so a code
//! submitted after the handshake gave up fails fast instead of hanging.
//!
//! ```text
//!  Connecting ──► WaitingCode ──► WaitingPassword ──► Authenticated
//!      │               │                 │
//!      └───────────────┴─────────────────┴──────────► Error
//! ```
//! `Connecting` and `WaitingCode` may also go straight to `Authenticated`
//! (saved session / no 2FA).

use std::fmt;
use std::pin::pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{Notify, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::{AuthCallbacks, SessionClient, SignUpInfo};
use crate::errors::{Error, SignInError, TermsOfService};

// ─── AuthState ────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Connecting,
    WaitingCode,
    WaitingPassword,
    Authenticated,
    Error,
}

impl AuthState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting      => "connecting",
            Self::WaitingCode     => "waiting_code",
            Self::WaitingPassword => "waiting_password",
            Self::Authenticated   => "authenticated",
            Self::Error           => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Authenticated | Self::Error)
    }

    pub fn can_transition_to(self, next: AuthState) -> bool {
        use AuthState as S;
        matches!(
            (self, next),
            (S::Connecting,      S::WaitingCode | S::Authenticated | S::Error)
                | (S::WaitingCode,     S::WaitingPassword | S::Authenticated | S::Error)
                | (S::WaitingPassword, S::Authenticated | S::Error)
        )
    }

    /// What a submitter hands over in this state.
    pub(crate) fn prompt(self) -> &'static str {
        match self {
            Self::WaitingCode     => "code",
            Self::WaitingPassword => "password",
            _                     => "input",
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State and error message, always published together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub state: AuthState,
    /// Empty unless `state` is [`AuthState::Error`].
    pub error: String,
}

// ─── AuthTimeouts ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthTimeouts {
    /// How long a submitter waits for a parked callback to take its value.
    pub hand_off: Duration,
    /// How long a submitter then waits for the state to move on.
    /// `None` waits forever.
    pub settle:   Option<Duration>,
}

impl Default for AuthTimeouts {
    fn default() -> Self {
        Self {
            hand_off: Duration::from_secs(30),
            settle:   Some(Duration::from_secs(60)),
        }
    }
}

// ─── Rendezvous ───────────────────────────────────────────────────────────────

/// Unbuffered hand-off: a value is only accepted by a receiver that is
/// parked right now.
#[derive(Default)]
struct Rendezvous {
    slot:   Mutex<Option<oneshot::Sender<String>>>,
    parked: Notify,
}

impl Rendezvous {
    fn lock_slot(&self) -> MutexGuard<'_, Option<oneshot::Sender<String>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Park until a value is handed off or `ctx` is cancelled.
    async fn receive(&self, ctx: &CancellationToken) -> Result<String, SignInError> {
        let (tx, rx) = oneshot::channel();
        *self.lock_slot() = Some(tx);
        self.parked.notify_waiters();

        tokio::select! {
            biased;
            value = rx => value.map_err(|_| SignInError::Cancelled),
            _ = ctx.cancelled() => {
                self.lock_slot().take();
                Err(SignInError::Cancelled)
            }
        }
    }

    /// Give `value` to a parked receiver, waiting up to `within` for one to
    /// show up. Returns `false` on timeout.
    async fn hand_off(&self, mut value: String, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        loop {
            let mut parked = pin!(self.parked.notified());
            parked.as_mut().enable();

            let receiver = self.lock_slot().take();
            if let Some(tx) = receiver {
                match tx.send(value) {
                    Ok(())   => return true,
                    // Receiver gave up between parking and now.
                    Err(v) => { value = v; continue; }
                }
            }

            if tokio::time::timeout_at(deadline, parked).await.is_err() {
                return false;
            }
        }
    }
}

// ─── AuthOrchestrator ─────────────────────────────────────────────────────────

/// More than the number of transitions a single login can make, so a
/// subscriber never lags.
const HISTORY_CAPACITY: usize = 8;

/// Bridges the session client's blocking login prompts to tool-driven
/// `submit_code` / `submit_password` calls.
pub struct AuthOrchestrator {
    phone:     String,
    state:     watch::Sender<AuthSnapshot>,
    history:   broadcast::Sender<AuthSnapshot>,
    codes:     Rendezvous,
    passwords: Rendezvous,
    timeouts:  AuthTimeouts,
}

impl AuthOrchestrator {
    pub fn new(phone: impl Into<String>) -> Self {
        Self::with_timeouts(phone, AuthTimeouts::default())
    }

    pub fn with_timeouts(phone: impl Into<String>, timeouts: AuthTimeouts) -> Self {
        let (state, _) = watch::channel(AuthSnapshot {
            state: AuthState::Connecting,
            error: String::new(),
        });
        let (history, _) = broadcast::channel(HISTORY_CAPACITY);
        Self {
            phone: phone.into(),
            state,
            history,
            codes: Rendezvous::default(),
            passwords: Rendezvous::default(),
            timeouts,
        }
    }

    pub fn current_state(&self) -> AuthState {
        self.state.borrow().state
    }

    /// The stored failure message; empty unless the state is `Error`.
    pub fn current_error(&self) -> String {
        self.state.borrow().error.clone()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    /// Watch the latest snapshot. Intermediate states may be coalesced.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    /// Every transition from now on, in order, none skipped.
    pub fn transitions(&self) -> broadcast::Receiver<AuthSnapshot> {
        self.history.subscribe()
    }

    pub fn timeouts(&self) -> AuthTimeouts {
        self.timeouts
    }

    /// Hand the login code to the waiting handshake and return the state it
    /// moved to.
    pub async fn submit_code(&self, code: impl Into<String>) -> Result<AuthState, Error> {
        self.submit(AuthState::WaitingCode, &self.codes, code.into()).await
    }

    /// Hand the 2FA password to the waiting handshake and return the state it
    /// moved to.
    pub async fn submit_password(&self, password: impl Into<String>) -> Result<AuthState, Error> {
        self.submit(AuthState::WaitingPassword, &self.passwords, password.into()).await
    }

    async fn submit(
        &self,
        gate:    AuthState,
        channel: &Rendezvous,
        value:   String,
    ) -> Result<AuthState, Error> {
        // Subscribe under the state lock: the log then holds exactly the
        // transitions made after `current` was read.
        let (current, mut events) = {
            let snapshot = self.state.borrow();
            (snapshot.state, self.history.subscribe())
        };
        if current != gate {
            return Err(Error::InvalidState { expected: gate, current });
        }

        if !channel.hand_off(value, self.timeouts.hand_off).await {
            tracing::warn!("[courier] No login step took the submitted {}", gate.prompt());
            return Err(Error::Timeout { waiting_for: gate.prompt(), state: self.current_state() });
        }

        let next = async {
            loop {
                match events.recv().await {
                    Ok(s) if s.state != gate   => return Some(s),
                    Ok(_)                      => continue,
                    Err(RecvError::Lagged(_))  => continue,
                    Err(RecvError::Closed)     => return None,
                }
            }
        };
        let next = match self.timeouts.settle {
            Some(limit) => match tokio::time::timeout(limit, next).await {
                Ok(r)  => r,
                Err(_) => return Err(Error::Stalled { state: self.current_state() }),
            },
            None => next.await,
        };
        let snapshot = next.ok_or_else(|| Error::AuthFailed("auth state channel closed".into()))?;

        if snapshot.state == AuthState::Error {
            return Err(Error::AuthFailed(snapshot.error));
        }
        Ok(snapshot.state)
    }

    /// Run `client`'s login with this orchestrator answering its prompts.
    ///
    /// A failure is recorded as [`AuthState::Error`] carrying the exact
    /// error text before it is returned.
    pub async fn authorize(
        &self,
        client: &dyn SessionClient,
        ctx:    &CancellationToken,
    ) -> Result<(), Error> {
        match client.authorize(ctx, self).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let msg = e.to_string();
                self.fail(&msg);
                Err(Error::AuthFailed(msg))
            }
        }
    }

    pub(crate) fn mark_authenticated(&self) -> bool {
        self.transition(AuthState::Authenticated, String::new())
    }

    pub(crate) fn fail(&self, message: &str) -> bool {
        self.transition(AuthState::Error, message.to_string())
    }

    fn transition(&self, next: AuthState, error: String) -> bool {
        let mut from = AuthState::Connecting;
        let moved = self.state.send_if_modified(|s| {
            from = s.state;
            if !s.state.can_transition_to(next) {
                return false;
            }
            s.state = next;
            s.error = error;
            // Still under the state lock, so the log order matches.
            let _ = self.history.send(s.clone());
            true
        });
        if moved {
            tracing::info!("[courier] Auth state {from} → {next}");
        } else {
            tracing::warn!("[courier] Ignoring auth transition {from} → {next}");
        }
        moved
    }
}

impl fmt::Debug for AuthOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOrchestrator")
            .field("state", &self.current_state())
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AuthCallbacks for AuthOrchestrator {
    async fn on_phone_requested(&self) -> Result<String, SignInError> {
        Ok(self.phone.clone())
    }

    async fn on_code_requested(&self, ctx: &CancellationToken) -> Result<String, SignInError> {
        self.transition(AuthState::WaitingCode, String::new());
        tracing::info!("[courier] Login code sent, waiting for submit_code …");
        self.codes.receive(ctx).await
    }

    async fn on_password_requested(&self, ctx: &CancellationToken) -> Result<String, SignInError> {
        self.transition(AuthState::WaitingPassword, String::new());
        tracing::info!("[courier] 2FA enabled, waiting for submit_password …");
        self.passwords.receive(ctx).await
    }

    async fn on_sign_up_requested(&self) -> Result<SignUpInfo, SignInError> {
        Err(SignInError::SignUpRequired)
    }

    async fn on_terms_of_service_requested(&self, tos: &TermsOfService) -> Result<(), SignInError> {
        Err(SignInError::TermsOfServiceRequired(tos.clone()))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn quick() -> AuthTimeouts {
        AuthTimeouts { hand_off: Duration::from_millis(50), settle: Some(Duration::from_millis(200)) }
    }

    #[test]
    fn transition_table() {
        use AuthState as S;
        assert!(S::Connecting.can_transition_to(S::WaitingCode));
        assert!(S::Connecting.can_transition_to(S::Authenticated));
        assert!(S::Connecting.can_transition_to(S::Error));
        assert!(!S::Connecting.can_transition_to(S::WaitingPassword));
        assert!(S::WaitingCode.can_transition_to(S::WaitingPassword));
        assert!(!S::WaitingCode.can_transition_to(S::WaitingCode));
        assert!(!S::WaitingPassword.can_transition_to(S::WaitingCode));
        for terminal in [S::Authenticated, S::Error] {
            assert!(terminal.is_terminal());
            for next in [S::Connecting, S::WaitingCode, S::WaitingPassword, S::Authenticated, S::Error] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn error_is_terminal_and_keeps_message() {
        let auth = AuthOrchestrator::new("+100");
        assert!(auth.fail("PHONE_NUMBER_BANNED"));
        assert!(!auth.mark_authenticated());
        assert_eq!(auth.current_state(), AuthState::Error);
        assert_eq!(auth.current_error(), "PHONE_NUMBER_BANNED");
    }

    #[tokio::test]
    async fn phone_and_refusals() {
        let auth = AuthOrchestrator::new("+15550100");
        assert_eq!(auth.on_phone_requested().await.unwrap(), "+15550100");
        assert_eq!(auth.current_state(), AuthState::Connecting);
        assert!(matches!(auth.on_sign_up_requested().await, Err(SignInError::SignUpRequired)));
        let tos = TermsOfService { id: "tos-1".into(), text: String::new() };
        assert!(matches!(
            auth.on_terms_of_service_requested(&tos).await,
            Err(SignInError::TermsOfServiceRequired(t)) if t.id == "tos-1"
        ));
    }

    #[tokio::test]
    async fn submit_reaches_parked_callback() {
        let auth = Arc::new(AuthOrchestrator::with_timeouts("+1", quick()));
        let ctx  = CancellationToken::new();

        let handshake = {
            let auth = auth.clone();
            let ctx  = ctx.clone();
            tokio::spawn(async move {
                let code = auth.on_code_requested(&ctx).await?;
                assert_eq!(code, "12345");
                auth.mark_authenticated();
                Ok::<_, SignInError>(())
            })
        };

        auth.subscribe().wait_for(|s| s.state == AuthState::WaitingCode).await.unwrap();
        assert_eq!(auth.submit_code("12345").await.unwrap(), AuthState::Authenticated);
        handshake.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn hand_off_times_out_without_receiver() {
        let auth = Arc::new(AuthOrchestrator::with_timeouts("+1", quick()));
        let ctx  = CancellationToken::new();

        // Park, then give up: the state stays WaitingCode with nobody listening.
        let parked = {
            let auth = auth.clone();
            let ctx  = ctx.clone();
            tokio::spawn(async move { auth.on_code_requested(&ctx).await })
        };
        auth.subscribe().wait_for(|s| s.state == AuthState::WaitingCode).await.unwrap();
        ctx.cancel();
        assert!(matches!(parked.await.unwrap(), Err(SignInError::Cancelled)));

        let err = auth.submit_code("1").await.unwrap_err();
        assert!(matches!(err, Error::Timeout { waiting_for: "code", state: AuthState::WaitingCode }));
    }

    #[tokio::test]
    async fn settle_timeout_bounds_the_whole_submit() {
        let auth = Arc::new(AuthOrchestrator::with_timeouts("+1", quick()));
        let ctx  = CancellationToken::new();

        // Takes the code but never moves the state on.
        let stuck = {
            let auth = auth.clone();
            let ctx  = ctx.clone();
            tokio::spawn(async move {
                let _ = auth.on_code_requested(&ctx).await;
                ctx.cancelled().await;
            })
        };
        auth.subscribe().wait_for(|s| s.state == AuthState::WaitingCode).await.unwrap();

        let err = auth.submit_code("1").await.unwrap_err();
        assert!(matches!(err, Error::Stalled { state: AuthState::WaitingCode }));
        assert_eq!(err.to_string(), "timeout: auth state did not move on from waiting_code");
        ctx.cancel();
        stuck.await.unwrap();
    }

    #[tokio::test]
    async fn submit_reports_first_state_after_gate() {
        let auth = Arc::new(AuthOrchestrator::with_timeouts("+1", quick()));
        let ctx  = CancellationToken::new();
        let mut log = auth.transitions();

        let handshake = {
            let auth = auth.clone();
            let ctx  = ctx.clone();
            tokio::spawn(async move {
                auth.on_code_requested(&ctx).await?;
                // Both transitions land before the submitter is polled again.
                auth.transition(AuthState::WaitingPassword, String::new());
                auth.fail("PASSWORD_HASH_INVALID");
                Ok::<_, SignInError>(())
            })
        };

        auth.subscribe().wait_for(|s| s.state == AuthState::WaitingCode).await.unwrap();
        assert_eq!(auth.submit_code("123").await.unwrap(), AuthState::WaitingPassword);
        handshake.await.unwrap().unwrap();
        assert_eq!(auth.current_state(), AuthState::Error);

        let seen: Vec<_> = std::iter::from_fn(|| log.try_recv().ok()).map(|s| s.state).collect();
        assert_eq!(seen, [AuthState::WaitingCode, AuthState::WaitingPassword, AuthState::Error]);
    }

    #[tokio::test]
    async fn password_prompt_cancel_and_late_submit() {
        let auth = Arc::new(AuthOrchestrator::with_timeouts("+1", quick()));
        let ctx  = CancellationToken::new();
        auth.transition(AuthState::WaitingCode, String::new());

        let parked = {
            let auth = auth.clone();
            let ctx  = ctx.clone();
            tokio::spawn(async move { auth.on_password_requested(&ctx).await })
        };
        auth.subscribe().wait_for(|s| s.state == AuthState::WaitingPassword).await.unwrap();
        ctx.cancel();
        assert!(matches!(parked.await.unwrap(), Err(SignInError::Cancelled)));

        let err = auth.submit_password("hunter2").await.unwrap_err();
        assert!(matches!(err, Error::Timeout { waiting_for: "password", state: AuthState::WaitingPassword }));
        assert_eq!(err.to_string(), "timeout: auth flow not accepting password (state: waiting_password)");
    }
}
