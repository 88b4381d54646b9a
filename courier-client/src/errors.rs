//! Error types for courier-client.
//!
//! Three layers: [`RpcError`] / [`InvocationError`] for whatever the session
//! client reports, [`SignInError`] for the login handshake, and [`Error`] for
//! everything this crate itself surfaces to tool handlers.

use std::{fmt, io};

use courier_peers::CacheError;

use crate::auth::AuthState;

// ─── RpcError ─────────────────────────────────────────────────────────────────

/// A server-side rejection, as a [`crate::SessionClient`] implementation
/// should report it through [`InvocationError::Rpc`].
///
/// Build it with [`RpcError::new`] from the status code and the raw error
/// string. Names ending in a number (`FLOOD_WAIT_30`, `PHONE_MIGRATE_4`)
/// keep the number in `value` and drop it from `name`, so a single name
/// covers every variant when matching.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcError {
    pub code:  i32,
    pub name:  String,
    pub value: Option<u32>,
}

impl RpcError {
    pub fn new(code: i32, raw: &str) -> Self {
        let split = raw
            .rsplit_once('_')
            .filter(|(_, tail)| !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|(head, tail)| tail.parse::<u32>().ok().map(|v| (head, v)));
        match split {
            Some((head, v)) => Self { code, name: head.to_string(), value: Some(v) },
            None            => Self { code, name: raw.to_string(), value: None },
        }
    }

    /// Name match. A trailing `*` matches by prefix, a leading `*` by suffix.
    pub fn is(&self, pattern: &str) -> bool {
        match (pattern.strip_suffix('*'), pattern.strip_prefix('*')) {
            (Some(prefix), _) => self.name.starts_with(prefix),
            (None, Some(suffix)) => self.name.ends_with(suffix),
            (None, None) => self.name == pattern,
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "RPC {}: {}_{v}", self.code, self.name),
            None    => write!(f, "RPC {}: {}", self.code, self.name),
        }
    }
}

impl std::error::Error for RpcError {}

// ─── InvocationError ──────────────────────────────────────────────────────────

/// The error type returned by any [`crate::SessionClient`] call.
#[derive(Debug)]
pub enum InvocationError {
    /// The server rejected the request.
    Rpc(RpcError),
    /// Network / I/O failure.
    Io(io::Error),
    /// The execution context was cancelled while the call was in flight.
    Cancelled,
    /// The request was dropped (e.g. sender task shut down).
    Dropped,
    /// Anything else the session client wants to surface verbatim.
    Other(String),
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc(e)   => write!(f, "{e}"),
            Self::Io(e)    => write!(f, "I/O error: {e}"),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::Dropped  => write!(f, "request dropped"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for InvocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rpc(e) => Some(e),
            Self::Io(e)  => Some(e),
            _            => None,
        }
    }
}

impl From<io::Error> for InvocationError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

impl From<RpcError> for InvocationError {
    fn from(e: RpcError) -> Self { Self::Rpc(e) }
}

impl InvocationError {
    /// Returns `true` if this is the named RPC error (supports `'*'` wildcards).
    pub fn is(&self, pattern: &str) -> bool {
        match self {
            Self::Rpc(e) => e.is(pattern),
            _            => false,
        }
    }
}

// ─── SignInError ──────────────────────────────────────────────────────────────

/// Terms the account owner has to accept before the server lets them in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TermsOfService {
    pub id:   String,
    pub text: String,
}

/// Errors raised while the session client runs the login handshake, either
/// by the client itself or by the [`crate::AuthCallbacks`] it drives.
#[derive(Debug)]
pub enum SignInError {
    /// The phone number is not registered; sign-up is not supported here.
    SignUpRequired,
    /// New terms of service must be accepted in an official app first.
    TermsOfServiceRequired(TermsOfService),
    /// The code entered was wrong or has expired.
    InvalidCode,
    /// The execution context was cancelled while waiting for input.
    Cancelled,
    /// Any other error.
    Other(InvocationError),
}

impl fmt::Display for SignInError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignUpRequired => write!(f, "signing up not supported: register the number with an official app first"),
            Self::TermsOfServiceRequired(tos) => {
                write!(f, "terms of service {} must be accepted with an official app", tos.id)
            }
            Self::InvalidCode => write!(f, "invalid or expired code"),
            Self::Cancelled   => write!(f, "login cancelled"),
            Self::Other(e)    => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SignInError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Other(e) => Some(e),
            _              => None,
        }
    }
}

impl From<InvocationError> for SignInError {
    fn from(e: InvocationError) -> Self {
        match e {
            InvocationError::Cancelled             => Self::Cancelled,
            e if e.is("PHONE_CODE_*")              => Self::InvalidCode,
            other                                  => Self::Other(other),
        }
    }
}

// ─── Error ────────────────────────────────────────────────────────────────────

/// Coarse classification of [`Error`], for callers that branch on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The session never became ready.
    NotInitialized,
    /// An auth submit arrived outside its required state.
    InvalidState,
    /// An auth hand-off or the state change after it did not happen in time.
    Timeout,
    /// A peer could not be resolved.
    NotFound,
    /// The session client reported a failure.
    ProtocolError,
    /// Startup configuration is missing or malformed.
    Config,
    /// The peer store failed.
    Storage,
}

/// The error type returned by this crate.
#[derive(Debug)]
pub enum Error {
    /// Bootstrap settled without a session; carries the startup failure.
    NotInitialized(String),
    /// `submit_code` / `submit_password` called in the wrong state.
    InvalidState { expected: AuthState, current: AuthState },
    /// No parked login step took the submitted value.
    Timeout { waiting_for: &'static str, state: AuthState },
    /// The value was taken but the state never moved on.
    Stalled { state: AuthState },
    /// Resolution miss. `source` is set when a directory lookup failed.
    NotFound { identifier: String, source: Option<InvocationError> },
    /// A session client call failed.
    Protocol(InvocationError),
    /// The login handshake ended in the `Error` state with this message.
    AuthFailed(String),
    Config(String),
    Storage(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized(reason) => write!(f, "session not initialized: {reason}"),
            Self::InvalidState { expected, current } => {
                write!(f, "not waiting for {}, current state: {current}", expected.prompt())
            }
            Self::Timeout { waiting_for, state } => {
                write!(f, "timeout: auth flow not accepting {waiting_for} (state: {state})")
            }
            Self::Stalled { state } => write!(f, "timeout: auth state did not move on from {state}"),
            Self::NotFound { identifier, source: None } => {
                write!(f, "peer {identifier} not found in local storage")
            }
            Self::NotFound { identifier, source: Some(e) } => write!(f, "resolve {identifier}: {e}"),
            Self::Protocol(e)  => write!(f, "{e}"),
            Self::AuthFailed(msg) => write!(f, "{msg}"),
            Self::Config(msg)  => write!(f, "config: {msg}"),
            Self::Storage(e)   => write!(f, "peer storage: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotFound { source: Some(e), .. } => Some(e),
            Self::Protocol(e) => Some(e),
            Self::Storage(e)  => Some(e),
            _                 => None,
        }
    }
}

impl From<InvocationError> for Error {
    fn from(e: InvocationError) -> Self { Self::Protocol(e) }
}

impl From<CacheError> for Error {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Miss(key) => Self::NotFound { identifier: key.to_string(), source: None },
            CacheError::Io(e)     => Self::Storage(e),
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotInitialized(_)    => ErrorKind::NotInitialized,
            Self::InvalidState { .. }  => ErrorKind::InvalidState,
            Self::Timeout { .. }
            | Self::Stalled { .. }     => ErrorKind::Timeout,
            Self::NotFound { .. }      => ErrorKind::NotFound,
            Self::Protocol(_)
            | Self::AuthFailed(_)      => ErrorKind::ProtocolError,
            Self::Config(_)            => ErrorKind::Config,
            Self::Storage(_)           => ErrorKind::Storage,
        }
    }

    /// The auth state this error was raised in, when it is auth-related.
    pub fn auth_state(&self) -> Option<AuthState> {
        match self {
            Self::InvalidState { current, .. } => Some(*current),
            Self::Timeout { state, .. }
            | Self::Stalled { state }          => Some(*state),
            Self::AuthFailed(_)                => Some(AuthState::Error),
            _                                  => None,
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
