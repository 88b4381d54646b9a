//! # courier-client
//!
//! Drives an account-based MTProto session on behalf of a tool-calling
//! client.
//!
//! ## Features
//! - Tool-driven login: the session client's code / 2FA prompts park until
//!   `submit_code` / `submit_password` arrive from a tool call
//! - Explicit auth state machine with a watchable snapshot
//! - Readiness gate: handlers wait for login instead of racing it, and fail
//!   with `NotInitialized` if startup never succeeds
//! - Peer resolution by `@username`, bare name or numeric id, backed by a
//!   persistent access-hash cache
//!
//! The wire-level client is supplied by the caller as a [`SessionClient`].

#![deny(unsafe_code)]

mod errors;
pub mod auth;
pub mod bootstrap;
pub mod client;
pub mod config;
pub mod gate;
pub mod resolver;
pub mod tools;

pub use auth::{AuthOrchestrator, AuthSnapshot, AuthState, AuthTimeouts};
pub use bootstrap::{Bootstrap, SessionContext};
pub use client::{AuthCallbacks, ClientOptions, Identity, RemoteCall, ResolvedPeer, SessionClient, SignUpInfo};
pub use config::Config;
pub use errors::{Error, ErrorKind, InvocationError, RpcError, SignInError, TermsOfService};
pub use gate::{ReadinessGate, Session};
pub use resolver::{NAME_SIGIL, Resolver};
pub use tools::ToolOutput;

pub use courier_peers as peers;
pub use courier_peers::{PeerCache, PeerHandle, PeerKey, PeerKind};
pub use tokio_util::sync::CancellationToken;
