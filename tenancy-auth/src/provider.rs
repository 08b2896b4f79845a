//! Identity provider abstraction
//!
//! The identity provider is an external collaborator: it owns credential
//! storage, token issuance and session persistence. The session manager only
//! talks to it through [`IdentityProvider`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::AuthResult;
use crate::identity::{Credentials, Session};

/// Kinds of session change a provider can announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthChangeKind {
    /// A session was established
    SignedIn,
    /// The session ended
    SignedOut,
    /// Tokens were rotated for the same identity
    TokenRefreshed,
}

impl AuthChangeKind {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthChangeKind::SignedIn => "signed_in",
            AuthChangeKind::SignedOut => "signed_out",
            AuthChangeKind::TokenRefreshed => "token_refreshed",
        }
    }
}

/// A change event originated by the provider.
#[derive(Debug, Clone)]
pub struct AuthChange {
    /// What happened
    pub kind: AuthChangeKind,

    /// Session after the change (`None` after sign-out)
    pub session: Option<Session>,

    /// When the provider observed the change
    pub occurred_at: DateTime<Utc>,
}

impl AuthChange {
    /// Create a change event stamped with the current time.
    pub fn new(kind: AuthChangeKind, session: Option<Session>) -> Self {
        Self {
            kind,
            session,
            occurred_at: Utc::now(),
        }
    }
}

/// Identity and session provider.
///
/// Implementations wrap a hosted auth service or, for tests, the in-memory
/// provider. Every method reports failure as an [`AuthError`](crate::AuthError)
/// value.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Get the persisted session, if any.
    async fn get_session(&self) -> AuthResult<Option<Session>>;

    /// Sign in with email and password.
    async fn sign_in(&self, credentials: &Credentials) -> AuthResult<Session>;

    /// Create a new identity and sign it in.
    async fn sign_up(&self, credentials: &Credentials) -> AuthResult<Session>;

    /// End a session.
    async fn sign_out(&self, session: &Session) -> AuthResult<()>;

    /// Exchange the session's refresh token for new tokens.
    async fn refresh_session(&self, session: &Session) -> AuthResult<Session>;

    /// Subscribe to changes the provider originates on its own, such as
    /// background token rotation or remote revocation.
    fn changes(&self) -> broadcast::Receiver<AuthChange>;
}
