//! In-memory identity provider.
//!
//! Suitable for single-process applications and testing. Passwords are kept
//! as salted SHA-256 digests and tokens are random base64url strings.

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{Duration, Utc};
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::error::{AuthError, AuthResult};
use crate::identity::{Credentials, Identity, Session};
use crate::provider::{AuthChange, AuthChangeKind, IdentityProvider};

/// Configuration for [`MemoryIdentityProvider`].
#[derive(Debug, Clone)]
pub struct MemoryProviderConfig {
    /// Lifetime of issued access tokens
    pub access_token_ttl: Duration,

    /// Capacity of the change-event channel
    pub channel_capacity: usize,
}

impl Default for MemoryProviderConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::hours(1),
            channel_capacity: 64,
        }
    }
}

impl MemoryProviderConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TENANCY_ACCESS_TOKEN_TTL_SECS`: Access token lifetime (default: 3600)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            access_token_ttl: std::env::var("TENANCY_ACCESS_TOKEN_TTL_SECS")
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .map(Duration::seconds)
                .unwrap_or(default.access_token_ttl),
            channel_capacity: default.channel_capacity,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredUser {
    identity: Identity,
    salt: String,
    password_digest: String,
}

/// In-memory [`IdentityProvider`].
///
/// Holds one "device" session, like a browser's persisted auth state, plus a
/// table of issued refresh tokens.
pub struct MemoryIdentityProvider {
    /// Users keyed by normalized email
    users: RwLock<HashMap<String, StoredUser>>,
    /// Live sessions keyed by refresh token
    sessions: RwLock<HashMap<String, Session>>,
    /// Persisted session for this device
    current: RwLock<Option<Session>>,
    /// One-shot failure returned by the next provider call
    pending_failure: Mutex<Option<AuthError>>,
    changes: broadcast::Sender<AuthChange>,
    config: MemoryProviderConfig,
}

impl std::fmt::Debug for MemoryIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIdentityProvider")
            .field("config", &self.config)
            .finish()
    }
}

impl MemoryIdentityProvider {
    /// Create a provider with default configuration.
    pub fn new() -> Self {
        Self::with_config(MemoryProviderConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(config: MemoryProviderConfig) -> Self {
        let (changes, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            users: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            pending_failure: Mutex::new(None),
            changes,
            config,
        }
    }

    /// Register an identity without signing it in.
    pub async fn register(&self, credentials: &Credentials) -> AuthResult<Identity> {
        let email = credentials.normalized_email();
        if email.is_empty() || credentials.password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let mut users = self.users.write().await;
        if users.contains_key(&email) {
            return Err(AuthError::UserAlreadyExists(email));
        }

        let salt = random_salt();
        let identity = Identity::new(email.clone());
        users.insert(
            email,
            StoredUser {
                identity: identity.clone(),
                password_digest: digest_password(&salt, &credentials.password),
                salt,
            },
        );

        Ok(identity)
    }

    /// Make the next provider call fail with `error`.
    pub async fn fail_next(&self, error: AuthError) {
        *self.pending_failure.lock().await = Some(error);
    }

    /// Rotate the device session's tokens and announce it, the way a hosted
    /// provider refreshes in the background.
    pub async fn rotate_tokens(&self) -> AuthResult<Session> {
        let current = self
            .current
            .read()
            .await
            .clone()
            .ok_or(AuthError::NotAuthenticated)?;
        let session = self.refresh_session(&current).await?;
        self.announce(AuthChangeKind::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }

    /// Revoke the device session from outside the app and announce it.
    pub async fn revoke_current(&self) {
        if let Some(session) = self.current.write().await.take() {
            self.sessions.write().await.remove(&session.refresh_token);
        }
        self.announce(AuthChangeKind::SignedOut, None);
    }

    async fn take_failure(&self) -> AuthResult<()> {
        match self.pending_failure.lock().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn issue_session(&self, identity: Identity) -> Session {
        let issued_at = Utc::now();
        Session {
            identity,
            access_token: random_token(),
            refresh_token: random_token(),
            issued_at,
            expires_at: issued_at + self.config.access_token_ttl,
        }
    }

    async fn store_session(&self, session: &Session) {
        self.sessions
            .write()
            .await
            .insert(session.refresh_token.clone(), session.clone());
        *self.current.write().await = Some(session.clone());
    }

    fn announce(&self, kind: AuthChangeKind, session: Option<Session>) {
        // no receivers is fine
        let _ = self.changes.send(AuthChange::new(kind, session));
    }
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn get_session(&self) -> AuthResult<Option<Session>> {
        self.take_failure().await?;
        Ok(self.current.read().await.clone())
    }

    async fn sign_in(&self, credentials: &Credentials) -> AuthResult<Session> {
        self.take_failure().await?;

        let email = credentials.normalized_email();
        let user = self
            .users
            .read()
            .await
            .get(&email)
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;

        if digest_password(&user.salt, &credentials.password) != user.password_digest {
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.issue_session(user.identity);
        self.store_session(&session).await;
        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials) -> AuthResult<Session> {
        self.take_failure().await?;

        let identity = self.register(credentials).await?;
        let session = self.issue_session(identity);
        self.store_session(&session).await;
        Ok(session)
    }

    async fn sign_out(&self, session: &Session) -> AuthResult<()> {
        self.take_failure().await?;

        self.sessions.write().await.remove(&session.refresh_token);
        let mut current = self.current.write().await;
        if current.as_ref().map(|s| &s.refresh_token) == Some(&session.refresh_token) {
            *current = None;
        }
        Ok(())
    }

    async fn refresh_session(&self, session: &Session) -> AuthResult<Session> {
        self.take_failure().await?;

        let previous = self
            .sessions
            .write()
            .await
            .remove(&session.refresh_token)
            .ok_or(AuthError::SessionInvalidated)?;

        let refreshed = self.issue_session(previous.identity);
        self.store_session(&refreshed).await;
        Ok(refreshed)
    }

    fn changes(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn random_salt() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

fn digest_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    STANDARD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("ada@example.com", "correct horse")
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let provider = MemoryIdentityProvider::new();
        let first = provider.sign_up(&creds()).await.unwrap();
        let second = provider.sign_in(&creds()).await.unwrap();

        assert_eq!(first.identity, second.identity);
        assert_ne!(first.access_token, second.access_token);
        assert_eq!(
            provider.get_session().await.unwrap().map(|s| s.access_token),
            Some(second.access_token)
        );
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let provider = MemoryIdentityProvider::new();
        provider.register(&creds()).await.unwrap();

        let result = provider
            .sign_in(&Credentials::new("ada@example.com", "wrong"))
            .await;
        assert_eq!(result.unwrap_err(), AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_rejected() {
        let provider = MemoryIdentityProvider::new();
        provider.register(&creds()).await.unwrap();

        let result = provider
            .sign_up(&Credentials::new("ADA@example.com", "other"))
            .await;
        assert!(matches!(result, Err(AuthError::UserAlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let provider = MemoryIdentityProvider::new();
        provider
            .fail_next(AuthError::ProviderUnavailable("timeout".into()))
            .await;

        assert!(provider.get_session().await.is_err());
        assert!(provider.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_invalidates_old_refresh_token() {
        let provider = MemoryIdentityProvider::new();
        let session = provider.sign_up(&creds()).await.unwrap();

        let refreshed = provider.refresh_session(&session).await.unwrap();
        assert_eq!(refreshed.identity, session.identity);

        let again = provider.refresh_session(&session).await;
        assert_eq!(again.unwrap_err(), AuthError::SessionInvalidated);
    }

    #[tokio::test]
    async fn test_rotate_tokens_announces_change() {
        let provider = MemoryIdentityProvider::new();
        provider.sign_up(&creds()).await.unwrap();
        let mut changes = provider.changes();

        provider.rotate_tokens().await.unwrap();

        let change = changes.recv().await.unwrap();
        assert_eq!(change.kind, AuthChangeKind::TokenRefreshed);
        assert!(change.session.is_some());
    }

    #[tokio::test]
    async fn test_sign_out_clears_device_session() {
        let provider = MemoryIdentityProvider::new();
        let session = provider.sign_up(&creds()).await.unwrap();

        provider.sign_out(&session).await.unwrap();
        assert!(provider.get_session().await.unwrap().is_none());
    }

    #[test]
    fn test_password_digest_is_salted() {
        assert_ne!(digest_password("a", "pw"), digest_password("b", "pw"));
        assert_eq!(digest_password("a", "pw"), digest_password("a", "pw"));
    }
}
